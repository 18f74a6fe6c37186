use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use rfq_negotiator_component::PriorityWeights;

use crate::collection::Ranking;
use crate::error::NegotiationError;
use crate::scoring::{score_candidates, Candidate, Criterion, ScoreBreakdown, SupplierScore};

const CAVEAT_MIN_WEIGHT: u32 = 20;
const WEAK_SCORE: f64 = 50.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFactor {
    pub criterion: Criterion,
    pub weight: u32,
    pub score: f64,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caveat {
    pub criterion: Criterion,
    pub weight: u32,
    pub score: f64,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitiveAnalysis {
    pub runner_up_id: String,
    /// Difference of total scores.
    pub margin: f64,
    /// Criteria, where runner up was better than selected supplier.
    pub runner_up_advantages: Vec<Criterion>,
}

/// Structured explanation of decision. Input for narrative generators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionContext {
    pub winner: SupplierScore,
    pub weights: PriorityWeights,
    pub key_factors: Vec<KeyFactor>,
    pub caveats: Vec<Caveat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitive_analysis: Option<CompetitiveAnalysis>,
    pub recommendations: Vec<String>,
}

fn level(score: f64) -> &'static str {
    match score {
        s if s >= 80.0 => "excellent",
        s if s >= 60.0 => "strong",
        s if s >= 40.0 => "moderate",
        _ => "weak",
    }
}

fn recommendation(criterion: Criterion) -> &'static str {
    match criterion {
        Criterion::Quality => {
            "Request quality certifications and product samples before placing the order."
        }
        Criterion::Cost => "Negotiate further on price or ask for additional volume discounts.",
        Criterion::LeadTime => "Agree on delivery milestones and penalties for late delivery.",
        Criterion::PaymentTerms => "Negotiate lower upfront payment or milestone based payments.",
    }
}

impl DecisionContext {
    pub fn build(ranking: &Ranking, weights: &PriorityWeights) -> Option<DecisionContext> {
        let winner = ranking.best()?.clone();

        let mut factors = Criterion::ALL
            .iter()
            .map(|criterion| {
                let weight = criterion.weight(weights);
                let score = winner.scores.get(*criterion);
                (*criterion, weight, score, weight as f64 * score)
            })
            .collect::<Vec<_>>();
        // Stable sort, so equal contributions keep criteria order.
        factors.sort_by(|a, b| b.3.total_cmp(&a.3));

        let key_factors = factors
            .iter()
            .take(2)
            .map(|(criterion, weight, score, _)| KeyFactor {
                criterion: *criterion,
                weight: *weight,
                score: *score,
                description: format!(
                    "{} {} score ({:.0}) with {}% priority",
                    level(*score),
                    criterion,
                    score,
                    weight
                ),
            })
            .collect();

        let caveats = Criterion::ALL
            .iter()
            .map(|criterion| (*criterion, criterion.weight(weights), winner.scores.get(*criterion)))
            .filter(|(_, weight, score)| *weight >= CAVEAT_MIN_WEIGHT && *score < WEAK_SCORE)
            .map(|(criterion, weight, score)| Caveat {
                criterion,
                weight,
                score,
                description: format!(
                    "Low {} score ({:.0}) despite {}% priority.",
                    criterion, score, weight
                ),
            })
            .collect();

        let competitive_analysis = ranking.runner_up().map(|runner_up| CompetitiveAnalysis {
            runner_up_id: runner_up.supplier_id.clone(),
            margin: ((winner.total - runner_up.total) * 100.0).round() / 100.0,
            runner_up_advantages: Criterion::ALL
                .iter()
                .filter(|criterion| runner_up.scores.get(**criterion) > winner.scores.get(**criterion))
                .cloned()
                .collect(),
        });

        let recommendations = Criterion::ALL
            .iter()
            .filter(|criterion| winner.scores.get(**criterion) < WEAK_SCORE)
            .map(|criterion| recommendation(*criterion).to_string())
            .collect();

        Some(DecisionContext {
            winner,
            weights: *weights,
            key_factors,
            caveats,
            competitive_analysis,
            recommendations,
        })
    }
}

/// Writes decision explanation in natural language. External collaborator,
/// usually language model.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn narrate(&self, context: &DecisionContext) -> anyhow::Result<String>;
}

/// Deterministic explanation built from decision context.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn render(context: &DecisionContext) -> String {
        let winner = &context.winner;
        let mut sections = vec![format!(
            "Selected supplier {} with total score {:.2}.",
            winner.supplier_id, winner.total
        )];

        if !context.key_factors.is_empty() {
            let factors = context
                .key_factors
                .iter()
                .map(|factor| factor.description.as_str())
                .collect::<Vec<_>>();
            sections.push(format!("Key factors: {}.", factors.join("; ")));
        }

        sections.push(match &context.competitive_analysis {
            Some(analysis) if analysis.runner_up_advantages.is_empty() => format!(
                "Leads {} by {:.2} points.",
                analysis.runner_up_id, analysis.margin
            ),
            Some(analysis) => format!(
                "Leads {} by {:.2} points, although {} scored higher on {}.",
                analysis.runner_up_id,
                analysis.margin,
                analysis.runner_up_id,
                analysis
                    .runner_up_advantages
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            None => "No other supplier finished negotiations with a comparable offer.".to_string(),
        });

        if !context.caveats.is_empty() {
            let caveats = context
                .caveats
                .iter()
                .map(|caveat| caveat.description.as_str())
                .collect::<Vec<_>>();
            sections.push(format!("Caveats: {}", caveats.join(" ")));
        }

        if !context.recommendations.is_empty() {
            sections.push(format!(
                "Recommendations: {}",
                context.recommendations.join(" ")
            ));
        }
        sections.join(" ")
    }
}

#[async_trait]
impl NarrativeGenerator for TemplateNarrator {
    async fn narrate(&self, context: &DecisionContext) -> anyhow::Result<String> {
        Ok(TemplateNarrator::render(context))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub selected_supplier_id: String,
    pub reasoning: String,
    /// Score breakdown by supplier.
    pub scores: BTreeMap<String, ScoreBreakdown>,
    /// From the best to the worst.
    pub ranking: Vec<SupplierScore>,
    pub context: DecisionContext,
}

/// Scores final offers and selects the best supplier.
pub async fn decide(
    candidates: &[Candidate],
    weights: &PriorityWeights,
    narrator: &dyn NarrativeGenerator,
) -> Result<Decision, NegotiationError> {
    let ranking = Ranking::try_from(score_candidates(candidates, weights)?)?;
    let context =
        DecisionContext::build(&ranking, weights).ok_or(NegotiationError::NoScorableOffers)?;

    let reasoning = match narrator.narrate(&context).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            log::warn!("Narrative generator returned empty text. Using template.");
            TemplateNarrator::render(&context)
        }
        Err(e) => {
            log::warn!("Narrative generator failed: {}. Using template.", e);
            TemplateNarrator::render(&context)
        }
    };

    log::info!(
        "Selected supplier [{}] with score {:.2} out of {} candidate(s).",
        context.winner.supplier_id,
        context.winner.total,
        ranking.len()
    );

    Ok(Decision {
        selected_supplier_id: context.winner.supplier_id.clone(),
        reasoning,
        scores: ranking
            .entries()
            .iter()
            .map(|score| (score.supplier_id.clone(), ScoreBreakdown::from(score)))
            .collect(),
        ranking: ranking.into_vec(),
        context,
    })
}
