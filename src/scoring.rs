//! Multi-criteria scoring of final offers. All sub-scores are in 0-100 range.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use rfq_negotiator_component::PriorityWeights;
use rfq_offer_utils::{upfront_percent, Offer};

use crate::error::NegotiationError;

pub const QUALITY_WORST: f64 = 3.0;
pub const QUALITY_BEST: f64 = 5.0;
pub const LEAD_TIME_BEST: f64 = 10.0;
pub const LEAD_TIME_WORST: f64 = 60.0;

const DEFAULT_PAYMENT_SCORE: f64 = 50.0;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    #[display(fmt = "quality")]
    Quality,
    #[display(fmt = "cost")]
    Cost,
    #[display(fmt = "lead time")]
    LeadTime,
    #[display(fmt = "payment terms")]
    PaymentTerms,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::Quality,
        Criterion::Cost,
        Criterion::LeadTime,
        Criterion::PaymentTerms,
    ];

    pub fn weight(self, weights: &PriorityWeights) -> u32 {
        match self {
            Criterion::Quality => weights.quality,
            Criterion::Cost => weights.cost,
            Criterion::LeadTime => weights.lead_time,
            Criterion::PaymentTerms => weights.payment_terms,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubScores {
    pub quality: f64,
    pub cost: f64,
    pub lead_time: f64,
    pub payment_terms: f64,
}

impl SubScores {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Quality => self.quality,
            Criterion::Cost => self.cost,
            Criterion::LeadTime => self.lead_time,
            Criterion::PaymentTerms => self.payment_terms,
        }
    }
}

/// Supplier final offer to be scored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub supplier_id: String,
    pub quality_rating: f64,
    pub offer: Offer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierScore {
    pub supplier_id: String,
    pub offer: Offer,
    pub scores: SubScores,
    pub total: f64,
}

/// Sub-scores of single supplier together with weighted total.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub quality: f64,
    pub cost: f64,
    pub lead_time: f64,
    pub payment_terms: f64,
    pub total_score: f64,
}

impl From<&SupplierScore> for ScoreBreakdown {
    fn from(score: &SupplierScore) -> Self {
        ScoreBreakdown {
            quality: score.scores.quality,
            cost: score.scores.cost,
            lead_time: score.scores.lead_time,
            payment_terms: score.scores.payment_terms,
            total_score: score.total,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rescale(value: f64, worst: f64, best: f64) -> f64 {
    ((value - worst) / (best - worst) * 100.0).clamp(0.0, 100.0)
}

pub fn quality_score(rating: f64) -> f64 {
    rescale(rating, QUALITY_WORST, QUALITY_BEST)
}

pub fn lead_time_score(days: u32) -> f64 {
    rescale(days as f64, LEAD_TIME_WORST, LEAD_TIME_BEST)
}

/// Score relative to other prices in the same decision. The cheapest
/// gets 100, the most expensive 0.
pub fn cost_score(price: f64, min_price: f64, max_price: f64) -> f64 {
    if max_price == min_price {
        return 100.0;
    }
    100.0 * (max_price - price) / (max_price - min_price)
}

pub fn payment_terms_score(terms: &str) -> f64 {
    match terms.trim() {
        "33/33/33" => 100.0,
        "50/50" => 80.0,
        "30/70" => 60.0,
        terms => upfront_percent(terms)
            .map(|upfront| 100.0 - upfront)
            .unwrap_or(DEFAULT_PAYMENT_SCORE),
    }
}

pub fn weighted_total(scores: &SubScores, weights: &PriorityWeights) -> f64 {
    let sum = Criterion::ALL
        .iter()
        .map(|criterion| scores.get(*criterion) * criterion.weight(weights) as f64)
        .sum::<f64>();
    round2(sum / 100.0)
}

pub fn validate_weights(weights: &PriorityWeights) -> Result<(), NegotiationError> {
    match weights.total() {
        100 => Ok(()),
        total => Err(NegotiationError::InvalidPriorities(total)),
    }
}

/// Scores candidates in input order.
pub fn score_candidates(
    candidates: &[Candidate],
    weights: &PriorityWeights,
) -> Result<Vec<SupplierScore>, NegotiationError> {
    validate_weights(weights)?;
    if candidates.is_empty() {
        return Err(NegotiationError::NoScorableOffers);
    }

    let prices = candidates.iter().map(|candidate| candidate.offer.unit_price);
    let min_price = prices.clone().fold(f64::INFINITY, f64::min);
    let max_price = prices.fold(f64::NEG_INFINITY, f64::max);

    Ok(candidates
        .iter()
        .map(|candidate| {
            let scores = SubScores {
                quality: quality_score(candidate.quality_rating),
                cost: cost_score(candidate.offer.unit_price, min_price, max_price),
                lead_time: lead_time_score(candidate.offer.lead_time_days),
                payment_terms: payment_terms_score(&candidate.offer.payment_terms),
            };
            let total = weighted_total(&scores, weights);

            log::debug!(
                "Supplier [{}] scored {:.2}: {:?}",
                candidate.supplier_id,
                total,
                scores
            );

            SupplierScore {
                supplier_id: candidate.supplier_id.clone(),
                offer: candidate.offer.clone(),
                scores,
                total,
            }
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_case::test_case;

    pub fn candidate(id: &str, quality: f64, price: f64, lead_time: u32, terms: &str) -> Candidate {
        Candidate {
            supplier_id: id.to_string(),
            quality_rating: quality,
            offer: Offer::new(price, lead_time, terms),
        }
    }

    #[test]
    fn test_weighted_total() {
        let scores = SubScores {
            quality: 80.0,
            cost: 60.0,
            lead_time: 70.0,
            payment_terms: 50.0,
        };
        assert_eq!(weighted_total(&scores, &PriorityWeights::default()), 65.0);

        let weights = PriorityWeights {
            quality: 10,
            cost: 50,
            lead_time: 30,
            payment_terms: 10,
        };
        assert_eq!(weighted_total(&scores, &weights), 64.0);
    }

    #[test_case(2.0, 0.0)]
    #[test_case(3.0, 0.0)]
    #[test_case(4.0, 50.0)]
    #[test_case(4.5, 75.0)]
    #[test_case(5.0, 100.0)]
    #[test_case(5.5, 100.0)]
    fn test_quality_score(rating: f64, expected: f64) {
        assert_eq!(quality_score(rating), expected);
    }

    #[test_case(5, 100.0)]
    #[test_case(10, 100.0)]
    #[test_case(35, 50.0)]
    #[test_case(60, 0.0)]
    #[test_case(90, 0.0)]
    fn test_lead_time_score(days: u32, expected: f64) {
        assert_eq!(lead_time_score(days), expected);
    }

    #[test_case("33/33/33", 100.0)]
    #[test_case("50/50", 80.0)]
    #[test_case("30/70", 60.0)]
    #[test_case("20/80", 80.0)]
    #[test_case("40%/60%", 60.0)]
    #[test_case("net 30", 50.0)]
    fn test_payment_terms_score(terms: &str, expected: f64) {
        assert_eq!(payment_terms_score(terms), expected);
    }

    #[test]
    fn test_cost_scores_relative() {
        let scores = score_candidates(
            &[
                candidate("a", 4.0, 20.0, 30, "30/70"),
                candidate("b", 4.0, 25.0, 30, "30/70"),
                candidate("c", 4.0, 30.0, 30, "30/70"),
            ],
            &PriorityWeights::default(),
        )
        .unwrap();

        let cost = scores.iter().map(|s| s.scores.cost).collect::<Vec<_>>();
        assert_eq!(cost, vec![100.0, 50.0, 0.0]);
    }

    #[test]
    fn test_equal_prices_score_full() {
        let scores = score_candidates(
            &[
                candidate("a", 4.0, 20.0, 30, "30/70"),
                candidate("b", 3.0, 20.0, 30, "30/70"),
            ],
            &PriorityWeights::default(),
        )
        .unwrap();
        assert!(scores.iter().all(|score| score.scores.cost == 100.0));
    }

    #[test]
    fn test_invalid_weights() {
        let weights = PriorityWeights {
            quality: 50,
            cost: 50,
            lead_time: 10,
            payment_terms: 0,
        };
        assert!(matches!(
            score_candidates(&[candidate("a", 4.0, 20.0, 30, "30/70")], &weights),
            Err(NegotiationError::InvalidPriorities(110))
        ));
    }

    #[test]
    fn test_no_candidates() {
        assert!(matches!(
            score_candidates(&[], &PriorityWeights::default()),
            Err(NegotiationError::NoScorableOffers)
        ));
    }
}
