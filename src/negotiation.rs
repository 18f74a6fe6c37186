use anyhow::anyhow;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use rfq_builtin_negotiators::round_price;
use rfq_negotiator_component::{
    GeneratedMessage, LineItem, MessageGenerator, MessageRecord, NegotiationCallbacks,
    NegotiationStatus, OfferReceived, Outcome, PricingContext, PriorityWeights, RoundContext,
};
use rfq_offer_utils::{
    validate_offer, ConstraintViolation, Offer, OfferLedger, Party, QualityImpact,
    SubstitutionLedger, SubstitutionRecord,
};

use crate::catalog::{Catalog, SupplierProfile};
use crate::error::NegotiationError;
use crate::factory::{CollaboratorConfig, ImpassePolicy, NegotiationConfig};
use crate::guidance::ActiveGuidance;
use crate::impasse::{ImpasseDetector, ImpasseResult};

/// What requestor wants to buy and how offers are valued.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NegotiationRequest {
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub priorities: PriorityWeights,
}

/// Message generators for both sides of single negotiation.
#[derive(Clone)]
pub struct Generators {
    pub requestor: Arc<dyn MessageGenerator>,
    pub supplier: Arc<dyn MessageGenerator>,
}

impl Generators {
    fn get(&self, party: Party) -> &Arc<dyn MessageGenerator> {
        match party {
            Party::Requestor => &self.requestor,
            Party::Supplier => &self.supplier,
        }
    }
}

/// How terminal status was reached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Accepted { by: Party },
    /// Rounds ran out. `source` is None, when final Offer was computed
    /// from catalog, because nobody proposed anything.
    AutoResolved { source: Option<Party> },
    Impasse { reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionOutcome {
    pub records: Vec<SubstitutionRecord>,
    pub total_savings: f64,
    pub quality_impact: QualityImpact,
    pub lead_time_change: i32,
    pub summary: String,
}

impl From<&SubstitutionLedger> for SubstitutionOutcome {
    fn from(ledger: &SubstitutionLedger) -> Self {
        SubstitutionOutcome {
            records: ledger.records().to_vec(),
            total_savings: ledger.calculate_total_savings(),
            quality_impact: ledger.calculate_quality_impact(),
            lead_time_change: ledger.calculate_lead_time_change(),
            summary: ledger.summary(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationState {
    pub negotiation_id: String,
    pub supplier: SupplierProfile,
    pub status: NegotiationStatus,
    /// Number of rounds started.
    pub rounds: u32,
    pub max_rounds: u32,
    pub ledger: OfferLedger,
    pub messages: Vec<MessageRecord>,
    pub final_offer: Option<Offer>,
    pub resolution: Option<Resolution>,
    pub last_impasse_check: Option<ImpasseResult>,
    pub guidance: ActiveGuidance,
    pub pricing: PricingContext,
    pub substitutions: SubstitutionOutcome,
}

impl NegotiationState {
    fn new(
        collaborator: &CollaboratorConfig,
        pricing: PricingContext,
        substitutions: &SubstitutionLedger,
    ) -> NegotiationState {
        NegotiationState {
            negotiation_id: collaborator.negotiation_id.clone(),
            supplier: collaborator.supplier.clone(),
            status: NegotiationStatus::Active,
            rounds: 0,
            max_rounds: collaborator.max_rounds,
            ledger: OfferLedger::new(),
            messages: vec![],
            final_offer: None,
            resolution: None,
            last_impasse_check: None,
            guidance: ActiveGuidance::new(),
            pricing,
            substitutions: SubstitutionOutcome::from(substitutions),
        }
    }

    pub fn supplier_id(&self) -> &str {
        &self.supplier.id
    }
}

/// Single message after decoding.
struct Turn {
    message: GeneratedMessage,
    fallback: bool,
    actions: Vec<String>,
    offer: Option<Offer>,
    violations: Vec<ConstraintViolation>,
    outcome: Outcome,
}

impl Turn {
    fn is_rejection(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Rejected { .. } | Outcome::Impasse { .. }
        )
    }
}

/// Round based negotiation between requestor and single supplier.
pub struct Negotiation {
    collaborator: CollaboratorConfig,
    config: NegotiationConfig,
    catalog: Arc<Catalog>,
    request: NegotiationRequest,
    generators: Generators,
    callbacks: Arc<dyn NegotiationCallbacks>,
    detector: ImpasseDetector,
    substitutions: SubstitutionLedger,
}

impl Negotiation {
    pub fn new(
        collaborator: CollaboratorConfig,
        config: NegotiationConfig,
        catalog: Arc<Catalog>,
        request: NegotiationRequest,
        generators: Generators,
        callbacks: Arc<dyn NegotiationCallbacks>,
    ) -> Negotiation {
        Negotiation {
            detector: ImpasseDetector::new(config.impasse.clone()),
            collaborator,
            config,
            catalog,
            request,
            generators,
            callbacks,
            substitutions: SubstitutionLedger::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.collaborator.negotiation_id
    }

    pub fn supplier_id(&self) -> &str {
        &self.collaborator.supplier.id
    }

    /// Material substitutions discussed with this supplier.
    pub fn substitutions_mut(&mut self) -> &mut SubstitutionLedger {
        &mut self.substitutions
    }

    pub async fn run(self) -> Result<NegotiationState, NegotiationError> {
        let pricing = self
            .catalog
            .price_line_items(&self.request.line_items, &self.collaborator.supplier);
        let mut state = NegotiationState::new(&self.collaborator, pricing, &self.substitutions);

        log::info!(
            "Starting negotiation [{}] with supplier [{}]. Max rounds: {}.",
            self.id(),
            self.collaborator.supplier.id,
            self.collaborator.max_rounds
        );

        for round in 0..self.collaborator.max_rounds {
            state.rounds = round + 1;
            self.merge_interventions(&mut state).await?;

            let requestor = self.process_turn(Party::Requestor, round, &mut state).await?;
            self.persist(&mut state, Party::Requestor, round, &requestor)
                .await?;
            if self.resolve_turn(Party::Requestor, &requestor, &mut state).await? {
                break;
            }

            let supplier = self.process_turn(Party::Supplier, round, &mut state).await?;
            let check = self.detector.detect(
                state.rounds,
                &state.ledger,
                requestor.is_rejection() || supplier.is_rejection(),
                state.pricing.average_discounted_price,
            );
            state.last_impasse_check = Some(check.clone());
            self.persist(&mut state, Party::Supplier, round, &supplier)
                .await?;
            if self.resolve_turn(Party::Supplier, &supplier, &mut state).await? {
                break;
            }

            if check.is_impasse {
                let reason = check
                    .primary_reason
                    .clone()
                    .unwrap_or_else(|| "Impasse detected".to_string());
                match self.config.impasse_policy {
                    ImpassePolicy::Terminate => {
                        self.finish(
                            &mut state,
                            NegotiationStatus::Impasse,
                            None,
                            Resolution::Impasse { reason },
                        )
                        .await?;
                        break;
                    }
                    ImpassePolicy::Continue => log::debug!(
                        "Negotiation [{}] round {}: {}. {} Continuing.",
                        self.id(),
                        round,
                        reason,
                        check.details
                    ),
                }
            }
        }

        if !state.status.is_terminal() {
            self.auto_resolve(&mut state).await?;
        }
        Ok(state)
    }

    async fn merge_interventions(&self, state: &mut NegotiationState) -> Result<(), NegotiationError> {
        let interventions = self
            .callbacks
            .get_user_interventions(self.id(), state.guidance.last_processed())
            .await
            .map_err(|e| NegotiationError::persistence(self.id(), e))?;

        let added = state.guidance.merge(interventions);
        if added > 0 {
            log::info!(
                "Negotiation [{}]: {} new user intervention(s) merged into guidance.",
                self.id(),
                added
            );
        }
        Ok(())
    }

    fn round_context(&self, party: Party, round: u32, state: &NegotiationState) -> RoundContext {
        RoundContext {
            negotiation_id: self.id().to_string(),
            supplier_id: self.collaborator.supplier.id.clone(),
            party,
            round,
            max_rounds: self.collaborator.max_rounds,
            line_items: self.request.line_items.clone(),
            priorities: self.request.priorities,
            ledger: state.ledger.clone(),
            prior_messages: state.messages.clone(),
            opposing_message: state
                .messages
                .iter()
                .rev()
                .find(|message| message.sender == party.opposite())
                .map(|message| message.content.clone()),
            guidance: match party {
                Party::Requestor => state.guidance.format(),
                Party::Supplier => None,
            },
            pricing: match party {
                Party::Requestor => None,
                Party::Supplier => Some(state.pricing.clone()),
            },
            substitutions: match party {
                Party::Requestor if !self.substitutions.records().is_empty() => {
                    Some(self.substitutions.summary())
                }
                _ => None,
            },
        }
    }

    async fn generate(&self, context: &RoundContext, state: &NegotiationState) -> (GeneratedMessage, bool) {
        let generator = self.generators.get(context.party);
        let result = match self.config.generation_timeout {
            Some(timeout) => tokio::time::timeout(timeout, generator.generate(context))
                .await
                .unwrap_or_else(|_| Err(anyhow!("Generation timed out after {:?}.", timeout))),
            None => generator.generate(context).await,
        };

        match result {
            Ok(message) => (message, false),
            Err(e) => {
                log::warn!(
                    "Negotiation [{}] round {}: {} message generation failed: {}. Using templated message.",
                    self.id(),
                    context.round,
                    context.party,
                    e
                );
                (self.fallback_message(context.party, state), true)
            }
        }
    }

    fn fallback_message(&self, party: Party, state: &NegotiationState) -> GeneratedMessage {
        let supplier = &self.collaborator.supplier;
        let terms = state
            .ledger
            .latest_by_source(party)
            .or_else(|| state.ledger.latest())
            .map(|entry| entry.offer.clone())
            .or_else(|| {
                state.pricing.average_reference_price.map(|price| {
                    Offer::new(
                        price,
                        supplier.default_lead_time_days,
                        supplier.default_payment_terms.clone(),
                    )
                })
            });

        GeneratedMessage::text(match terms {
            Some(offer) => format!(
                "Continuing our discussion: we are at ${:.2} per unit, {} days lead time, {} payment terms.",
                offer.unit_price, offer.lead_time_days, offer.payment_terms
            ),
            None => "Continuing our discussion of the requested items.".to_string(),
        })
    }

    async fn process_turn(
        &self,
        party: Party,
        round: u32,
        state: &mut NegotiationState,
    ) -> Result<Turn, NegotiationError> {
        let context = self.round_context(party, round, state);
        let (message, fallback) = self.generate(&context, state).await;

        let mut actions = vec![];
        for action in message.actions() {
            match action {
                Ok(action) => actions.push(action.name().to_string()),
                Err(e) => log::warn!(
                    "Negotiation [{}] round {}: ignoring {} action. {}",
                    self.id(),
                    round,
                    party,
                    e
                ),
            }
        }

        let mut offer = message.extract_offer();
        let mut violations = vec![];
        if let Some(captured) = offer.take() {
            match state.ledger.add_offer_with_ref(
                round,
                party,
                captured.clone(),
                message.offer_reference(),
            ) {
                Ok(_) => {
                    violations = validate_offer(&captured, &self.config.constraints);
                    if !violations.is_empty() {
                        log::warn!(
                            "Negotiation [{}] round {}: {} offer violates constraints: {}",
                            self.id(),
                            round,
                            party,
                            violations
                                .iter()
                                .map(ToString::to_string)
                                .collect::<Vec<_>>()
                                .join("; ")
                        );
                    }
                    offer = Some(captured);
                }
                Err(e) => log::warn!(
                    "Negotiation [{}] round {}: {} offer not recorded. {}",
                    self.id(),
                    round,
                    party,
                    e
                ),
            }
        }

        if let (Party::Supplier, Some(offer)) = (party, &offer) {
            let received = OfferReceived {
                supplier_id: self.collaborator.supplier.id.clone(),
                avg_price: offer.unit_price,
                lead_time: offer.lead_time_days,
                payment_terms: offer.payment_terms.clone(),
            };
            self.callbacks
                .on_offer_received(self.id(), &received)
                .await
                .map_err(|e| NegotiationError::persistence(self.id(), e))?;
        }

        Ok(Turn {
            outcome: message.extract_outcome(),
            message,
            fallback,
            actions,
            offer,
            violations,
        })
    }

    async fn persist(
        &self,
        state: &mut NegotiationState,
        party: Party,
        round: u32,
        turn: &Turn,
    ) -> Result<(), NegotiationError> {
        let impasse = match party {
            Party::Supplier => state.last_impasse_check.as_ref(),
            Party::Requestor => None,
        };
        let metadata = json!({
            "round": round,
            "actions": turn.actions,
            "offer": turn.offer,
            "violations": turn
                .violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            "outcome": turn.outcome,
            "fallback": turn.fallback,
            "impasse": impasse,
        });

        let record = MessageRecord {
            sender: party,
            content: turn.message.text.clone(),
            timestamp: Utc::now(),
            metadata: Some(metadata),
        };

        self.callbacks
            .on_message(self.id(), &record)
            .await
            .map_err(|e| NegotiationError::persistence(self.id(), e))?;
        state.messages.push(record);
        Ok(())
    }

    /// Returns true, if message ended negotiation.
    async fn resolve_turn(
        &self,
        party: Party,
        turn: &Turn,
        state: &mut NegotiationState,
    ) -> Result<bool, NegotiationError> {
        match &turn.outcome {
            Outcome::Accepted { offer } => {
                let accepted = offer.clone().or_else(|| {
                    state
                        .ledger
                        .latest_by_source(party.opposite())
                        .map(|entry| entry.offer.clone())
                });

                match accepted {
                    Some(accepted) => {
                        self.finish(
                            state,
                            NegotiationStatus::Completed,
                            Some(accepted),
                            Resolution::Accepted { by: party },
                        )
                        .await?;
                        Ok(true)
                    }
                    None => {
                        log::warn!(
                            "Negotiation [{}]: {} accepted, but there are no terms to accept. Continuing.",
                            self.id(),
                            party
                        );
                        Ok(false)
                    }
                }
            }
            Outcome::Impasse { reason } => match self.config.impasse_policy {
                ImpassePolicy::Terminate => {
                    self.finish(
                        state,
                        NegotiationStatus::Impasse,
                        None,
                        Resolution::Impasse {
                            reason: reason.message.clone(),
                        },
                    )
                    .await?;
                    Ok(true)
                }
                ImpassePolicy::Continue => {
                    log::warn!(
                        "Negotiation [{}]: {} wants to end negotiations {}. Continuing.",
                        self.id(),
                        party,
                        reason
                    );
                    Ok(false)
                }
            },
            Outcome::Rejected { reason } => {
                log::warn!(
                    "Negotiation [{}]: {} rejected terms {}. Continuing.",
                    self.id(),
                    party,
                    reason
                );
                Ok(false)
            }
            Outcome::Ongoing => Ok(false),
        }
    }

    async fn auto_resolve(&self, state: &mut NegotiationState) -> Result<(), NegotiationError> {
        let best = |party: Party| {
            state
                .ledger
                .all_by_source(party)
                .into_iter()
                .min_by(|a, b| a.offer.unit_price.total_cmp(&b.offer.unit_price))
                .map(|entry| entry.offer.clone())
        };

        let (offer, source) = match best(Party::Supplier) {
            Some(offer) => (Some(offer), Some(Party::Supplier)),
            None => match best(Party::Requestor) {
                Some(offer) => (Some(offer), Some(Party::Requestor)),
                None => (self.fallback_offer(state), None),
            },
        };

        if offer.is_none() {
            log::warn!(
                "Negotiation [{}]: no offers and no catalog pricing. Completing without final offer.",
                self.id()
            );
        }

        self.finish(
            state,
            NegotiationStatus::Completed,
            offer,
            Resolution::AutoResolved { source },
        )
        .await
    }

    /// Catalog reference price lowered by discount for number of rounds,
    /// that negotiation lasted.
    fn fallback_offer(&self, state: &NegotiationState) -> Option<Offer> {
        let supplier = &self.collaborator.supplier;
        let discount = self.config.fallback_discount(state.rounds);

        state
            .pricing
            .average_reference_price
            .map(|price| {
                Offer::new(
                    round_price(price * (1.0 - discount)),
                    supplier.default_lead_time_days,
                    supplier.default_payment_terms.clone(),
                )
                .with_notes(format!(
                    "Computed from catalog price with {:.0}% discount.",
                    discount * 100.0
                ))
            })
            .filter(|offer| offer.validate().is_ok())
    }

    async fn finish(
        &self,
        state: &mut NegotiationState,
        status: NegotiationStatus,
        offer: Option<Offer>,
        resolution: Resolution,
    ) -> Result<(), NegotiationError> {
        state.status = status;
        state.final_offer = offer;
        state.resolution = Some(resolution);
        state.substitutions = SubstitutionOutcome::from(&self.substitutions);

        log::info!(
            "Negotiation [{}] with supplier [{}] finished with status {} after {} round(s). Resolution: {:?}, final offer: {:?}.",
            self.id(),
            state.supplier_id(),
            status,
            state.rounds,
            state.resolution,
            state.final_offer.as_ref().map(|offer| offer.unit_price)
        );

        self.callbacks
            .on_status_change(self.id(), status, state.rounds, state.final_offer.as_ref())
            .await
            .map_err(|e| NegotiationError::persistence(self.id(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{catalog, supplier};
    use crate::factory::{create_builtin, create_collaborator, RoundCount};
    use async_trait::async_trait;
    use rfq_builtin_negotiators::hold_firm;
    use rfq_negotiator_component::NoPersistence;
    use rfq_offer_utils::SubstitutionProposal;
    use serde_json::json;
    use std::time::Duration;

    struct Failing;

    #[async_trait]
    impl MessageGenerator for Failing {
        async fn generate(&self, _: &RoundContext) -> anyhow::Result<GeneratedMessage> {
            Err(anyhow!("Service unavailable"))
        }
    }

    struct Slow;

    #[async_trait]
    impl MessageGenerator for Slow {
        async fn generate(&self, _: &RoundContext) -> anyhow::Result<GeneratedMessage> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(GeneratedMessage::text("Finally"))
        }
    }

    struct BrokenStorage;

    #[async_trait]
    impl NegotiationCallbacks for BrokenStorage {
        async fn on_message(&self, _: &str, _: &MessageRecord) -> anyhow::Result<()> {
            Err(anyhow!("Disk full"))
        }

        async fn on_status_change(
            &self,
            _: &str,
            _: NegotiationStatus,
            _: u32,
            _: Option<&Offer>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn hold_firm(price: f64, reject: bool, ends_negotiation: bool) -> Arc<dyn MessageGenerator> {
        let config = serde_yaml::to_value(hold_firm::Config {
            offer: Offer::new(price, 30, "30/70"),
            reject,
            ends_negotiation,
            reason: "Too expensive.".to_string(),
        })
        .unwrap();
        create_builtin("HoldFirm", config).unwrap()
    }

    fn accept_all() -> Arc<dyn MessageGenerator> {
        create_builtin("AcceptAll", serde_yaml::Value::Null).unwrap()
    }

    fn config(rounds: u32, policy: ImpassePolicy) -> NegotiationConfig {
        NegotiationConfig {
            rounds: RoundCount::Fixed { count: rounds },
            impasse_policy: policy,
            ..NegotiationConfig::default()
        }
    }

    fn negotiation(
        config: NegotiationConfig,
        requestor: Arc<dyn MessageGenerator>,
        supplier_side: Arc<dyn MessageGenerator>,
        callbacks: Arc<dyn NegotiationCallbacks>,
    ) -> Negotiation {
        let profile = supplier("s1", 4.0, 1.0);
        let collaborator = create_collaborator("s1", &profile, &config).unwrap();
        Negotiation::new(
            collaborator,
            config,
            Arc::new(catalog()),
            NegotiationRequest {
                line_items: vec![LineItem {
                    product_id: "desk".to_string(),
                    quantity: 100,
                }],
                priorities: PriorityWeights::default(),
            },
            Generators {
                requestor,
                supplier: supplier_side,
            },
            callbacks,
        )
    }

    #[tokio::test]
    async fn test_supplier_accepts_first_offer() {
        let state = negotiation(
            config(4, ImpassePolicy::Continue),
            hold_firm(25.0, false, false),
            accept_all(),
            Arc::new(NoPersistence),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(state.status, NegotiationStatus::Completed);
        assert_eq!(state.rounds, 1);
        assert_eq!(state.final_offer.unwrap().unit_price, 25.0);
        assert_eq!(
            state.resolution,
            Some(Resolution::Accepted {
                by: Party::Supplier
            })
        );
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].sender, Party::Requestor);
        assert_eq!(state.messages[1].sender, Party::Supplier);
    }

    #[tokio::test]
    async fn test_auto_resolve_with_lowest_supplier_offer() {
        let state = negotiation(
            config(3, ImpassePolicy::Continue),
            hold_firm(25.0, false, false),
            hold_firm(30.0, false, false),
            Arc::new(NoPersistence),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(state.status, NegotiationStatus::Completed);
        assert_eq!(state.rounds, 3);
        assert_eq!(state.messages.len(), 6);
        assert_eq!(state.ledger.price_progression().len(), 6);
        assert_eq!(state.final_offer.unwrap().unit_price, 30.0);
        assert_eq!(
            state.resolution,
            Some(Resolution::AutoResolved {
                source: Some(Party::Supplier)
            })
        );

        let check = state.last_impasse_check.unwrap();
        assert!(check.conditions.no_progress_in_rounds);
        assert!(!check.conditions.price_gap_too_large);
    }

    #[tokio::test]
    async fn test_generation_failures_fall_back_to_template() {
        let state = negotiation(
            config(2, ImpassePolicy::Continue),
            Arc::new(Failing),
            Arc::new(Failing),
            Arc::new(NoPersistence),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(state.messages.len(), 4);
        assert_eq!(
            state.messages[0].content,
            "Continuing our discussion: we are at $100.00 per unit, 30 days lead time, 30/70 payment terms."
        );
        let metadata = state.messages[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["fallback"], json!(true));
        assert_eq!(metadata["actions"], json!([]));

        // Reference price 100 with 5% discount after 2 rounds.
        assert_eq!(state.final_offer.unwrap().unit_price, 95.0);
        assert_eq!(
            state.resolution,
            Some(Resolution::AutoResolved { source: None })
        );
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let config = NegotiationConfig {
            generation_timeout: Some(Duration::from_millis(20)),
            ..config(1, ImpassePolicy::Continue)
        };
        let state = negotiation(
            config,
            hold_firm(25.0, false, false),
            Arc::new(Slow),
            Arc::new(NoPersistence),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(
            state.messages[1].content,
            "Continuing our discussion: we are at $25.00 per unit, 30 days lead time, 30/70 payment terms."
        );
        assert_eq!(
            state.resolution,
            Some(Resolution::AutoResolved {
                source: Some(Party::Requestor)
            })
        );
    }

    #[tokio::test]
    async fn test_final_rejection_ignored_by_default() {
        let state = negotiation(
            config(4, ImpassePolicy::Continue),
            hold_firm(25.0, false, false),
            hold_firm(30.0, true, true),
            Arc::new(NoPersistence),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(state.status, NegotiationStatus::Completed);
        assert_eq!(state.rounds, 4);
        assert!(state.last_impasse_check.unwrap().conditions.explicit_rejection);
    }

    #[tokio::test]
    async fn test_final_rejection_terminates() {
        let state = negotiation(
            config(4, ImpassePolicy::Terminate),
            hold_firm(25.0, false, false),
            hold_firm(30.0, true, true),
            Arc::new(NoPersistence),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(state.status, NegotiationStatus::Impasse);
        assert_eq!(state.rounds, 1);
        assert_eq!(state.final_offer, None);
        assert_eq!(
            state.resolution,
            Some(Resolution::Impasse {
                reason: "Too expensive.".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_persistence_failure_propagated() {
        let negotiation = negotiation(
            config(4, ImpassePolicy::Continue),
            hold_firm(25.0, false, false),
            accept_all(),
            Arc::new(BrokenStorage),
        );
        let id = negotiation.id().to_string();

        match negotiation.run().await {
            Err(NegotiationError::Persistence { negotiation_id, .. }) => {
                assert_eq!(negotiation_id, id)
            }
            result => panic!("Expected persistence error, got {:?}", result.map(|s| s.status)),
        }
    }

    #[tokio::test]
    async fn test_substitutions_in_final_state() {
        let mut negotiation = negotiation(
            config(1, ImpassePolicy::Continue),
            hold_firm(25.0, false, false),
            accept_all(),
            Arc::new(NoPersistence),
        );
        let substitutions = negotiation.substitutions_mut();
        substitutions
            .propose(
                SubstitutionProposal {
                    product_id: "desk".to_string(),
                    original_material: "steel".to_string(),
                    suggested_material: "aluminium".to_string(),
                    cost_reduction_percent: 12.0,
                    quality_impact: QualityImpact::Minor,
                    lead_time_change: Some(-3),
                },
                "sub-1",
            )
            .unwrap();
        substitutions.accept("sub-1", None);

        let state = negotiation.run().await.unwrap();
        assert_eq!(state.substitutions.records.len(), 1);
        assert_eq!(state.substitutions.total_savings, 12.0);
        assert_eq!(state.substitutions.quality_impact, QualityImpact::Minor);
        assert_eq!(state.substitutions.lead_time_change, -3);
    }
}
