use futures::future::join_all;
use std::sync::Arc;

use rfq_negotiator_component::{NegotiationCallbacks, NegotiationStatus, PriorityWeights};

use crate::catalog::{Catalog, SupplierProfile};
use crate::decision::{decide, Decision, NarrativeGenerator};
use crate::error::NegotiationError;
use crate::factory::{create_collaborator, CollaboratorConfig, GeneratorConfig, NegotiationConfig};
use crate::negotiation::{Generators, Negotiation, NegotiationRequest, NegotiationState};
use crate::scoring::{validate_weights, Candidate};

/// Creates message generators for each negotiation.
pub trait GeneratorsFactory: Send + Sync {
    fn create(&self, collaborator: &CollaboratorConfig) -> anyhow::Result<Generators>;
}

impl<F> GeneratorsFactory for F
where
    F: Fn(&CollaboratorConfig) -> anyhow::Result<Generators> + Send + Sync,
{
    fn create(&self, collaborator: &CollaboratorConfig) -> anyhow::Result<Generators> {
        self(collaborator)
    }
}

/// Builtin generators with the same configuration for every supplier.
#[derive(Clone, Debug)]
pub struct BuiltinGenerators {
    pub requestor: GeneratorConfig,
    pub supplier: GeneratorConfig,
}

impl GeneratorsFactory for BuiltinGenerators {
    fn create(&self, _collaborator: &CollaboratorConfig) -> anyhow::Result<Generators> {
        Ok(Generators {
            requestor: self.requestor.create()?,
            supplier: self.supplier.create()?,
        })
    }
}

#[derive(Debug)]
pub struct SupplierFailure {
    pub supplier_id: String,
    pub error: NegotiationError,
}

#[derive(Debug, Default)]
pub struct SessionOutcome {
    /// In the order of suppliers passed to session.
    pub finished: Vec<NegotiationState>,
    pub failures: Vec<SupplierFailure>,
}

impl SessionOutcome {
    /// Final offers of completed negotiations.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.finished
            .iter()
            .filter(|state| state.status == NegotiationStatus::Completed)
            .filter_map(|state| {
                state.final_offer.as_ref().map(|offer| Candidate {
                    supplier_id: state.supplier_id().to_string(),
                    quality_rating: state.supplier.quality_rating,
                    offer: offer.clone(),
                })
            })
            .collect()
    }

    pub async fn decide(
        &self,
        weights: &PriorityWeights,
        narrator: &dyn NarrativeGenerator,
    ) -> Result<Decision, NegotiationError> {
        decide(&self.candidates(), weights, narrator).await
    }
}

/// Negotiates with many suppliers in parallel. Negotiations don't share
/// any mutable state, apart from persistence layer behind callbacks.
pub struct NegotiationSession {
    config: NegotiationConfig,
    catalog: Arc<Catalog>,
    callbacks: Arc<dyn NegotiationCallbacks>,
    generators: Arc<dyn GeneratorsFactory>,
}

impl NegotiationSession {
    pub fn new(
        config: NegotiationConfig,
        catalog: Arc<Catalog>,
        callbacks: Arc<dyn NegotiationCallbacks>,
        generators: Arc<dyn GeneratorsFactory>,
    ) -> Result<NegotiationSession, NegotiationError> {
        config.validate()?;
        Ok(NegotiationSession {
            config,
            catalog,
            callbacks,
            generators,
        })
    }

    /// Creates negotiation without running it, so caller can set it up further.
    pub fn prepare(
        &self,
        supplier: &SupplierProfile,
        request: &NegotiationRequest,
    ) -> Result<Negotiation, NegotiationError> {
        let collaborator = create_collaborator(&supplier.id, supplier, &self.config)?;
        let generators = self.generators.create(&collaborator).map_err(|e| {
            NegotiationError::InvalidConfig(format!(
                "Can't create message generators for supplier [{}]. {}",
                supplier.id, e
            ))
        })?;

        Ok(Negotiation::new(
            collaborator,
            self.config.clone(),
            self.catalog.clone(),
            request.clone(),
            generators,
            self.callbacks.clone(),
        ))
    }

    pub async fn run(
        &self,
        request: NegotiationRequest,
        suppliers: &[SupplierProfile],
    ) -> Result<SessionOutcome, NegotiationError> {
        validate_weights(&request.priorities)?;

        log::info!(
            "Starting negotiations with {} supplier(s).",
            suppliers.len()
        );

        let prepared = suppliers
            .iter()
            .map(|supplier| (supplier.id.clone(), self.prepare(supplier, &request)))
            .collect();
        Ok(run_prepared(prepared).await)
    }
}

/// Runs negotiations concurrently and waits for all of them. Failure of one
/// negotiation doesn't affect the others.
pub async fn run_negotiations(negotiations: Vec<Negotiation>) -> SessionOutcome {
    let prepared = negotiations
        .into_iter()
        .map(|negotiation| (negotiation.supplier_id().to_string(), Ok(negotiation)))
        .collect();
    run_prepared(prepared).await
}

async fn run_prepared(
    prepared: Vec<(String, Result<Negotiation, NegotiationError>)>,
) -> SessionOutcome {
    let tasks = prepared.into_iter().map(|(supplier_id, negotiation)| async move {
        let result = match negotiation {
            Ok(negotiation) => match tokio::spawn(negotiation.run()).await {
                Ok(result) => result,
                Err(e) => Err(NegotiationError::TaskFailed {
                    supplier_id: supplier_id.clone(),
                    error: e.to_string(),
                }),
            },
            Err(e) => Err(e),
        };
        (supplier_id, result)
    });

    let mut outcome = SessionOutcome::default();
    for (supplier_id, result) in join_all(tasks).await {
        match result {
            Ok(state) => outcome.finished.push(state),
            Err(error) => {
                log::warn!("Negotiation with supplier [{}] failed. {}", supplier_id, error);
                outcome.failures.push(SupplierFailure { supplier_id, error });
            }
        }
    }

    log::info!(
        "Negotiations finished: {} completed, {} failed.",
        outcome.finished.len(),
        outcome.failures.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{catalog, supplier};
    use crate::decision::TemplateNarrator;
    use crate::factory::{create_builtin, RoundCount};
    use anyhow::anyhow;
    use rfq_negotiator_component::{LineItem, NoPersistence};

    fn request() -> NegotiationRequest {
        NegotiationRequest {
            line_items: vec![LineItem {
                product_id: "desk".to_string(),
                quantity: 100,
            }],
            priorities: PriorityWeights::default(),
        }
    }

    fn builtin(requestor: &str, supplier: &str) -> Arc<dyn GeneratorsFactory> {
        Arc::new(BuiltinGenerators {
            requestor: GeneratorConfig::new(requestor, serde_yaml::Value::Null),
            supplier: GeneratorConfig::new(supplier, serde_yaml::Value::Null),
        })
    }

    fn session(generators: Arc<dyn GeneratorsFactory>) -> NegotiationSession {
        NegotiationSession::new(
            NegotiationConfig {
                rounds: RoundCount::Fixed { count: 3 },
                ..NegotiationConfig::default()
            },
            Arc::new(catalog()),
            Arc::new(NoPersistence),
            generators,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_preserves_supplier_order() {
        let suppliers = vec![
            supplier("expensive", 5.0, 1.3),
            supplier("cheap", 3.5, 0.8),
            supplier("regular", 4.0, 1.0),
        ];

        let outcome = session(builtin("AcceptAll", "LinearConcession"))
            .run(request(), &suppliers)
            .await
            .unwrap();

        assert!(outcome.failures.is_empty());
        let ids = outcome
            .finished
            .iter()
            .map(|state| state.supplier_id())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["expensive", "cheap", "regular"]);
        assert!(outcome
            .finished
            .iter()
            .all(|state| state.status == NegotiationStatus::Completed));

        let decision = outcome
            .decide(&PriorityWeights::default(), &TemplateNarrator)
            .await
            .unwrap();
        assert_eq!(decision.scores.len(), 3);
    }

    #[tokio::test]
    async fn test_setup_failure_does_not_stop_others() {
        let generators = |collaborator: &CollaboratorConfig| -> anyhow::Result<Generators> {
            if collaborator.supplier.id == "broken" {
                return Err(anyhow!("No model for this supplier"));
            }
            Ok(Generators {
                requestor: create_builtin("AcceptAll", serde_yaml::Value::Null)?,
                supplier: create_builtin("AcceptAll", serde_yaml::Value::Null)?,
            })
        };

        let outcome = session(Arc::new(generators))
            .run(
                request(),
                &[supplier("broken", 4.0, 1.0), supplier("fine", 4.0, 1.0)],
            )
            .await
            .unwrap();

        assert_eq!(outcome.finished.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].supplier_id, "broken");
        assert!(matches!(
            outcome.failures[0].error,
            NegotiationError::InvalidConfig(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_priorities() {
        let mut request = request();
        request.priorities.cost = 50;

        let result = session(builtin("AcceptAll", "AcceptAll"))
            .run(request, &[supplier("s1", 4.0, 1.0)])
            .await;
        assert!(matches!(result, Err(NegotiationError::InvalidPriorities(125))));
    }

    #[tokio::test]
    async fn test_decide_without_offers() {
        let outcome = SessionOutcome::default();
        assert!(matches!(
            outcome
                .decide(&PriorityWeights::default(), &TemplateNarrator)
                .await,
            Err(NegotiationError::NoScorableOffers)
        ));
    }
}
