use chrono::{Duration, Utc};
use std::sync::Arc;

use rfq_negotiators::component::{GeneratedMessage, Party};
use rfq_negotiators::{
    create_builtin, CollaboratorConfig, Generators, NegotiationConfig, RoundCount,
};
use rfq_negotiators_testing::{
    sample_catalog, sample_request, sample_supplier, ContextLog, Framework, ScriptedGenerator,
};

fn framework() -> Framework {
    Framework::new(sample_catalog().unwrap())
        .add_supplier(sample_supplier("steady-works").unwrap())
        .config(NegotiationConfig {
            rounds: RoundCount::Fixed { count: 2 },
            ..NegotiationConfig::default()
        })
}

#[tokio::test]
async fn test_interventions_reach_requestor_guidance() {
    let framework = framework();
    let submitted = Utc::now() - Duration::minutes(1);
    framework.record.add_intervention(
        "i-1",
        "Urgent: keep the price under $90 per unit.",
        submitted,
    );

    let requestor_log = ContextLog::default();
    let supplier_log = ContextLog::default();
    let (requestor, supplier) = (requestor_log.clone(), supplier_log.clone());
    let generators = move |_: &CollaboratorConfig| -> anyhow::Result<Generators> {
        Ok(Generators {
            requestor: ScriptedGenerator::new(vec![GeneratedMessage::text(
                "Could you quote desks and chairs?",
            )])
            .with_log(requestor.clone())
            .into_generator(),
            supplier: ScriptedGenerator::new(vec![GeneratedMessage::text(
                "Let us check our stock.",
            )])
            .with_log(supplier.clone())
            .into_generator(),
        })
    };

    let outcome = framework
        .run(sample_request(), Arc::new(generators))
        .await
        .unwrap();
    assert_eq!(outcome.finished.len(), 1);

    let state = &outcome.finished[0];
    assert_eq!(state.guidance.interventions().len(), 1);
    assert!(state.guidance.is_urgent());
    assert_eq!(state.guidance.directives().price_limit, Some(90.0));
    assert_eq!(state.guidance.last_processed(), Some(submitted));

    let contexts = requestor_log.contexts();
    assert_eq!(contexts.len(), 2);
    for context in &contexts {
        assert_eq!(context.party, Party::Requestor);
        assert!(context.pricing.is_none());

        let guidance = context.guidance.as_ref().unwrap();
        assert!(guidance.starts_with("USER GUIDANCE (URGENT):"));
        assert!(guidance.contains("keep the price under $90 per unit."));
        assert!(guidance.contains("do not exceed $90.00 per unit"));
    }
    assert_eq!(
        contexts[1].opposing_message.as_deref(),
        Some("Let us check our stock.")
    );

    // Supplier never sees our guidance, but gets catalog pricing.
    let contexts = supplier_log.contexts();
    assert_eq!(contexts.len(), 2);
    assert!(contexts.iter().all(|context| context.guidance.is_none()));
    assert!(contexts.iter().all(|context| context.pricing.is_some()));

    // The second round asks only for interventions newer than the merged one.
    let queries = framework.record.snapshot().intervention_queries[&state.negotiation_id].clone();
    assert_eq!(queries, vec![None, Some(submitted)]);
}

#[tokio::test]
async fn test_no_offers_fall_back_to_catalog_price() {
    let framework = framework().config(NegotiationConfig {
        rounds: RoundCount::Fixed { count: 2 },
        fallback_discounts: vec![0.0, 0.1, 0.2],
        ..NegotiationConfig::default()
    });
    let generators = |_: &CollaboratorConfig| -> anyhow::Result<Generators> {
        Ok(Generators {
            requestor: ScriptedGenerator::new(vec![GeneratedMessage::text("Hello.")])
                .into_generator(),
            supplier: ScriptedGenerator::new(vec![GeneratedMessage::text("Hi.")])
                .into_generator(),
        })
    };

    let outcome = framework
        .run(sample_request(), Arc::new(generators))
        .await
        .unwrap();

    let state = &outcome.finished[0];
    assert!(state.guidance.format().is_none());

    // Reference price 82.50 lowered by 20% after two rounds.
    let offer = state.final_offer.as_ref().unwrap();
    assert_eq!(offer.unit_price, 66.0);
    assert_eq!(offer.lead_time_days, 30);
    assert_eq!(offer.payment_terms, "33/33/33");
}

#[tokio::test]
async fn test_generators_from_closure() {
    let framework = framework();
    let generators = |_: &CollaboratorConfig| -> anyhow::Result<Generators> {
        Ok(Generators {
            requestor: create_builtin("AcceptAll", serde_yaml::Value::Null)?,
            supplier: create_builtin("AcceptAll", serde_yaml::Value::Null)?,
        })
    };

    let outcome = framework
        .run(sample_request(), Arc::new(generators))
        .await
        .unwrap();

    let state = &outcome.finished[0];
    assert_eq!(state.final_offer.as_ref().unwrap().unit_price, 82.5);
    assert!(state.last_impasse_check.is_some());
}
