pub mod catalog;
mod collection;
pub mod decision;
mod error;
pub mod factory;
pub mod guidance;
pub mod impasse;
pub mod negotiation;
pub mod scoring;
pub mod session;

pub use catalog::{Catalog, Product, SupplierProfile, VolumeDiscount};
pub use collection::Ranking;
pub use decision::{decide, Decision, DecisionContext, NarrativeGenerator, TemplateNarrator};
pub use error::NegotiationError;
pub use factory::{
    create_builtin, create_collaborator, CollaboratorConfig, GeneratorConfig, ImpassePolicy,
    NegotiationConfig, RoundCount,
};
pub use guidance::{parse_guidance, ActiveGuidance, FocusArea, GuidanceDirectives};
pub use impasse::{ImpasseConfig, ImpasseDetector, ImpasseResult};
pub use negotiation::{
    Generators, Negotiation, NegotiationRequest, NegotiationState, Resolution,
    SubstitutionOutcome,
};
pub use scoring::{Candidate, Criterion, ScoreBreakdown, SubScores, SupplierScore};
pub use session::{
    run_negotiations, BuiltinGenerators, GeneratorsFactory, NegotiationSession, SessionOutcome,
    SupplierFailure,
};

pub mod builtin {
    pub use rfq_builtin_negotiators::{AcceptAll, HoldFirm, LinearConcession};
}

pub mod component {
    pub use rfq_negotiator_component::{
        Action, GeneratedMessage, GeneratorMutWrapper, Intervention, LineItem, MessageGenerator,
        MessageGeneratorMut, MessageRecord, NegotiationCallbacks, NegotiationStatus,
        NoPersistence, OfferReceived, Outcome, PricingContext, PriorityWeights, RawAction,
        RejectReason, RoundContext,
    };
    pub use rfq_offer_utils::{
        Offer, OfferConstraints, OfferLedger, Party, QualityImpact, SubstitutionLedger,
        SubstitutionProposal, SubstitutionStatus,
    };
}
