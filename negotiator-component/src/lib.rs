pub mod action;
pub mod callbacks;
pub mod component;
mod component_mut;
pub mod context;
pub mod message;
pub mod reason;

pub use action::{Action, DecodeError, RawAction};
pub use callbacks::{
    Intervention, MessageRecord, NegotiationCallbacks, NegotiationStatus, NoPersistence,
    OfferReceived,
};
pub use component::MessageGenerator;
pub use component_mut::{GeneratorMutWrapper, MessageGeneratorMut};
pub use context::{LineItem, PricedLineItem, PricingContext, PriorityWeights, RoundContext};
pub use message::{GeneratedMessage, Outcome};
pub use reason::RejectReason;

pub use rfq_offer_utils::{Offer, OfferLedger, Party};
