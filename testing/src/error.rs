use derive_more::Display;

/// Callback, that can be configured to fail.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum FailurePoint {
    /// Fails storing message with given index (counting from 0) of each negotiation.
    #[display(fmt = "message {}", _0)]
    Message(usize),
    #[display(fmt = "offer received")]
    OfferReceived,
    #[display(fmt = "status change")]
    StatusChange,
    #[display(fmt = "interventions query")]
    Interventions,
}

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("Injected failure at {point} in negotiation [{negotiation_id}]")]
    Injected {
        point: FailurePoint,
        negotiation_id: String,
    },
    #[error("Negotiation [{0}] not found in record")]
    NegotiationNotFound(String),
}
