#[derive(thiserror::Error, Debug)]
pub enum NegotiationError {
    #[error("Persistence failed in negotiation [{negotiation_id}]. {source}")]
    Persistence {
        negotiation_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Priority weights must sum to 100, got {0}")]
    InvalidPriorities(u32),
    #[error("None of negotiations ended with an offer, that could be scored")]
    NoScorableOffers,
    #[error("Score of supplier [{0}] is not a number")]
    InvalidScore(String),
    #[error("Negotiation task for supplier [{supplier_id}] failed. {error}")]
    TaskFailed { supplier_id: String, error: String },
}

impl NegotiationError {
    pub fn persistence(negotiation_id: &str, source: anyhow::Error) -> NegotiationError {
        NegotiationError::Persistence {
            negotiation_id: negotiation_id.to_string(),
            source,
        }
    }
}
