#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid offer: {0}")]
    InvalidOffer(String),
    #[error("Offer for round {round} can't be recorded after round {last}")]
    RoundRegression { round: u32, last: u32 },
    #[error("Invalid substitution proposal: {0}")]
    InvalidSubstitution(String),
    #[error("Substitution [{0}] already exists")]
    DuplicateSubstitution(String),
    #[error("Failed to deserialize offer. {0}")]
    Deserialize(#[from] serde_json::Error),
}
