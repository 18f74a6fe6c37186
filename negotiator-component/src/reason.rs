use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Reason attached to rejection of an Offer. Rejection can end negotiations
/// only if `ends_negotiation` flag is set, otherwise the other side is
/// expected to come back with better terms.
#[derive(Clone, Display, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[display(fmt = "'{}'", message)]
#[serde(rename_all = "camelCase")]
pub struct RejectReason {
    pub message: String,
    #[serde(default)]
    pub ends_negotiation: bool,
    /// Reference to rejected Offer or message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl RejectReason {
    pub fn new(message: impl ToString) -> RejectReason {
        RejectReason {
            message: message.to_string(),
            ends_negotiation: false,
            reference: None,
        }
    }

    pub fn final_flag(mut self, flag: bool) -> Self {
        self.ends_negotiation = flag;
        self
    }

    pub fn reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }
}
