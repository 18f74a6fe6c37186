use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use rfq_offer_utils::Offer;

use crate::action::{Action, DecodeError, RawAction, ACCEPT, REJECT};
use crate::reason::RejectReason;

/// Output of message generator: natural language text with optional
/// machine readable actions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structured_actions: Vec<RawAction>,
}

/// What the message means for negotiation state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Sender accepted terms. `offer` is None if neither accept action nor
    /// the rest of message carried valid terms.
    Accepted { offer: Option<Offer> },
    /// Sender rejected terms, but negotiations can continue.
    Rejected { reason: RejectReason },
    /// Sender rejected terms and wants to end negotiations.
    Impasse { reason: RejectReason },
    Ongoing,
}

impl GeneratedMessage {
    pub fn text(text: impl Into<String>) -> GeneratedMessage {
        GeneratedMessage {
            text: text.into(),
            structured_actions: vec![],
        }
    }

    pub fn with_action(mut self, action: RawAction) -> GeneratedMessage {
        self.structured_actions.push(action);
        self
    }

    pub fn find_action(&self, name: &str) -> Option<&RawAction> {
        self.structured_actions
            .iter()
            .find(|action| action.name == name)
    }

    /// Decodes all structured actions. Actions that fail validation are
    /// returned as errors, so caller can report them.
    pub fn actions(&self) -> Vec<Result<Action, DecodeError>> {
        self.structured_actions
            .iter()
            .map(Action::try_from)
            .collect()
    }

    /// First valid `propose` or `counter` action. Invalid ones are skipped.
    fn offer_action(&self) -> Option<Action> {
        self.actions()
            .into_iter()
            .filter_map(Result::ok)
            .find(|action| matches!(action, Action::Propose { .. } | Action::Counter { .. }))
    }

    /// Offer from first valid `propose` or `counter` action.
    pub fn extract_offer(&self) -> Option<Offer> {
        match self.offer_action()? {
            Action::Propose { offer } | Action::Counter { offer, .. } => Some(offer),
            _ => None,
        }
    }

    /// Reference of message, that `counter` action responds to.
    pub fn offer_reference(&self) -> Option<String> {
        match self.offer_action()? {
            Action::Counter { previous_ref, .. } => previous_ref,
            _ => None,
        }
    }

    pub fn extract_outcome(&self) -> Outcome {
        if let Some(accept) = self.find_action(ACCEPT) {
            let terms = match Action::try_from(accept) {
                Ok(Action::Accept { terms, .. }) => terms,
                Ok(_) => None,
                Err(e) => {
                    log::warn!("Accept action can't be decoded: {}", e);
                    None
                }
            };
            return Outcome::Accepted {
                offer: terms.or_else(|| self.extract_offer()),
            };
        }

        if let Some(reject) = self.find_action(REJECT) {
            let reason = match Action::try_from(reject) {
                Ok(Action::Reject { reason }) => reason,
                Ok(_) | Err(_) => RejectReason::new("Malformed rejection"),
            };
            return match reason.ends_negotiation {
                true => Outcome::Impasse { reason },
                false => Outcome::Rejected { reason },
            };
        }

        Outcome::Ongoing
    }
}
