use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::TryFrom;

use rfq_offer_utils::Offer;

use crate::reason::RejectReason;

pub const PROPOSE: &str = "propose";
pub const COUNTER: &str = "counter";
pub const ACCEPT: &str = "accept";
pub const REJECT: &str = "reject";

/// Structured action as returned by message generator, before validation.
/// `result` holds payload produced by executing the action on generator side,
/// which is usually more trustworthy than raw `args`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl RawAction {
    pub fn new(name: &str, args: Value) -> RawAction {
        RawAction {
            name: name.to_string(),
            args,
            result: None,
        }
    }

    pub fn with_result(mut self, result: Value) -> RawAction {
        self.result = Some(result);
        self
    }

    pub fn propose(offer: &Offer) -> RawAction {
        RawAction::new(PROPOSE, json!({ "offer": offer }))
    }

    pub fn counter(previous_ref: Option<&str>, offer: &Offer, explanation: &str) -> RawAction {
        RawAction::new(
            COUNTER,
            json!({ "previousRef": previous_ref, "offer": offer, "explanation": explanation }),
        )
    }

    pub fn accept(reference: Option<&str>, terms: Option<&Offer>) -> RawAction {
        RawAction::new(ACCEPT, json!({ "ref": reference, "terms": terms }))
    }

    pub fn reject(reference: Option<&str>, reason: &str, ends_negotiation: bool) -> RawAction {
        RawAction::new(
            REJECT,
            json!({ "ref": reference, "reason": reason, "endsNegotiation": ends_negotiation }),
        )
    }

    /// Offer carried by this action. Payload from `result` is preferred, `args`
    /// are used when result is absent or doesn't describe valid Offer.
    pub fn offer(&self) -> Option<Offer> {
        self.result
            .as_ref()
            .and_then(|result| Offer::try_from(result).ok())
            .or_else(|| Offer::try_from(&self.args).ok())
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Unknown action '{0}'")]
    UnknownAction(String),
    #[error("Action '{name}' carries no valid offer")]
    MissingOffer { name: String },
    #[error("Malformed '{name}' arguments: {error}")]
    InvalidArgs { name: String, error: String },
}

/// Typed vocabulary of structured actions. Generator output is decoded into
/// this enum at the boundary and nothing else inspects raw actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Action {
    Propose {
        offer: Offer,
    },
    Counter {
        previous_ref: Option<String>,
        offer: Offer,
        explanation: Option<String>,
    },
    Accept {
        reference: Option<String>,
        terms: Option<Offer>,
    },
    Reject {
        reason: RejectReason,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Propose { .. } => PROPOSE,
            Action::Counter { .. } => COUNTER,
            Action::Accept { .. } => ACCEPT,
            Action::Reject { .. } => REJECT,
        }
    }

    pub fn offer(&self) -> Option<&Offer> {
        match self {
            Action::Propose { offer } | Action::Counter { offer, .. } => Some(offer),
            Action::Accept { terms, .. } => terms.as_ref(),
            Action::Reject { .. } => None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CounterArgs {
    #[serde(default)]
    previous_ref: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Deserialize, Default)]
struct AcceptArgs {
    #[serde(default, rename = "ref")]
    reference: Option<String>,
    #[serde(default)]
    terms: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectArgs {
    #[serde(default, rename = "ref")]
    reference: Option<String>,
    #[serde(default = "default_reject_reason")]
    reason: String,
    #[serde(default)]
    ends_negotiation: bool,
}

fn default_reject_reason() -> String {
    "No reason given".to_string()
}

fn parse_args<T: for<'de> Deserialize<'de>>(raw: &RawAction) -> Result<T, DecodeError> {
    let args = match &raw.args {
        Value::Null => json!({}),
        args => args.clone(),
    };
    serde_json::from_value(args).map_err(|e| DecodeError::InvalidArgs {
        name: raw.name.clone(),
        error: e.to_string(),
    })
}

impl TryFrom<&RawAction> for Action {
    type Error = DecodeError;

    fn try_from(raw: &RawAction) -> Result<Self, Self::Error> {
        let missing_offer = || DecodeError::MissingOffer {
            name: raw.name.clone(),
        };

        Ok(match raw.name.as_str() {
            PROPOSE => Action::Propose {
                offer: raw.offer().ok_or_else(missing_offer)?,
            },
            COUNTER => {
                let args: CounterArgs = parse_args(raw)?;
                Action::Counter {
                    previous_ref: args.previous_ref,
                    offer: raw.offer().ok_or_else(missing_offer)?,
                    explanation: args.explanation,
                }
            }
            ACCEPT => {
                let args: AcceptArgs = parse_args(raw)?;
                Action::Accept {
                    reference: args.reference,
                    terms: args
                        .terms
                        .as_ref()
                        .and_then(|terms| Offer::try_from(terms).ok()),
                }
            }
            REJECT => {
                let args: RejectArgs = parse_args(raw)?;
                Action::Reject {
                    reason: RejectReason::new(args.reason)
                        .final_flag(args.ends_negotiation)
                        .reference(args.reference),
                }
            }
            name => return Err(DecodeError::UnknownAction(name.to_string())),
        })
    }
}
