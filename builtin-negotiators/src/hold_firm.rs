use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rfq_negotiator_component::{GeneratedMessage, MessageGenerator, RawAction, RoundContext};
use rfq_offer_utils::Offer;

use crate::describe_offer;

/// Repeats the same Offer in every round and never accepts anything.
/// Optionally rejects every Offer of the other side.
pub struct HoldFirm {
    config: Config,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub offer: Offer,
    #[serde(default)]
    pub reject: bool,
    #[serde(default)]
    pub ends_negotiation: bool,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "Terms are not acceptable.".to_string()
}

impl HoldFirm {
    pub fn new(config: serde_yaml::Value) -> anyhow::Result<HoldFirm> {
        let config: Config = serde_yaml::from_value(config)?;
        config.offer.validate()?;
        Ok(HoldFirm { config })
    }
}

#[async_trait]
impl MessageGenerator for HoldFirm {
    async fn generate(&self, context: &RoundContext) -> anyhow::Result<GeneratedMessage> {
        let offer = &self.config.offer;
        let mut message =
            GeneratedMessage::text(format!("Our terms remain {}.", describe_offer(offer)))
                .with_action(RawAction::propose(offer));

        if self.config.reject && context.opposing_offer().is_some() {
            message.text = format!("{} {}", self.config.reason, message.text);
            message = message.with_action(RawAction::reject(
                None,
                &self.config.reason,
                self.config.ends_negotiation,
            ));
        }
        Ok(message)
    }
}
