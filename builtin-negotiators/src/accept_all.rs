use async_trait::async_trait;

use rfq_negotiator_component::{GeneratedMessage, MessageGenerator, RawAction, RoundContext};

use crate::describe_offer;

/// Generator that accepts first Offer it gets from the other side.
/// Supplier side without any Offer to accept proposes catalog reference price.
pub struct AcceptAll {}

impl AcceptAll {
    pub fn new(_config: serde_yaml::Value) -> anyhow::Result<AcceptAll> {
        Ok(AcceptAll {})
    }
}

#[async_trait]
impl MessageGenerator for AcceptAll {
    async fn generate(&self, context: &RoundContext) -> anyhow::Result<GeneratedMessage> {
        if let Some(offer) = context.opposing_offer() {
            log::debug!(
                "AcceptAll: accepting {} offer in negotiation [{}].",
                context.party.opposite(),
                context.negotiation_id
            );
            return Ok(
                GeneratedMessage::text(format!("We accept {}.", describe_offer(offer)))
                    .with_action(RawAction::accept(None, Some(offer))),
            );
        }

        let reference = context
            .pricing
            .as_ref()
            .and_then(|pricing| pricing.average_discounted_price);

        Ok(match reference {
            Some(price) => {
                let offer = rfq_offer_utils::Offer::new(crate::round_price(price), 14, "30/70");
                GeneratedMessage::text(format!("We can offer {}.", describe_offer(&offer)))
                    .with_action(RawAction::propose(&offer))
            }
            None => GeneratedMessage::text("Please send us your best offer."),
        })
    }
}
