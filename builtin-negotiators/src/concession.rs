use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use rfq_negotiator_component::{GeneratedMessage, MessageGenerator, RawAction, RoundContext};
use rfq_offer_utils::{Offer, Party};

use crate::{describe_offer, round_price};

/// Strategy moving price linearly from opening price to limit price,
/// so that limit is reached in the last round. Accepts the other side's Offer
/// as soon as it is at least as good as our current price.
pub struct LinearConcession {
    config: Config,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Price of the first Offer. Supplier defaults to catalog reference price,
    /// requestor to 80% of the first supplier Offer.
    #[serde(default)]
    pub opening_price: Option<f64>,
    /// Worst price we are ready to agree on.
    #[serde(default)]
    pub limit_price: Option<f64>,
    #[serde(default = "default_lead_time")]
    pub lead_time_days: u32,
    #[serde(default = "default_payment_terms")]
    pub payment_terms: String,
    /// Simulated thinking time before each message.
    #[serde(default, with = "humantime_serde")]
    pub response_delay: Option<Duration>,
}

fn default_lead_time() -> u32 {
    21
}

fn default_payment_terms() -> String {
    "30/70".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            opening_price: None,
            limit_price: None,
            lead_time_days: default_lead_time(),
            payment_terms: default_payment_terms(),
            response_delay: None,
        }
    }
}

impl LinearConcession {
    pub fn new(config: serde_yaml::Value) -> anyhow::Result<LinearConcession> {
        let config: Config = match config {
            serde_yaml::Value::Null => Config::default(),
            config => serde_yaml::from_value(config)?,
        };
        Ok(LinearConcession { config })
    }

    pub fn with_config(config: Config) -> LinearConcession {
        LinearConcession { config }
    }

    /// Returns (opening, limit) prices or None, if there is nothing to base them on yet.
    fn price_range(&self, context: &RoundContext) -> anyhow::Result<Option<(f64, f64)>> {
        match context.party {
            Party::Supplier => {
                let pricing = context.pricing.as_ref();
                let opening = self
                    .config
                    .opening_price
                    .or_else(|| pricing.and_then(|pricing| pricing.average_reference_price))
                    .ok_or_else(|| {
                        anyhow!(
                            "LinearConcession: no opening price for supplier [{}].",
                            context.supplier_id
                        )
                    })?;
                let limit = self
                    .config
                    .limit_price
                    .or_else(|| {
                        pricing
                            .and_then(|pricing| pricing.average_discounted_price)
                            .map(|price| price * 0.95)
                    })
                    .unwrap_or(opening * 0.9);
                Ok(Some((opening, limit)))
            }
            Party::Requestor => {
                let first_supplier_price = context
                    .ledger
                    .all_by_source(Party::Supplier)
                    .first()
                    .map(|entry| entry.offer.unit_price);
                let opening = match self
                    .config
                    .opening_price
                    .or_else(|| first_supplier_price.map(|price| price * 0.8))
                {
                    Some(opening) => opening,
                    None => return Ok(None),
                };
                let limit = self.config.limit_price.unwrap_or(opening * 1.15);
                Ok(Some((opening, limit)))
            }
        }
    }

    pub fn price_for_round(opening: f64, limit: f64, round: u32, max_rounds: u32) -> f64 {
        let progress = match max_rounds {
            0 | 1 => 1.0,
            max_rounds => (round as f64 / (max_rounds - 1) as f64).min(1.0),
        };
        round_price(opening + (limit - opening) * progress)
    }

    fn is_acceptable(party: Party, their_price: f64, our_price: f64) -> bool {
        match party {
            Party::Requestor => their_price <= our_price,
            Party::Supplier => their_price >= our_price,
        }
    }
}

#[async_trait]
impl MessageGenerator for LinearConcession {
    async fn generate(&self, context: &RoundContext) -> anyhow::Result<GeneratedMessage> {
        if let Some(delay) = self.config.response_delay {
            tokio::time::sleep(delay).await;
        }

        let (opening, limit) = match self.price_range(context)? {
            Some(range) => range,
            None => {
                return Ok(GeneratedMessage::text(
                    "We are reviewing requirements. Please share your quote.",
                ))
            }
        };

        let price = Self::price_for_round(opening, limit, context.round, context.max_rounds);

        if let Some(their) = context.opposing_offer() {
            if Self::is_acceptable(context.party, their.unit_price, price) {
                log::debug!(
                    "LinearConcession: {} accepts {} in round {} (own price {}).",
                    context.party,
                    their.unit_price,
                    context.round,
                    price
                );
                return Ok(GeneratedMessage::text(format!(
                    "Agreed, we accept {}.",
                    describe_offer(their)
                ))
                .with_action(RawAction::accept(None, Some(their))));
            }
        }

        let offer = Offer::new(price, self.config.lead_time_days, &self.config.payment_terms);
        let message = match context.own_offer() {
            None => GeneratedMessage::text(format!("We propose {}.", describe_offer(&offer)))
                .with_action(RawAction::propose(&offer)),
            Some(_) => {
                let explanation = match context.is_last_round() {
                    true => "This is our final position.",
                    false => "We moved closer to meet you halfway.",
                };
                GeneratedMessage::text(format!(
                    "{} We can do {}.",
                    explanation,
                    describe_offer(&offer)
                ))
                .with_action(RawAction::counter(None, &offer, explanation))
            }
        };
        Ok(message)
    }
}
