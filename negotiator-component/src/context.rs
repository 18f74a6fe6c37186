use serde::{Deserialize, Serialize};

use rfq_offer_utils::{OfferLedger, Party};

use crate::callbacks::MessageRecord;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub quantity: u32,
}

/// Importance of decision criteria in percents. Weights should sum to 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityWeights {
    pub quality: u32,
    pub cost: u32,
    pub lead_time: u32,
    pub payment_terms: u32,
}

impl PriorityWeights {
    pub fn total(&self) -> u32 {
        self.quality + self.cost + self.lead_time + self.payment_terms
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        PriorityWeights {
            quality: 25,
            cost: 25,
            lead_time: 25,
            payment_terms: 25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLineItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    /// Catalog price adjusted by supplier price level.
    pub reference_price: f64,
    pub volume_discount_percent: f64,
    pub discounted_price: f64,
}

/// Reference pricing computed from catalog for one supplier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingContext {
    pub items: Vec<PricedLineItem>,
    /// Quantity weighted average of reference prices.
    pub average_reference_price: Option<f64>,
    /// Quantity weighted average of prices after volume discounts.
    pub average_discounted_price: Option<f64>,
    /// Requested products missing in catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Everything message generator gets to know before writing next message.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundContext {
    pub negotiation_id: String,
    pub supplier_id: String,
    /// Side on whose behalf message is generated.
    pub party: Party,
    pub round: u32,
    pub max_rounds: u32,
    pub line_items: Vec<LineItem>,
    pub priorities: PriorityWeights,
    pub ledger: OfferLedger,
    pub prior_messages: Vec<MessageRecord>,
    /// Latest message from the other side in this negotiation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opposing_message: Option<String>,
    /// Formatted user interventions. Only for our side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    /// Catalog pricing and volume discounts. Only for supplier side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitutions: Option<String>,
}

impl RoundContext {
    pub fn is_last_round(&self) -> bool {
        self.round + 1 >= self.max_rounds
    }

    /// Latest Offer issued by the other side.
    pub fn opposing_offer(&self) -> Option<&rfq_offer_utils::Offer> {
        self.ledger
            .latest_by_source(self.party.opposite())
            .map(|entry| &entry.offer)
    }

    /// Our own latest Offer.
    pub fn own_offer(&self) -> Option<&rfq_offer_utils::Offer> {
        self.ledger
            .latest_by_source(self.party)
            .map(|entry| &entry.offer)
    }
}
