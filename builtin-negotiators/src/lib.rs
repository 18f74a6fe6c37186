pub mod accept_all;
pub mod concession;
pub mod hold_firm;

pub use accept_all::AcceptAll;
pub use concession::LinearConcession;
pub use hold_firm::HoldFirm;

use rfq_offer_utils::Offer;

/// Rounds price to cents.
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

pub fn describe_offer(offer: &Offer) -> String {
    format!(
        "${:.2} per unit with {} days lead time and {} payment terms",
        offer.unit_price, offer.lead_time_days, offer.payment_terms
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::Offer;
    use rfq_negotiator_component::{PriorityWeights, RoundContext};
    use rfq_offer_utils::{OfferLedger, Party};

    pub fn context(party: Party, round: u32, max_rounds: u32) -> RoundContext {
        RoundContext {
            negotiation_id: "negotiation-1".to_string(),
            supplier_id: "supplier-1".to_string(),
            party,
            round,
            max_rounds,
            line_items: vec![],
            priorities: PriorityWeights::default(),
            ledger: OfferLedger::new(),
            prior_messages: vec![],
            opposing_message: None,
            guidance: None,
            pricing: None,
            substitutions: None,
        }
    }

    #[test]
    fn test_describe_offer() {
        let offer = Offer::new(12.5, 14, "30/70");
        assert_eq!(
            super::describe_offer(&offer),
            "$12.50 per unit with 14 days lead time and 30/70 payment terms"
        );
    }
}
