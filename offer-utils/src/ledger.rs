use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{Error, Offer, Party};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferHistoryEntry {
    pub round: u32,
    pub timestamp: DateTime<Utc>,
    pub source: Party,
    pub offer: Offer,
    /// Id of structured action, that carried this Offer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_ref: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    /// Number of distinct rounds, in which any Offer was recorded.
    pub total_rounds: usize,
    pub total_offers: usize,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Price drop between first and last supplier Offer in percents.
    /// Negative value means, that supplier raised the price.
    pub price_improvement_percent: Option<f64>,
    pub final_offer: Option<Offer>,
}

/// Append-only history of Offers exchanged during single negotiation.
///
/// Entries are kept in insertion order and round numbers never decrease.
/// Analysis functions (`has_price_improved`, `is_stalled`) look only at
/// supplier Offers, because our own concessions don't say anything about
/// negotiation progress.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferLedger {
    entries: Vec<OfferHistoryEntry>,
}

impl OfferLedger {
    pub fn new() -> OfferLedger {
        OfferLedger::default()
    }

    pub fn add_offer(
        &mut self,
        round: u32,
        source: Party,
        offer: Offer,
    ) -> Result<&OfferHistoryEntry, Error> {
        self.add_offer_with_ref(round, source, offer, None)
    }

    pub fn add_offer_with_ref(
        &mut self,
        round: u32,
        source: Party,
        offer: Offer,
        action_ref: Option<String>,
    ) -> Result<&OfferHistoryEntry, Error> {
        offer.validate()?;
        if let Some(last) = self.entries.last() {
            if round < last.round {
                return Err(Error::RoundRegression {
                    round,
                    last: last.round,
                });
            }
        }

        log::debug!(
            "Recording {} offer in round {}: {} per unit, {} days, {}.",
            source,
            round,
            offer.unit_price,
            offer.lead_time_days,
            offer.payment_terms
        );

        self.entries.push(OfferHistoryEntry {
            round,
            timestamp: Utc::now(),
            source,
            offer,
            action_ref,
        });

        // We pushed element line above.
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn entries(&self) -> &[OfferHistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&OfferHistoryEntry> {
        self.entries.last()
    }

    pub fn first(&self) -> Option<&OfferHistoryEntry> {
        self.entries.first()
    }

    pub fn latest_by_source(&self, source: Party) -> Option<&OfferHistoryEntry> {
        self.entries.iter().rev().find(|entry| entry.source == source)
    }

    pub fn all_by_source(&self, source: Party) -> Vec<&OfferHistoryEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.source == source)
            .collect()
    }

    /// Prices of all Offers from both sides in insertion order.
    pub fn price_progression(&self) -> Vec<f64> {
        self.entries
            .iter()
            .map(|entry| entry.offer.unit_price)
            .collect()
    }

    fn recent_supplier_prices(&self, window: usize) -> Option<Vec<f64>> {
        let prices = self
            .all_by_source(Party::Supplier)
            .into_iter()
            .map(|entry| entry.offer.unit_price)
            .collect::<Vec<_>>();

        if prices.len() < window {
            return None;
        }
        Some(prices[prices.len() - window..].to_vec())
    }

    /// Returns true, if supplier lowered price at least once during last `window`
    /// Offers. With shorter history we assume, that negotiations are still
    /// progressing.
    pub fn has_price_improved(&self, window: usize) -> bool {
        match self.recent_supplier_prices(window) {
            None => true,
            Some(prices) => prices.windows(2).any(|pair| pair[1] < pair[0]),
        }
    }

    /// Supplier prices stay within `tolerance_percent` of the lowest price
    /// during last `window` Offers. Not enough history is never a stall.
    pub fn is_stalled(&self, window: usize, tolerance_percent: f64) -> bool {
        if window == 0 {
            return false;
        }

        let prices = match self.recent_supplier_prices(window) {
            Some(prices) => prices,
            None => return false,
        };

        let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (max - min) / min * 100.0 <= tolerance_percent
    }

    /// Absolute difference between our latest price and supplier latest price.
    pub fn calculate_price_gap(&self) -> Option<f64> {
        let our = self.latest_by_source(Party::Requestor)?;
        let their = self.latest_by_source(Party::Supplier)?;
        Some((their.offer.unit_price - our.offer.unit_price).abs())
    }

    /// Price gap relative to supplier latest price, in percents.
    pub fn calculate_price_gap_percent(&self) -> Option<f64> {
        let gap = self.calculate_price_gap()?;
        let their = self.latest_by_source(Party::Supplier)?;
        Some(gap / their.offer.unit_price * 100.0)
    }

    pub fn stats(&self) -> LedgerStats {
        let prices = self.price_progression();
        let supplier = self.all_by_source(Party::Supplier);

        let price_improvement_percent = match (supplier.first(), supplier.last()) {
            (Some(first), Some(last)) => Some(
                (first.offer.unit_price - last.offer.unit_price) / first.offer.unit_price * 100.0,
            ),
            _ => None,
        };

        LedgerStats {
            total_rounds: self
                .entries
                .iter()
                .map(|entry| entry.round)
                .collect::<BTreeSet<_>>()
                .len(),
            total_offers: self.entries.len(),
            min_price: prices.iter().cloned().reduce(f64::min),
            max_price: prices.iter().cloned().reduce(f64::max),
            price_improvement_percent,
            final_offer: self.latest().map(|entry| entry.offer.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(price: f64) -> Offer {
        Offer::new(price, 20, "30/70")
    }

    fn ledger_with(prices: &[(Party, f64)]) -> OfferLedger {
        let mut ledger = OfferLedger::new();
        for (round, (party, price)) in prices.iter().enumerate() {
            ledger
                .add_offer(round as u32, *party, offer(*price))
                .unwrap();
        }
        ledger
    }

    #[test]
    fn test_price_progression_keeps_insertion_order() {
        let ledger = ledger_with(&[
            (Party::Requestor, 20.0),
            (Party::Supplier, 30.0),
            (Party::Requestor, 22.0),
            (Party::Supplier, 28.0),
        ]);

        assert_eq!(ledger.price_progression(), vec![20.0, 30.0, 22.0, 28.0]);
        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.first().unwrap().offer.unit_price, 20.0);
        assert_eq!(ledger.latest().unwrap().offer.unit_price, 28.0);
        assert_eq!(
            ledger
                .latest_by_source(Party::Requestor)
                .unwrap()
                .offer
                .unit_price,
            22.0
        );
        assert_eq!(ledger.all_by_source(Party::Supplier).len(), 2);
    }

    #[test]
    fn test_round_regression_rejected() {
        let mut ledger = OfferLedger::new();
        ledger.add_offer(2, Party::Supplier, offer(10.0)).unwrap();
        ledger.add_offer(2, Party::Requestor, offer(9.0)).unwrap();

        match ledger.add_offer(1, Party::Supplier, offer(8.0)) {
            Err(Error::RoundRegression { round: 1, last: 2 }) => {}
            result => panic!("Expected RoundRegression, got {:?}", result),
        }
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_invalid_offer_not_recorded() {
        let mut ledger = OfferLedger::new();
        assert!(ledger.add_offer(0, Party::Supplier, offer(0.0)).is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_price_improved_optimistic_for_sparse_history() {
        let ledger = ledger_with(&[
            (Party::Supplier, 30.0),
            (Party::Requestor, 20.0),
            (Party::Supplier, 30.0),
        ]);
        assert!(ledger.has_price_improved(3));
    }

    #[test]
    fn test_identical_offers_mean_no_progress() {
        let mut ledger = OfferLedger::new();
        for round in 0..3 {
            ledger.add_offer(round, Party::Supplier, offer(30.0)).unwrap();
        }

        assert!(!ledger.has_price_improved(3));
        assert!(ledger.is_stalled(3, 0.0));
    }

    #[test]
    fn test_price_improvement_only_in_window() {
        let ledger = ledger_with(&[
            (Party::Supplier, 40.0),
            (Party::Supplier, 30.0),
            (Party::Supplier, 30.0),
            (Party::Supplier, 31.0),
        ]);

        // Drop from 40 to 30 happened before last 3 Offers.
        assert!(!ledger.has_price_improved(3));
        assert!(ledger.has_price_improved(4));
    }

    #[test]
    fn test_requestor_offers_ignored_by_progress_analysis() {
        let ledger = ledger_with(&[
            (Party::Supplier, 30.0),
            (Party::Requestor, 25.0),
            (Party::Supplier, 30.0),
            (Party::Requestor, 20.0),
            (Party::Supplier, 30.0),
        ]);
        assert!(!ledger.has_price_improved(3));
    }

    #[test]
    fn test_is_stalled_with_tolerance() {
        let ledger = ledger_with(&[
            (Party::Supplier, 100.0),
            (Party::Supplier, 101.0),
            (Party::Supplier, 100.5),
        ]);

        assert!(ledger.is_stalled(3, 1.0));
        assert!(!ledger.is_stalled(3, 0.5));
        assert!(!ledger.is_stalled(4, 50.0));
    }

    #[test]
    fn test_price_gap() {
        let mut ledger = OfferLedger::new();
        assert_eq!(ledger.calculate_price_gap(), None);

        ledger.add_offer(0, Party::Requestor, offer(25.0)).unwrap();
        assert_eq!(ledger.calculate_price_gap(), None);
        assert_eq!(ledger.calculate_price_gap_percent(), None);

        ledger.add_offer(0, Party::Supplier, offer(30.0)).unwrap();
        assert_eq!(ledger.calculate_price_gap(), Some(5.0));

        let percent = ledger.calculate_price_gap_percent().unwrap();
        assert!((percent - 16.666).abs() < 0.01);
    }

    #[test]
    fn test_stats() {
        let mut ledger = OfferLedger::new();
        ledger.add_offer(0, Party::Requestor, offer(20.0)).unwrap();
        ledger.add_offer(0, Party::Supplier, offer(40.0)).unwrap();
        ledger.add_offer(1, Party::Requestor, offer(25.0)).unwrap();
        ledger.add_offer(1, Party::Supplier, offer(30.0)).unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.total_rounds, 2);
        assert_eq!(stats.total_offers, 4);
        assert_eq!(stats.min_price, Some(20.0));
        assert_eq!(stats.max_price, Some(40.0));
        assert_eq!(stats.price_improvement_percent, Some(25.0));
        assert_eq!(stats.final_offer, Some(offer(30.0)));
    }

    #[test]
    fn test_empty_stats() {
        let stats = OfferLedger::new().stats();
        assert_eq!(stats.total_offers, 0);
        assert_eq!(stats.min_price, None);
        assert_eq!(stats.price_improvement_percent, None);
        assert_eq!(stats.final_offer, None);
    }
}
