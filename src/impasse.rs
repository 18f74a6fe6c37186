use serde::{Deserialize, Serialize};

use rfq_offer_utils::{OfferLedger, Party};

use crate::error::NegotiationError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpasseConfig {
    pub max_rounds: u32,
    /// Number of recent supplier Offers checked for price improvement.
    pub progress_window_size: usize,
    /// Maximal acceptable gap between prices, relative to our reference price.
    pub price_gap_threshold: f64,
    pub max_acceptable_lead_time: u32,
}

impl Default for ImpasseConfig {
    fn default() -> Self {
        ImpasseConfig {
            max_rounds: 10,
            progress_window_size: 3,
            price_gap_threshold: 0.25,
            max_acceptable_lead_time: 60,
        }
    }
}

impl ImpasseConfig {
    pub fn validate(&self) -> Result<(), NegotiationError> {
        if self.max_rounds == 0 {
            return Err(NegotiationError::InvalidConfig(
                "impasse.max_rounds must be positive".to_string(),
            ));
        }
        if self.progress_window_size < 2 {
            return Err(NegotiationError::InvalidConfig(format!(
                "impasse.progress_window_size must be at least 2, got {}",
                self.progress_window_size
            )));
        }
        if !(self.price_gap_threshold >= 0.0) {
            return Err(NegotiationError::InvalidConfig(format!(
                "impasse.price_gap_threshold can't be negative, got {}",
                self.price_gap_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpasseConditions {
    pub max_rounds_reached: bool,
    pub explicit_rejection: bool,
    pub no_progress_in_rounds: bool,
    pub price_gap_too_large: bool,
    pub lead_time_unacceptable: bool,
}

impl ImpasseConditions {
    pub fn any(&self) -> bool {
        self.max_rounds_reached
            || self.explicit_rejection
            || self.no_progress_in_rounds
            || self.price_gap_too_large
            || self.lead_time_unacceptable
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpasseResult {
    pub is_impasse: bool,
    pub conditions: ImpasseConditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_reason: Option<String>,
    pub details: String,
}

/// Checks whether negotiation can still progress. Holds no state between calls.
#[derive(Clone, Debug, Default)]
pub struct ImpasseDetector {
    config: ImpasseConfig,
}

impl ImpasseDetector {
    pub fn new(config: ImpasseConfig) -> ImpasseDetector {
        ImpasseDetector { config }
    }

    pub fn config(&self) -> &ImpasseConfig {
        &self.config
    }

    /// `target_price` is used as our reference price, until we make
    /// first Offer ourselves.
    pub fn detect(
        &self,
        round: u32,
        ledger: &OfferLedger,
        explicit_rejection: bool,
        target_price: Option<f64>,
    ) -> ImpasseResult {
        let config = &self.config;
        let gap = price_gap(ledger, target_price);
        let lead_time = ledger.latest().map(|entry| entry.offer.lead_time_days);

        let conditions = ImpasseConditions {
            max_rounds_reached: round >= config.max_rounds,
            explicit_rejection,
            no_progress_in_rounds: !ledger.has_price_improved(config.progress_window_size),
            price_gap_too_large: gap
                .map(|gap| gap.relative > config.price_gap_threshold)
                .unwrap_or(false),
            lead_time_unacceptable: lead_time
                .map(|days| days > config.max_acceptable_lead_time)
                .unwrap_or(false),
        };

        // Order of this list decides, which reason is primary.
        let mut triggered: Vec<(&str, String)> = vec![];
        if conditions.explicit_rejection {
            triggered.push((
                "Explicit rejection by party",
                "One of the parties explicitly rejected the terms.".to_string(),
            ));
        }
        if let (true, Some(gap)) = (conditions.price_gap_too_large, gap) {
            triggered.push((
                "Price gap too large",
                format!(
                    "Price gap of ${:.2} ({:.1}%) exceeds {:.1}% threshold.",
                    gap.absolute,
                    gap.relative * 100.0,
                    config.price_gap_threshold * 100.0
                ),
            ));
        }
        if conditions.no_progress_in_rounds {
            triggered.push((
                "No progress in recent rounds",
                format!(
                    "Supplier price did not improve during last {} offers.",
                    config.progress_window_size
                ),
            ));
        }
        if conditions.max_rounds_reached {
            triggered.push((
                "Maximum rounds reached",
                format!("Round {} reached limit of {} rounds.", round, config.max_rounds),
            ));
        }
        if let (true, Some(days)) = (conditions.lead_time_unacceptable, lead_time) {
            triggered.push((
                "Lead time unacceptable",
                format!(
                    "Lead time of {} days exceeds acceptable {} days.",
                    days, config.max_acceptable_lead_time
                ),
            ));
        }

        ImpasseResult {
            is_impasse: conditions.any(),
            primary_reason: triggered.first().map(|(reason, _)| reason.to_string()),
            details: triggered
                .iter()
                .map(|(_, detail)| detail.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            conditions,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PriceGap {
    absolute: f64,
    relative: f64,
}

fn price_gap(ledger: &OfferLedger, target_price: Option<f64>) -> Option<PriceGap> {
    let supplier_price = ledger.latest_by_source(Party::Supplier)?.offer.unit_price;
    let reference = ledger
        .latest_by_source(Party::Requestor)
        .map(|entry| entry.offer.unit_price)
        .or(target_price)?;

    if reference <= 0.0 {
        return None;
    }

    let absolute = (supplier_price - reference).abs();
    Some(PriceGap {
        absolute,
        relative: absolute / reference,
    })
}
