use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use rfq_offer_utils::{Offer, Party};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    #[display(fmt = "active")]
    Active,
    #[display(fmt = "completed")]
    Completed,
    #[display(fmt = "impasse")]
    Impasse,
}

impl NegotiationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NegotiationStatus::Active)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub sender: Party,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferReceived {
    pub supplier_id: String,
    pub avg_price: f64,
    pub lead_time: u32,
    pub payment_terms: String,
}

/// Out-of-band directive from user, that our side should follow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Persistence layer as seen by negotiations. Implementations handle their
/// own consistency; negotiations never lock anything on their side.
/// Errors returned from these functions abort the negotiation, that called them.
#[async_trait]
pub trait NegotiationCallbacks: Send + Sync {
    async fn on_message(&self, negotiation_id: &str, message: &MessageRecord)
        -> anyhow::Result<()>;

    /// Called once, when negotiation reaches terminal status.
    async fn on_status_change(
        &self,
        negotiation_id: &str,
        status: NegotiationStatus,
        round_count: u32,
        final_offer: Option<&Offer>,
    ) -> anyhow::Result<()>;

    async fn on_offer_received(
        &self,
        _negotiation_id: &str,
        _offer: &OfferReceived,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Interventions with timestamp strictly greater than `since`.
    /// `None` means all interventions.
    async fn get_user_interventions(
        &self,
        _negotiation_id: &str,
        _since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Intervention>> {
        Ok(vec![])
    }
}

/// Callbacks, that drop everything. Useful when nothing should be persisted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPersistence;

#[async_trait]
impl NegotiationCallbacks for NoPersistence {
    async fn on_message(&self, _: &str, _: &MessageRecord) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_status_change(
        &self,
        _: &str,
        _: NegotiationStatus,
        _: u32,
        _: Option<&Offer>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
