use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rfq_negotiator_component::{
    Intervention, MessageRecord, NegotiationCallbacks, NegotiationStatus, OfferReceived,
};
use rfq_offer_utils::Offer;

use crate::error::{FailurePoint, RecordError};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NegotiationStage {
    Message(MessageRecord),
    OfferReceived(OfferReceived),
    StatusChange {
        status: NegotiationStatus,
        round_count: u32,
        final_offer: Option<Offer>,
    },
    Error(String),
}

/// Everything persisted by single negotiation, in order of callbacks.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NegotiationResult {
    pub stages: Vec<NegotiationStage>,
}

impl NegotiationResult {
    pub fn messages(&self) -> Vec<&MessageRecord> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                NegotiationStage::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn offers(&self) -> Vec<&OfferReceived> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                NegotiationStage::OfferReceived(offer) => Some(offer),
                _ => None,
            })
            .collect()
    }

    pub fn status_changes(&self) -> Vec<(NegotiationStatus, u32, Option<&Offer>)> {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                NegotiationStage::StatusChange {
                    status,
                    round_count,
                    final_offer,
                } => Some((*status, *round_count, final_offer.as_ref())),
                _ => None,
            })
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.stages.last(),
            Some(NegotiationStage::StatusChange { .. }) | Some(NegotiationStage::Error(_))
        )
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NegotiationRecord {
    pub results: HashMap<String, NegotiationResult>,
    /// Interventions visible to all negotiations.
    pub interventions: Vec<Intervention>,
    /// `since` parameters of interventions queries by negotiation.
    pub intervention_queries: HashMap<String, Vec<Option<DateTime<Utc>>>>,

    #[serde(skip)]
    fail_on: Option<FailurePoint>,
    /// Negotiations affected by `fail_on`. All of them, if not set.
    #[serde(skip)]
    failing: Option<HashSet<String>>,
}

impl NegotiationRecord {
    pub fn get(&self, negotiation_id: &str) -> Result<&NegotiationResult, RecordError> {
        self.results
            .get(negotiation_id)
            .ok_or_else(|| RecordError::NegotiationNotFound(negotiation_id.to_string()))
    }

    fn injected(&mut self, point: FailurePoint, negotiation_id: &str) -> anyhow::Result<()> {
        let selected = match &self.failing {
            Some(failing) => failing.contains(negotiation_id),
            None => true,
        };
        if self.fail_on == Some(point) && selected {
            let error = RecordError::Injected {
                point,
                negotiation_id: negotiation_id.to_string(),
            };
            self.results
                .entry(negotiation_id.to_string())
                .or_default()
                .stages
                .push(NegotiationStage::Error(error.to_string()));
            return Err(error.into());
        }
        Ok(())
    }
}

/// In-memory persistence layer recording all callbacks.
#[derive(Clone, Debug, Default)]
pub struct NegotiationRecordSync(pub Arc<Mutex<NegotiationRecord>>);

impl NegotiationRecordSync {
    pub fn new() -> NegotiationRecordSync {
        NegotiationRecordSync::default()
    }

    /// Makes given callback return error.
    pub fn fail_on(self, point: FailurePoint) -> NegotiationRecordSync {
        self.lock().fail_on = Some(point);
        self
    }

    /// Like `fail_on`, but only negotiations added with `select_failing`
    /// will fail.
    pub fn fail_on_selected(self, point: FailurePoint) -> NegotiationRecordSync {
        {
            let mut record = self.lock();
            record.fail_on = Some(point);
            record.failing = Some(HashSet::new());
        }
        self
    }

    pub fn select_failing(&self, negotiation_id: &str) {
        self.lock()
            .failing
            .get_or_insert_with(HashSet::new)
            .insert(negotiation_id.to_string());
    }

    pub fn add_intervention(&self, id: &str, content: &str, timestamp: DateTime<Utc>) {
        self.lock().interventions.push(Intervention {
            id: id.to_string(),
            content: content.to_string(),
            timestamp,
        });
    }

    pub fn lock(&self) -> MutexGuard<NegotiationRecord> {
        // Panicking test thread shouldn't hide record from other tests.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> NegotiationRecord {
        self.lock().clone()
    }

    pub fn result(&self, negotiation_id: &str) -> Result<NegotiationResult, RecordError> {
        self.lock().get(negotiation_id).cloned()
    }

    pub fn is_finished(&self) -> bool {
        self.lock()
            .results
            .values()
            .all(|result| result.is_finished())
    }
}

#[async_trait]
impl NegotiationCallbacks for NegotiationRecordSync {
    async fn on_message(
        &self,
        negotiation_id: &str,
        message: &MessageRecord,
    ) -> anyhow::Result<()> {
        let mut record = self.lock();
        let idx = record
            .results
            .get(negotiation_id)
            .map(|result| result.messages().len())
            .unwrap_or(0);
        record.injected(FailurePoint::Message(idx), negotiation_id)?;

        record
            .results
            .entry(negotiation_id.to_string())
            .or_default()
            .stages
            .push(NegotiationStage::Message(message.clone()));
        Ok(())
    }

    async fn on_status_change(
        &self,
        negotiation_id: &str,
        status: NegotiationStatus,
        round_count: u32,
        final_offer: Option<&Offer>,
    ) -> anyhow::Result<()> {
        let mut record = self.lock();
        record.injected(FailurePoint::StatusChange, negotiation_id)?;

        record
            .results
            .entry(negotiation_id.to_string())
            .or_default()
            .stages
            .push(NegotiationStage::StatusChange {
                status,
                round_count,
                final_offer: final_offer.cloned(),
            });
        Ok(())
    }

    async fn on_offer_received(
        &self,
        negotiation_id: &str,
        offer: &OfferReceived,
    ) -> anyhow::Result<()> {
        let mut record = self.lock();
        record.injected(FailurePoint::OfferReceived, negotiation_id)?;

        record
            .results
            .entry(negotiation_id.to_string())
            .or_default()
            .stages
            .push(NegotiationStage::OfferReceived(offer.clone()));
        Ok(())
    }

    async fn get_user_interventions(
        &self,
        negotiation_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Intervention>> {
        let mut record = self.lock();
        record.injected(FailurePoint::Interventions, negotiation_id)?;

        record
            .intervention_queries
            .entry(negotiation_id.to_string())
            .or_default()
            .push(since);

        Ok(record
            .interventions
            .iter()
            .filter(|intervention| match since {
                Some(since) => intervention.timestamp > since,
                None => true,
            })
            .cloned()
            .collect())
    }
}

impl fmt::Display for NegotiationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string_pretty(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", text)
    }
}

impl fmt::Display for NegotiationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string_pretty(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", text)
    }
}
