use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::Error;

pub const MAX_COST_REDUCTION_PERCENT: f64 = 50.0;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityImpact {
    #[display(fmt = "none")]
    None,
    #[display(fmt = "minor")]
    Minor,
    #[display(fmt = "moderate")]
    Moderate,
    #[display(fmt = "significant")]
    Significant,
}

impl QualityImpact {
    pub fn weight(self) -> f64 {
        match self {
            QualityImpact::None => 0.0,
            QualityImpact::Minor => 1.0,
            QualityImpact::Moderate => 2.0,
            QualityImpact::Significant => 3.0,
        }
    }

    /// Buckets averaged weights back into label.
    pub fn from_average(average: f64) -> QualityImpact {
        if average < 0.5 {
            QualityImpact::None
        } else if average < 1.5 {
            QualityImpact::Minor
        } else if average < 2.5 {
            QualityImpact::Moderate
        } else {
            QualityImpact::Significant
        }
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Alternative material or specification offered in exchange for lower
/// cost or changed lead time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionProposal {
    pub product_id: String,
    pub original_material: String,
    pub suggested_material: String,
    pub cost_reduction_percent: f64,
    pub quality_impact: QualityImpact,
    /// Change of lead time in days. Negative values mean faster delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_time_change: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionResponse {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionRecord {
    pub id: String,
    pub proposal: SubstitutionProposal,
    pub status: SubstitutionStatus,
    pub proposed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<SubstitutionResponse>,
}

/// Tracks proposed substitutions of single negotiation and their outcomes.
/// Each record goes `pending -> accepted | rejected` and is never changed later.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionLedger {
    records: Vec<SubstitutionRecord>,
}

impl SubstitutionLedger {
    pub fn new() -> SubstitutionLedger {
        SubstitutionLedger::default()
    }

    pub fn propose(
        &mut self,
        proposal: SubstitutionProposal,
        id: impl Into<String>,
    ) -> Result<&SubstitutionRecord, Error> {
        let id = id.into();
        if !(0.0..=MAX_COST_REDUCTION_PERCENT).contains(&proposal.cost_reduction_percent) {
            return Err(Error::InvalidSubstitution(format!(
                "cost reduction {}% outside of [0, {}]",
                proposal.cost_reduction_percent, MAX_COST_REDUCTION_PERCENT
            )));
        }
        if self.get(&id).is_some() {
            return Err(Error::DuplicateSubstitution(id));
        }

        log::debug!(
            "Substitution [{}] proposed: {} -> {} for product {}.",
            id,
            proposal.original_material,
            proposal.suggested_material,
            proposal.product_id
        );

        self.records.push(SubstitutionRecord {
            id,
            proposal,
            status: SubstitutionStatus::Pending,
            proposed_at: Utc::now(),
            response: None,
        });
        Ok(&self.records[self.records.len() - 1])
    }

    /// Returns `None` for unknown ids and for substitutions, that were already
    /// accepted or rejected.
    pub fn accept(&mut self, id: &str, conditions: Option<String>) -> Option<&SubstitutionRecord> {
        self.resolve(
            id,
            SubstitutionStatus::Accepted,
            SubstitutionResponse {
                timestamp: Utc::now(),
                reason: None,
                conditions,
            },
        )
    }

    pub fn reject(&mut self, id: &str, reason: impl Into<String>) -> Option<&SubstitutionRecord> {
        self.resolve(
            id,
            SubstitutionStatus::Rejected,
            SubstitutionResponse {
                timestamp: Utc::now(),
                reason: Some(reason.into()),
                conditions: None,
            },
        )
    }

    fn resolve(
        &mut self,
        id: &str,
        status: SubstitutionStatus,
        response: SubstitutionResponse,
    ) -> Option<&SubstitutionRecord> {
        let record = self.records.iter_mut().find(|record| record.id == id)?;
        if record.status != SubstitutionStatus::Pending {
            log::warn!(
                "Substitution [{}] is already {}, can't change it to {}.",
                id,
                record.status,
                status
            );
            return None;
        }

        record.status = status;
        record.response = Some(response);
        Some(record)
    }

    pub fn get(&self, id: &str) -> Option<&SubstitutionRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn records(&self) -> &[SubstitutionRecord] {
        &self.records
    }

    fn with_status(&self, status: SubstitutionStatus) -> Vec<&SubstitutionRecord> {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .collect()
    }

    pub fn get_accepted(&self) -> Vec<&SubstitutionRecord> {
        self.with_status(SubstitutionStatus::Accepted)
    }

    pub fn get_rejected(&self) -> Vec<&SubstitutionRecord> {
        self.with_status(SubstitutionStatus::Rejected)
    }

    pub fn get_pending(&self) -> Vec<&SubstitutionRecord> {
        self.with_status(SubstitutionStatus::Pending)
    }

    /// Sum of cost reductions of accepted substitutions.
    pub fn calculate_total_savings(&self) -> f64 {
        self.get_accepted()
            .iter()
            .map(|record| record.proposal.cost_reduction_percent)
            .sum()
    }

    pub fn calculate_quality_impact(&self) -> QualityImpact {
        let accepted = self.get_accepted();
        if accepted.is_empty() {
            return QualityImpact::None;
        }

        let total: f64 = accepted
            .iter()
            .map(|record| record.proposal.quality_impact.weight())
            .sum();
        QualityImpact::from_average(total / accepted.len() as f64)
    }

    pub fn calculate_lead_time_change(&self) -> i32 {
        self.get_accepted()
            .iter()
            .map(|record| record.proposal.lead_time_change.unwrap_or(0))
            .sum()
    }

    pub fn summary(&self) -> String {
        if self.records.is_empty() {
            return "No material substitutions were proposed.".to_string();
        }

        let mut summary = String::new();
        let groups = [
            ("Accepted substitutions", self.get_accepted()),
            ("Rejected substitutions", self.get_rejected()),
            ("Pending substitutions", self.get_pending()),
        ];

        for (title, records) in groups.iter().filter(|(_, records)| !records.is_empty()) {
            if !summary.is_empty() {
                summary.push('\n');
            }
            let _ = writeln!(summary, "{}:", title);
            for record in records {
                let _ = writeln!(summary, "- {}", describe(record));
            }
        }
        summary.trim_end().to_string()
    }
}

fn describe(record: &SubstitutionRecord) -> String {
    let proposal = &record.proposal;
    let mut line = format!(
        "{}: {} -> {} ({}% cost reduction, {} quality impact",
        proposal.product_id,
        proposal.original_material,
        proposal.suggested_material,
        proposal.cost_reduction_percent,
        proposal.quality_impact
    );
    if let Some(change) = proposal.lead_time_change {
        let _ = write!(line, ", {:+} days lead time", change);
    }
    line.push(')');

    if let Some(response) = &record.response {
        if let Some(reason) = &response.reason {
            let _ = write!(line, ", reason: {}", reason);
        }
        if let Some(conditions) = &response.conditions {
            let _ = write!(line, ", conditions: {}", conditions);
        }
    }
    line
}
