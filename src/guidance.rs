//! Heuristic interpretation of user interventions.
//!
//! Interventions are free text typed by user while negotiations run. We don't
//! try to understand them fully, only pick directives, that are easy to spot
//! with patterns (price and lead time limits, accept/walk away instructions,
//! criteria to focus on). Original text is always passed to our generator anyway.

use chrono::{DateTime, Utc};
use derive_more::Display;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use rfq_negotiator_component::Intervention;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusArea {
    #[display(fmt = "price")]
    Price,
    #[display(fmt = "lead time")]
    LeadTime,
    #[display(fmt = "quality")]
    Quality,
    #[display(fmt = "payment terms")]
    PaymentTerms,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuidanceDirectives {
    pub price_limit: Option<f64>,
    pub lead_time_limit: Option<u32>,
    pub accept_if_met: Option<bool>,
    pub walk_away: Option<bool>,
    #[serde(default)]
    pub focus_areas: Vec<FocusArea>,
}

lazy_static! {
    static ref DOLLAR_AMOUNT: Regex = Regex::new(r"\$\s?(\d+(?:\.\d+)?)").unwrap();
    static ref PRICE_AMOUNT: Regex =
        Regex::new(r"(?i)\b(?:price|cost|budget)\b[^\d\n]{0,20}(\d+(?:\.\d+)?)(\s*days?)?").unwrap();
    static ref DAYS: Regex = Regex::new(r"(?i)(\d+)\s*(?:business\s+|working\s+)?days?\b").unwrap();
    static ref ACCEPT_IF_MET: Regex = Regex::new(
        r"(?i)\baccept\b[^.!?\n]*\bif\b|\bif\b[^.!?\n]*\baccept\b|\bgo ahead\b|\bclose the deal\b"
    )
    .unwrap();
    static ref WALK_AWAY: Regex = Regex::new(
        r"(?i)\bwalk\s*-?\s*away\b|\bend (?:the )?negotiations?\b|\bstop negotiating\b|\bpull out\b"
    )
    .unwrap();
    static ref URGENT: Regex = Regex::new(
        r"(?i)\b(?:urgent(?:ly)?|asap|immediately|critical|rush|right away|deadline)\b"
    )
    .unwrap();
    static ref FOCUS: Vec<(FocusArea, Regex)> = vec![
        (
            FocusArea::Price,
            Regex::new(r"(?i)\b(?:price|cost|cheap(?:er)?|discount|budget)\b").unwrap()
        ),
        (
            FocusArea::LeadTime,
            Regex::new(r"(?i)\b(?:lead\s*time|deliver(?:y|ed)?|faster|quick(?:er|ly)?|days?)\b")
                .unwrap()
        ),
        (
            FocusArea::Quality,
            Regex::new(r"(?i)\b(?:quality|defects?|certifi(?:ed|cation))\b").unwrap()
        ),
        (
            FocusArea::PaymentTerms,
            Regex::new(r"(?i)\b(?:payment|upfront|deposit|terms)\b").unwrap()
        ),
    ];
}

fn parse_price_limit(text: &str) -> Option<f64> {
    if let Some(captures) = DOLLAR_AMOUNT.captures(text) {
        return captures.get(1).and_then(|m| m.as_str().parse().ok());
    }

    PRICE_AMOUNT
        .captures_iter(text)
        // Number followed by `days` is lead time, not a price.
        .find(|captures| captures.get(2).is_none())
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn parse_guidance(text: &str) -> GuidanceDirectives {
    GuidanceDirectives {
        price_limit: parse_price_limit(text),
        lead_time_limit: DAYS
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        accept_if_met: ACCEPT_IF_MET.is_match(text).then(|| true),
        walk_away: WALK_AWAY.is_match(text).then(|| true),
        focus_areas: FOCUS
            .iter()
            .filter(|(_, pattern)| pattern.is_match(text))
            .map(|(area, _)| *area)
            .collect(),
    }
}

pub fn is_urgent(text: &str) -> bool {
    URGENT.is_match(text)
}

impl GuidanceDirectives {
    /// Newer directives override older ones, focus areas accumulate.
    pub fn merge(&mut self, newer: GuidanceDirectives) {
        self.price_limit = newer.price_limit.or(self.price_limit);
        self.lead_time_limit = newer.lead_time_limit.or(self.lead_time_limit);
        self.accept_if_met = newer.accept_if_met.or(self.accept_if_met);
        self.walk_away = newer.walk_away.or(self.walk_away);
        for area in newer.focus_areas {
            if !self.focus_areas.contains(&area) {
                self.focus_areas.push(area);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == GuidanceDirectives::default()
    }
}

/// Guidance accumulated during single negotiation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActiveGuidance {
    interventions: Vec<Intervention>,
    directives: GuidanceDirectives,
    urgent: bool,
    last_processed: Option<DateTime<Utc>>,
}

impl ActiveGuidance {
    pub fn new() -> ActiveGuidance {
        ActiveGuidance::default()
    }

    /// Timestamp of the newest processed intervention.
    pub fn last_processed(&self) -> Option<DateTime<Utc>> {
        self.last_processed
    }

    pub fn directives(&self) -> &GuidanceDirectives {
        &self.directives
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    pub fn interventions(&self) -> &[Intervention] {
        &self.interventions
    }

    /// Adds interventions newer than already processed ones.
    /// Returns number of interventions, that were actually added.
    pub fn merge(&mut self, mut interventions: Vec<Intervention>) -> usize {
        interventions.sort_by_key(|intervention| intervention.timestamp);

        let mut added = 0;
        for intervention in interventions {
            if let Some(last) = self.last_processed {
                if intervention.timestamp <= last {
                    log::debug!(
                        "Skipping already processed intervention [{}].",
                        intervention.id
                    );
                    continue;
                }
            }

            self.directives.merge(parse_guidance(&intervention.content));
            self.urgent |= is_urgent(&intervention.content);
            self.last_processed = Some(intervention.timestamp);
            self.interventions.push(intervention);
            added += 1;
        }
        added
    }

    /// Text for our message generator. None when user didn't intervene.
    pub fn format(&self) -> Option<String> {
        if self.interventions.is_empty() {
            return None;
        }

        let mut text = match self.urgent {
            true => "USER GUIDANCE (URGENT):\n".to_string(),
            false => "USER GUIDANCE:\n".to_string(),
        };
        for intervention in &self.interventions {
            let _ = writeln!(text, "- \"{}\"", intervention.content.trim());
        }

        let mut directives = vec![];
        let d = &self.directives;
        if let Some(limit) = d.price_limit {
            directives.push(format!("do not exceed ${:.2} per unit", limit));
        }
        if let Some(days) = d.lead_time_limit {
            directives.push(format!("lead time must be at most {} days", days));
        }
        if d.accept_if_met == Some(true) {
            directives.push("accept as soon as these conditions are met".to_string());
        }
        if d.walk_away == Some(true) {
            directives.push("be ready to walk away".to_string());
        }
        if !d.focus_areas.is_empty() {
            let areas = d
                .focus_areas
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            directives.push(format!("focus on {}", areas.join(", ")));
        }

        if !directives.is_empty() {
            let _ = write!(text, "Directives: {}.", directives.join("; "));
        }
        Some(text.trim_end().to_string())
    }
}
