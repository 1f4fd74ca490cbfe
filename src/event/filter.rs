//! Event filters.
//!
//! A filter set is a disjunction: an event is wanted if any filter matches
//! it, and an empty set matches every event. Inside one filter the type,
//! contract and topic conditions must all hold.
//!
//! Topic patterns are segment lists. `*` matches exactly one segment and a
//! trailing `**` matches whatever remains (including nothing).

use serde::{Deserialize, Serialize};

use crate::event::decoder::{ContractEvent, EventType};

/// Maximum number of filters in one set.
pub const MAX_FILTERS: usize = 5;
/// Maximum number of contract ids in one filter.
pub const MAX_CONTRACT_IDS: usize = 5;
/// Maximum number of topic patterns in one filter.
pub const MAX_TOPIC_PATTERNS: usize = 5;
/// Maximum number of concrete segments in one topic pattern.
pub const MAX_TOPIC_SEGMENTS: usize = 4;

const ANY_SEGMENT: &str = "*";
const ANY_REMAINDER: &str = "**";

/// Criteria for selecting events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,

    #[serde(default, alias = "contract_ids", skip_serializing_if = "Vec::is_empty")]
    pub contract_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<Vec<String>>,
}

impl EventFilter {
    /// Contract events emitted by any of `ids`.
    pub fn contract<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_type: Some(EventType::Contract),
            contract_ids: ids.into_iter().map(Into::into).collect(),
            topics: Vec::new(),
        }
    }

    /// Add a topic pattern.
    pub fn with_topic<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.push(segments.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `event` satisfies every condition of this filter.
    pub fn matches(&self, event: &ContractEvent) -> bool {
        if let Some(kind) = self.event_type {
            if kind != event.event_type {
                return false;
            }
        }

        if !self.contract_ids.is_empty() {
            match &event.contract_id {
                Some(id) if self.contract_ids.iter().any(|c| c == id) => {}
                _ => return false,
            }
        }

        self.topics.is_empty()
            || self
                .topics
                .iter()
                .any(|pattern| topic_matches(pattern, &event.topics))
    }

    /// Check this filter against the source's limits.
    pub fn validate(&self) -> Result<(), String> {
        if self.contract_ids.len() > MAX_CONTRACT_IDS {
            return Err(format!(
                "{} contract ids exceeds the limit of {}",
                self.contract_ids.len(),
                MAX_CONTRACT_IDS
            ));
        }
        if self.contract_ids.iter().any(|id| id.is_empty()) {
            return Err("contract id must not be empty".to_string());
        }
        if self.topics.len() > MAX_TOPIC_PATTERNS {
            return Err(format!(
                "{} topic patterns exceeds the limit of {}",
                self.topics.len(),
                MAX_TOPIC_PATTERNS
            ));
        }
        for pattern in &self.topics {
            validate_pattern(pattern)?;
        }
        Ok(())
    }
}

/// Whether any filter in `filters` matches. An empty set matches everything.
pub fn matches_any(filters: &[EventFilter], event: &ContractEvent) -> bool {
    filters.is_empty() || filters.iter().any(|f| f.matches(event))
}

/// Validate a whole filter set.
pub fn validate_filters(filters: &[EventFilter]) -> Result<(), String> {
    if filters.len() > MAX_FILTERS {
        return Err(format!(
            "{} filters exceeds the limit of {}",
            filters.len(),
            MAX_FILTERS
        ));
    }
    for (i, filter) in filters.iter().enumerate() {
        filter.validate().map_err(|e| format!("filter {}: {}", i, e))?;
    }
    Ok(())
}

fn validate_pattern(pattern: &[String]) -> Result<(), String> {
    let concrete = match pattern.split_last() {
        Some((last, rest)) if last == ANY_REMAINDER => rest,
        Some(_) => pattern,
        None => return Err("topic pattern must not be empty".to_string()),
    };
    if concrete.iter().any(|s| s == ANY_REMAINDER) {
        return Err("'**' is only allowed as the last topic segment".to_string());
    }
    if concrete.len() > MAX_TOPIC_SEGMENTS {
        return Err(format!(
            "topic pattern has {} segments, limit is {}",
            concrete.len(),
            MAX_TOPIC_SEGMENTS
        ));
    }
    Ok(())
}

fn topic_matches(pattern: &[String], topics: &[String]) -> bool {
    for (i, segment) in pattern.iter().enumerate() {
        if segment == ANY_REMAINDER {
            return true;
        }
        match topics.get(i) {
            Some(topic) if segment == ANY_SEGMENT || segment == topic => {}
            _ => return false,
        }
    }
    pattern.len() == topics.len()
}
