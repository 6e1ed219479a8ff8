//! Bounded FIFO log of past current-weather lookups.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use skycast_core::StorageError;

use crate::types::HistoryEntry;

/// Storage document name for history.
pub const HISTORY_DOCUMENT: &str = "history";

pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Persisted form of the history log, oldest entry first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryDocument {
    pub entries: Vec<HistoryEntry>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl HistoryDocument {
    pub fn from_value(value: Value) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<Value, StorageError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
    last_updated: Option<DateTime<Utc>>,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryLog {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
            last_updated: None,
        }
    }

    /// Rebuild from a stored document, keeping the newest `limit` entries.
    pub fn from_document(document: HistoryDocument, limit: usize) -> Self {
        let mut log = Self::new(limit);
        log.entries = document.entries.into();
        log.last_updated = document.last_updated;
        log.trim();
        log
    }

    pub fn to_document(&self) -> HistoryDocument {
        HistoryDocument {
            entries: self.entries.iter().cloned().collect(),
            last_updated: self.last_updated,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Up to `count` entries, newest first.
    pub fn recent(&self, count: usize) -> Vec<HistoryEntry> {
        self.entries.iter().rev().take(count).cloned().collect()
    }

    /// Append an entry, dropping the oldest ones past the limit.
    /// Returns the number of entries dropped.
    pub fn append(&mut self, entry: HistoryEntry) -> usize {
        self.entries.push_back(entry);
        self.last_updated = Some(Utc::now());
        self.trim()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_updated = Some(Utc::now());
    }

    fn trim(&mut self) -> usize {
        let excess = self.entries.len().saturating_sub(self.limit);
        self.entries.drain(..excess);
        excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TemperatureUnit, WeatherCondition};

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            city: format!("City {}", n),
            country: "XX".into(),
            temperature: n as f64 / 100.0,
            unit: TemperatureUnit::Celsius,
            condition: WeatherCondition::Clear,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_append_refreshes_last_updated() {
        let mut log = HistoryLog::default();
        assert!(log.last_updated().is_none());
        log.append(entry(1));
        assert!(log.last_updated().is_some());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_bounded_at_limit_keeping_newest() {
        let mut log = HistoryLog::default();
        let mut dropped = 0;
        for n in 0..1_250 {
            dropped += log.append(entry(n));
        }

        assert_eq!(log.len(), 1_000);
        assert_eq!(dropped, 250);
        let cities: Vec<_> = log.entries().map(|e| e.city.clone()).collect();
        assert_eq!(cities.first().map(String::as_str), Some("City 250"));
        assert_eq!(cities.last().map(String::as_str), Some("City 1249"));
    }

    #[test]
    fn test_small_limit() {
        let mut log = HistoryLog::new(3);
        for n in 0..5 {
            log.append(entry(n));
        }
        let recent = log.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].city, "City 4");
        assert_eq!(recent[2].city, "City 2");
    }

    #[test]
    fn test_from_oversized_document_keeps_newest() {
        let document = HistoryDocument {
            entries: (0..10).map(entry).collect(),
            last_updated: None,
        };
        let log = HistoryLog::from_document(document, 4);
        let cities: Vec<_> = log.entries().map(|e| e.city.as_str()).collect();
        assert_eq!(cities, vec!["City 6", "City 7", "City 8", "City 9"]);
    }

    #[test]
    fn test_document_round_trip() {
        let mut log = HistoryLog::new(10);
        log.append(entry(1));
        log.append(entry(2));
        let value = log.to_document().to_value().unwrap();
        let restored = HistoryLog::from_document(HistoryDocument::from_value(value).unwrap(), 10);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.last_updated(), log.last_updated());
    }

    #[test]
    fn test_clear() {
        let mut log = HistoryLog::new(10);
        log.append(entry(1));
        log.clear();
        assert!(log.is_empty());
    }
}
