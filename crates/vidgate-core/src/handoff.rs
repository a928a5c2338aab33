//! Source handoff between the page that picks a video and the player
//!
//! An opener pushes `{url, timestamp}`; the player takes the oldest entry
//! that is still fresh. Anything older than the TTL is discarded unread.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Handoff message; `timestamp` is Unix milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffMessage {
    pub url: String,
    pub timestamp: i64,
}

impl HandoffMessage {
    pub fn new(url: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            timestamp: at.timestamp_millis(),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        match self.created_at() {
            Some(created) => now - created > ttl,
            None => true,
        }
    }
}

/// In-memory handoff queue
#[derive(Debug)]
pub struct HandoffQueue {
    entries: VecDeque<HandoffMessage>,
    ttl: TimeDelta,
}

impl HandoffQueue {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::days(365)),
        }
    }

    pub fn push(&mut self, message: HandoffMessage) {
        self.entries.push_back(message);
    }

    /// Oldest fresh entry; expired entries ahead of it are dropped
    pub fn take(&mut self, now: DateTime<Utc>) -> Option<HandoffMessage> {
        while let Some(message) = self.entries.pop_front() {
            if message.is_expired(now, self.ttl) {
                debug!(url = %message.url, timestamp = message.timestamp, "Discarding expired handoff");
                continue;
            }
            return Some(message);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
