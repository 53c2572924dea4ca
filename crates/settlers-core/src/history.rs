//! Player-facing game log.
//!
//! Only the most recent [`LOG_CAPACITY`] entries are kept; older ones are
//! dropped first.

use crate::player::PlayerColor;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

pub const LOG_CAPACITY: usize = 50;

/// A single line of the game log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    /// Player the line is about, if any
    pub player_color: Option<PlayerColor>,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, player_color: Option<PlayerColor>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self {
            message: message.into(),
            player_color,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameLog {
    entries: VecDeque<LogEntry>,
}

impl GameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>, player_color: Option<PlayerColor>) {
        self.entries.push_back(LogEntry::new(message, player_color));
        while self.entries.len() > LOG_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}
