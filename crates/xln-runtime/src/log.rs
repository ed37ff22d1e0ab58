//! `LogEntry` (§7): "every failure produces a structured log entry `{level,
//! category, message, data, entityId?}` attached to the tick's snapshot."
//! Pushed onto `EnvSnapshot.logs` *and* emitted through `tracing`, mirroring
//! how the teacher's `FinalityTracker` both returns a `ConfirmationEvent`
//! and logs through `tracing` at the same call site.

use serde::{Deserialize, Serialize};
use xln_core::EntityId;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogCategory {
    Admission,
    Consensus,
    JBlock,
    Backpressure,
    Deadline,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub data: Option<String>,
    pub entity_id: Option<EntityId>,
}

impl LogEntry {
    pub fn new(level: LogLevel, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            level,
            category,
            message: message.into(),
            data: None,
            entity_id: None,
        }
    }

    pub fn with_entity(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn emit(&self) {
        match self.level {
            LogLevel::Debug => tracing::debug!(category = ?self.category, entity_id = ?self.entity_id, "{}", self.message),
            LogLevel::Info => tracing::info!(category = ?self.category, entity_id = ?self.entity_id, "{}", self.message),
            LogLevel::Warn => tracing::warn!(category = ?self.category, entity_id = ?self.entity_id, "{}", self.message),
            LogLevel::Error => tracing::error!(category = ?self.category, entity_id = ?self.entity_id, "{}", self.message),
        }
    }
}
