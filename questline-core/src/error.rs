//! Error types for Questline operations

use crate::QuestId;
use thiserror::Error;

/// Task-entry document errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("Malformed {entry_type} entry: field '{field}' {reason}")]
    MalformedEntry {
        entry_type: String,
        field: String,
        reason: String,
    },

    #[error("Unknown entry type: {entry_type}")]
    UnknownEntryType { entry_type: String },
}

impl EntryError {
    pub(crate) fn malformed(entry_type: &str, field: &str, reason: impl Into<String>) -> Self {
        EntryError::MalformedEntry {
            entry_type: entry_type.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Quest definition document errors. Each rejects exactly one quest.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Invalid quest id: {raw}")]
    InvalidQuestId { raw: String },

    #[error("Quest {quest_id} has no entries")]
    EmptyEntries { quest_id: QuestId },

    #[error("Quest {quest_id} declares entry key '{key}' more than once")]
    DuplicateEntryKey { quest_id: QuestId, key: String },

    #[error("Quest {quest_id} entry '{key}': {source}")]
    Entry {
        quest_id: QuestId,
        key: String,
        #[source]
        source: EntryError,
    },

    #[error("Quest {quest_id} has invalid {field}: {reason}")]
    InvalidField {
        quest_id: QuestId,
        field: String,
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Errors restoring persisted agent state against the live registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Persisted progress references unknown quest {quest_id}")]
    UnknownQuest { quest_id: QuestId },

    #[error("Persisted progress for {quest_id} references unknown entry '{key}'")]
    UnknownEntryKey { quest_id: QuestId, key: String },

    #[error("Progress storage failed: {reason}")]
    StorageFailed { reason: String },
}

/// Master error type for all Questline errors.
#[derive(Debug, Clone, Error)]
pub enum QuestlineError {
    #[error("Entry error: {0}")]
    Entry(#[from] EntryError),

    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Result type alias for Questline operations.
pub type QuestlineResult<T> = Result<T, QuestlineError>;

// =============================================================================
// TESTS
// =============================================================================
