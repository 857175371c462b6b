//! Per-agent, per-accepted-quest progress.

use questline_core::{QuestDefinition, QuestId, TaskEntry, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which entries of one accepted quest an agent has satisfied.
///
/// Refers to its definition by id; the registry stays the only owner. The
/// satisfied set only grows, except through a reset (which drops the whole
/// record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProgress {
    quest_id: QuestId,
    accepted_at: Timestamp,
    satisfied: BTreeSet<String>,
}

impl AgentProgress {
    pub fn new(quest_id: QuestId, accepted_at: Timestamp) -> Self {
        Self {
            quest_id,
            accepted_at,
            satisfied: BTreeSet::new(),
        }
    }

    pub fn quest_id(&self) -> &QuestId {
        &self.quest_id
    }

    pub fn accepted_at(&self) -> Timestamp {
        self.accepted_at
    }

    pub fn satisfied_keys(&self) -> &BTreeSet<String> {
        &self.satisfied
    }

    pub fn is_satisfied(&self, key: &str) -> bool {
        self.satisfied.contains(key)
    }

    /// Record `key` as satisfied. Keys the definition does not declare are ignored.
    pub fn mark_satisfied(&mut self, definition: &QuestDefinition, key: &str) -> bool {
        if !definition.contains_key(key) {
            return false;
        }
        self.satisfied.insert(key.to_string())
    }

    pub fn is_complete(&self, definition: &QuestDefinition) -> bool {
        definition.keys().all(|key| self.satisfied.contains(key))
    }

    /// Unsatisfied entries, in definition order.
    pub fn unsatisfied<'a>(&self, definition: &'a QuestDefinition) -> Vec<(&'a str, &'a TaskEntry)> {
        definition
            .entries()
            .filter(|(key, _)| !self.satisfied.contains(*key))
            .collect()
    }

    pub fn first_unsatisfied<'a>(&self, definition: &'a QuestDefinition) -> Option<(&'a str, &'a TaskEntry)> {
        definition
            .entries()
            .find(|(key, _)| !self.satisfied.contains(*key))
    }

    /// Drop keys the definition no longer declares, returning them.
    pub fn retain_known(&mut self, definition: &QuestDefinition) -> Vec<String> {
        let stale: Vec<String> = self
            .satisfied
            .iter()
            .filter(|key| !definition.contains_key(key))
            .cloned()
            .collect();
        for key in &stale {
            self.satisfied.remove(key);
        }
        stale
    }
}
