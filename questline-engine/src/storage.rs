//! Persisted agent state and the storage hook.
//!
//! The engine produces and consumes [`AgentSnapshot`] as plain data. Where it
//! ends up is the host's business; [`InMemoryProgressStorage`] is provided for
//! tests and single-process hosts.

use crate::progress::AgentProgress;
use questline_core::{AgentId, QuestId, QuestlineResult, StateError, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Completions of one quest inside the current daily window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTally {
    pub window_start: Timestamp,
    pub count: u32,
}

/// Everything the engine knows about one agent, in persistable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: AgentId,
    pub active: Vec<AgentProgress>,
    /// Last completion per quest; drives cooldowns and prerequisites
    pub completed: BTreeMap<QuestId, Timestamp>,
    #[serde(default)]
    pub daily: BTreeMap<QuestId, DailyTally>,
    pub completion_count: u64,
}

impl AgentSnapshot {
    pub fn empty(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            active: Vec::new(),
            completed: BTreeMap::new(),
            daily: BTreeMap::new(),
            completion_count: 0,
        }
    }

    pub fn to_json(&self) -> QuestlineResult<String> {
        serde_json::to_string(self).map_err(|e| {
            StateError::StorageFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn from_json(json: &str) -> QuestlineResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            StateError::StorageFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// External persistence for agent snapshots.
pub trait ProgressStorage: Send + Sync {
    /// `Ok(None)` for an agent never saved before.
    fn load(&self, agent_id: AgentId) -> QuestlineResult<Option<AgentSnapshot>>;

    fn save(&self, snapshot: &AgentSnapshot) -> QuestlineResult<()>;
}

/// Snapshots kept as JSON strings in memory.
#[derive(Debug, Default)]
pub struct InMemoryProgressStorage {
    records: RwLock<HashMap<AgentId, String>>,
}

impl InMemoryProgressStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressStorage for InMemoryProgressStorage {
    fn load(&self, agent_id: AgentId) -> QuestlineResult<Option<AgentSnapshot>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .get(&agent_id)
            .map(|json| AgentSnapshot::from_json(json))
            .transpose()
    }

    fn save(&self, snapshot: &AgentSnapshot) -> QuestlineResult<()> {
        let json = snapshot.to_json()?;
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.agent_id, json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_in_memory_storage_load_missing_is_none() {
        let storage = InMemoryProgressStorage::new();
        assert!(storage.load(AgentId::now_v7()).unwrap().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_in_memory_storage_save_then_load() {
        let storage = InMemoryProgressStorage::new();
        let agent = AgentId::now_v7();
        let quest: QuestId = "questline:q1".parse().unwrap();
        let mut snapshot = AgentSnapshot::empty(agent);
        snapshot.active.push(AgentProgress::new(quest.clone(), Utc::now()));
        snapshot.completed.insert(quest, Utc::now());
        snapshot.completion_count = 4;

        storage.save(&snapshot).unwrap();
        assert_eq!(storage.load(agent).unwrap(), Some(snapshot));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_snapshot_json_layout() {
        let agent = AgentId::now_v7();
        let json = AgentSnapshot::empty(agent).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["active"].is_array());
        assert!(value["completed"].is_object());
        assert_eq!(value["completion_count"], 0);
    }

    #[test]
    fn test_corrupt_snapshot_is_storage_error() {
        assert!(AgentSnapshot::from_json("{not json").is_err());
    }
}
