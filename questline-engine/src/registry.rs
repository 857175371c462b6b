//! Quest registry with copy-on-write snapshot swap.
//!
//! Readers clone an `Arc<RegistrySnapshot>` and work against it for as long
//! as they like. A reload builds a complete new snapshot off to the side and
//! publishes it with one pointer swap, so no reader ever sees a mix of two
//! reloads.
//!
//! Reload policy for documents: a malformed quest is rejected and reported,
//! and the previously valid definition for that id (if any) stays live. Ids
//! missing from the new batch are dropped.

use questline_core::{DefinitionError, EngineConfig, QuestDefinition, QuestId, ResourceId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

// ============================================================================
// SNAPSHOT
// ============================================================================

/// One published, immutable generation of the registry.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    quests: BTreeMap<QuestId, Arc<QuestDefinition>>,
}

impl RegistrySnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: &QuestId) -> Option<&Arc<QuestDefinition>> {
        self.quests.get(id)
    }

    pub fn contains(&self, id: &QuestId) -> bool {
        self.quests.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Definitions in display order: `sort_order`, then id.
    pub fn ordered(&self) -> Vec<&Arc<QuestDefinition>> {
        let mut defs: Vec<_> = self.quests.values().collect();
        defs.sort_by(|a, b| a.sort_order().cmp(&b.sort_order()).then_with(|| a.id().cmp(b.id())));
        defs
    }
}

/// A quest document the last reload refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedQuest {
    pub raw_id: String,
    pub error: DefinitionError,
    /// Whether an older definition for this id stayed live
    pub retained_previous: bool,
}

/// Outcome of a document reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub generation: u64,
    pub loaded: Vec<QuestId>,
    pub rejected: Vec<RejectedQuest>,
}

impl ReloadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Authoritative mapping from quest id to definition.
#[derive(Debug, Default)]
pub struct QuestRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
    /// Serializes reloads so each builds on the one before.
    reload_lock: Mutex<()>,
}

impl QuestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = QuestDefinition>) -> Self {
        let registry = Self::new();
        registry.reload(definitions);
        registry
    }

    /// The current generation. Hold on to it for a consistent multi-quest view.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn lookup(&self, id: &QuestId) -> Option<Arc<QuestDefinition>> {
        self.snapshot().get(id).cloned()
    }

    /// All definitions in display order.
    pub fn all(&self) -> Vec<(QuestId, Arc<QuestDefinition>)> {
        self.snapshot()
            .ordered()
            .into_iter()
            .map(|def| (def.id().clone(), Arc::clone(def)))
            .collect()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }

    /// Replace the whole mapping. Later duplicates of an id win.
    pub fn reload(&self, definitions: impl IntoIterator<Item = QuestDefinition>) -> u64 {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut quests = BTreeMap::new();
        for def in definitions {
            if let Some(previous) = quests.insert(def.id().clone(), Arc::new(def)) {
                tracing::warn!(quest = %previous.id(), "Duplicate quest id in reload, keeping the later definition");
            }
        }
        self.publish(quests)
    }

    /// Decode and publish a batch of `(id, document)` pairs. As with
    /// [`Self::reload`], a later valid document for an id replaces an earlier
    /// one and the id is reported as loaded once.
    pub fn reload_documents(
        &self,
        documents: impl IntoIterator<Item = (String, Value)>,
        config: &EngineConfig,
    ) -> ReloadReport {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.snapshot();
        let namespace = config.default_namespace.as_str();

        let mut quests = BTreeMap::new();
        let mut report = ReloadReport::default();
        for (raw_id, doc) in documents {
            match QuestDefinition::from_keyed_document(&raw_id, &doc, namespace) {
                Ok(def) => {
                    let id = def.id().clone();
                    if report.loaded.contains(&id) {
                        tracing::warn!(quest = %id, "Duplicate quest id in reload, keeping the later definition");
                    } else {
                        report.loaded.push(id.clone());
                    }
                    quests.insert(id, Arc::new(def));
                }
                Err(error) => {
                    let kept = ResourceId::parse_with_default(&raw_id, namespace)
                        .ok()
                        .map(QuestId::new)
                        .and_then(|id| previous.get(&id).map(|def| (id, Arc::clone(def))));
                    let retained_previous = match kept {
                        // A valid document for the same id earlier in this batch wins.
                        Some((id, def)) => {
                            quests.entry(id).or_insert(def);
                            true
                        }
                        None => false,
                    };
                    tracing::warn!(
                        quest = %raw_id,
                        error = %error,
                        retained_previous,
                        "Rejected malformed quest definition"
                    );
                    report.rejected.push(RejectedQuest {
                        raw_id,
                        error,
                        retained_previous,
                    });
                }
            }
        }

        report.generation = self.publish(quests);
        tracing::info!(
            generation = report.generation,
            loaded = report.loaded.len(),
            rejected = report.rejected.len(),
            "Quest registry reloaded"
        );
        report
    }

    /// Swap in a new generation. Caller holds `reload_lock`.
    fn publish(&self, quests: BTreeMap<QuestId, Arc<QuestDefinition>>) -> u64 {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let generation = current.generation + 1;
        *current = Arc::new(RegistrySnapshot { generation, quests });
        generation
    }
}
