//! The quest engine service.
//!
//! Owns the registry, one lock per agent, the clock and the host hooks. Every
//! operation on an agent runs while holding that agent's lock, against a
//! single registry snapshot taken at the start of the operation.

use crate::clock::{Clock, SystemClock};
use crate::hooks::{CompletionHook, NoRewards};
use crate::registry::{QuestRegistry, ReloadReport};
use crate::storage::{AgentSnapshot, InMemoryProgressStorage, ProgressStorage};
use crate::store::{AgentProgressStore, ProgressView, SubmitReport};
use questline_core::{
    AcceptOutcome, AgentId, AgentState, ConfigError, EngineConfig, QuestDefinition, QuestId,
    QuestState, QuestlineResult, StateError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

/// An agent's place in the engine. Filled from storage on first locked use;
/// `Retired` once unloaded, so late holders of the `Arc` look it up again.
#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Unloaded,
    Loaded(AgentProgressStore),
    Retired,
}

type AgentSlot = Arc<Mutex<SlotState>>;

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`QuestEngine`].
pub struct QuestEngineBuilder {
    registry: Option<Arc<QuestRegistry>>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn ProgressStorage>,
    hook: Arc<dyn CompletionHook>,
}

impl QuestEngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            storage: Arc::new(InMemoryProgressStorage::new()),
            hook: Arc::new(NoRewards),
        }
    }

    pub fn registry(mut self, registry: Arc<QuestRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn definitions(self, definitions: impl IntoIterator<Item = QuestDefinition>) -> Self {
        self.registry(Arc::new(QuestRegistry::from_definitions(definitions)))
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn ProgressStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn completion_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn build(self) -> Result<QuestEngine, ConfigError> {
        self.config.validate()?;
        Ok(QuestEngine {
            registry: self.registry.unwrap_or_default(),
            config: self.config,
            clock: self.clock,
            storage: self.storage,
            hook: self.hook,
            agents: RwLock::new(HashMap::new()),
        })
    }
}

impl Default for QuestEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Shared quest service. Wrap in an `Arc` to use from several threads.
pub struct QuestEngine {
    registry: Arc<QuestRegistry>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn ProgressStorage>,
    hook: Arc<dyn CompletionHook>,
    agents: RwLock<HashMap<AgentId, AgentSlot>>,
}

impl fmt::Debug for QuestEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestEngine")
            .field("generation", &self.registry.generation())
            .field("config", &self.config)
            .field("loaded_agents", &self.loaded_agents())
            .finish()
    }
}

impl QuestEngine {
    pub fn builder() -> QuestEngineBuilder {
        QuestEngineBuilder::new()
    }

    pub fn registry(&self) -> &Arc<QuestRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of agents currently held in memory.
    pub fn loaded_agents(&self) -> usize {
        self.agents.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    // ------------------------------------------------------------------------
    // Agent-facing operations
    // ------------------------------------------------------------------------

    /// Quests the agent could accept right now, in display order.
    pub fn show_available(&self, agent_id: AgentId) -> QuestlineResult<Vec<Arc<QuestDefinition>>> {
        let registry = self.registry.snapshot();
        let now = self.clock.now();
        self.read_agent(agent_id, |store| {
            registry
                .ordered()
                .into_iter()
                .filter(|def| store.can_accept(&registry, def.id(), now, &self.config).is_accept())
                .cloned()
                .collect()
        })
    }

    pub fn can_accept(&self, agent_id: AgentId, quest_id: &QuestId) -> QuestlineResult<AcceptOutcome> {
        let registry = self.registry.snapshot();
        let now = self.clock.now();
        self.read_agent(agent_id, |store| store.can_accept(&registry, quest_id, now, &self.config))
    }

    /// Accept a quest, reporting the precise reason on refusal.
    pub fn try_accept(&self, agent_id: AgentId, quest_id: &QuestId) -> QuestlineResult<AcceptOutcome> {
        let registry = self.registry.snapshot();
        self.write_agent(agent_id, |store| {
            let outcome = store.accept(&registry, quest_id, self.clock.now(), &self.config);
            (outcome, outcome.is_accept())
        })
    }

    pub fn accept(&self, agent_id: AgentId, quest_id: &QuestId) -> QuestlineResult<bool> {
        Ok(self.try_accept(agent_id, quest_id)?.is_accept())
    }

    /// Submit the agent's live state against every accepted quest.
    ///
    /// The caller guarantees nothing else mutates `state` during the call.
    pub fn submit_all(&self, agent_id: AgentId, state: &mut dyn AgentState) -> QuestlineResult<SubmitReport> {
        let registry = self.registry.snapshot();
        self.write_agent(agent_id, |store| {
            let report = store.submit_all(
                &registry,
                state,
                self.clock.now(),
                &self.config,
                self.hook.as_ref(),
            );
            let changed = report.made_progress();
            (report, changed)
        })
    }

    pub fn current_progress(&self, agent_id: AgentId) -> QuestlineResult<Vec<ProgressView>> {
        let registry = self.registry.snapshot();
        self.read_agent(agent_id, |store| store.current_progress(&registry))
    }

    pub fn state_of(&self, agent_id: AgentId, quest_id: &QuestId) -> QuestlineResult<QuestState> {
        let registry = self.registry.snapshot();
        let now = self.clock.now();
        self.read_agent(agent_id, |store| store.state_of(&registry, quest_id, now))
    }

    pub fn cooldown_remaining(&self, agent_id: AgentId, quest_id: &QuestId) -> QuestlineResult<Option<Duration>> {
        let registry = self.registry.snapshot();
        let now = self.clock.now();
        self.read_agent(agent_id, |store| store.cooldown_remaining(&registry, quest_id, now))
    }

    // ------------------------------------------------------------------------
    // Administrative operations
    // ------------------------------------------------------------------------

    pub fn reset(&self, agent_id: AgentId, quest_id: &QuestId, also_reset_cooldown: bool) -> QuestlineResult<bool> {
        self.write_agent(agent_id, |store| {
            let changed = store.reset(quest_id, also_reset_cooldown);
            (changed, changed)
        })
    }

    pub fn reset_cooldown(&self, agent_id: AgentId) -> QuestlineResult<()> {
        self.write_agent(agent_id, |store| {
            store.reset_cooldowns();
            ((), true)
        })
    }

    pub fn reset_all(&self, agent_id: AgentId) -> QuestlineResult<()> {
        self.write_agent(agent_id, |store| {
            store.reset_all();
            ((), true)
        })
    }

    pub fn reload(&self, definitions: impl IntoIterator<Item = QuestDefinition>) -> u64 {
        let generation = self.registry.reload(definitions);
        tracing::info!(generation, "Quest registry reloaded");
        generation
    }

    pub fn reload_documents(&self, documents: impl IntoIterator<Item = (String, Value)>) -> ReloadReport {
        self.registry.reload_documents(documents, &self.config)
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    pub fn export_agent(&self, agent_id: AgentId) -> QuestlineResult<AgentSnapshot> {
        self.read_agent(agent_id, AgentProgressStore::to_snapshot)
    }

    /// Replace an agent's state with `snapshot`, returning whatever had to be
    /// dropped because the registry no longer knows it.
    pub fn restore_agent(&self, snapshot: AgentSnapshot) -> QuestlineResult<Vec<StateError>> {
        let registry = self.registry.snapshot();
        let agent_id = snapshot.agent_id;
        self.write_agent(agent_id, |store| {
            let (restored, dropped) = AgentProgressStore::from_snapshot(snapshot, &registry);
            *store = restored;
            (dropped, true)
        })
    }

    /// Drop an agent from memory. Its state stays in storage.
    ///
    /// Waits for any operation already running on the agent, so nothing is
    /// saved behind the unload.
    pub fn unload_agent(&self, agent_id: AgentId) -> bool {
        let Some(slot) = self
            .agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&agent_id)
            .cloned()
        else {
            return false;
        };
        let mut state = Self::lock(&slot);
        let previous = std::mem::replace(&mut *state, SlotState::Retired);
        self.detach(agent_id, &slot);
        !matches!(previous, SlotState::Retired)
    }

    // ------------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------------
    //
    // Lock order is slot, then map. The map lock is never held across
    // storage I/O or while waiting on a slot.

    /// The agent's slot, inserting an unloaded one on first use.
    fn agent_slot(&self, agent_id: AgentId) -> AgentSlot {
        if let Some(slot) = self
            .agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&agent_id)
        {
            return Arc::clone(slot);
        }
        let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(agents.entry(agent_id).or_default())
    }

    /// Remove `slot` from the map unless it has already been replaced.
    fn detach(&self, agent_id: AgentId, slot: &AgentSlot) {
        let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
        if agents.get(&agent_id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            agents.remove(&agent_id);
        }
    }

    fn lock(slot: &AgentSlot) -> MutexGuard<'_, SlotState> {
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the agent's store with its slot locked, loading the store
    /// from storage if this is the slot's first use.
    fn with_store<T>(
        &self,
        agent_id: AgentId,
        f: impl FnOnce(&mut AgentProgressStore) -> T,
    ) -> QuestlineResult<T> {
        loop {
            let slot = self.agent_slot(agent_id);
            let mut state = Self::lock(&slot);
            if let SlotState::Unloaded = *state {
                match self.storage.load(agent_id) {
                    Ok(Some(snapshot)) => {
                        let registry = self.registry.snapshot();
                        *state = SlotState::Loaded(AgentProgressStore::from_snapshot(snapshot, &registry).0);
                    }
                    Ok(None) => *state = SlotState::Loaded(AgentProgressStore::new(agent_id)),
                    Err(e) => {
                        *state = SlotState::Retired;
                        self.detach(agent_id, &slot);
                        return Err(e);
                    }
                }
            }
            match &mut *state {
                SlotState::Loaded(store) => return Ok(f(store)),
                // Unloaded between lookup and lock; the map holds a fresh slot.
                SlotState::Retired | SlotState::Unloaded => continue,
            }
        }
    }

    fn read_agent<T>(&self, agent_id: AgentId, f: impl FnOnce(&AgentProgressStore) -> T) -> QuestlineResult<T> {
        self.with_store(agent_id, |store| f(store))
    }

    /// Run a mutation under the agent's lock. `f` returns its result and
    /// whether the store changed; changed stores are saved before unlocking.
    fn write_agent<T>(
        &self,
        agent_id: AgentId,
        f: impl FnOnce(&mut AgentProgressStore) -> (T, bool),
    ) -> QuestlineResult<T> {
        self.with_store(agent_id, |store| {
            let (result, changed) = f(store);
            if changed {
                self.persist(store);
            }
            result
        })
    }

    /// Write-behind: a failed save is logged and the in-memory state stays
    /// authoritative.
    fn persist(&self, store: &AgentProgressStore) {
        if let Err(e) = self.storage.save(&store.to_snapshot()) {
            tracing::warn!(agent = %store.agent_id(), error = %e, "Failed to persist quest progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use questline_core::{ExperienceEntry, InMemoryAgentState, QuestlineError, TaskEntry};

    fn qid(s: &str) -> QuestId {
        s.parse().unwrap()
    }

    fn xp_quest(name: &str, repeatable: bool) -> QuestDefinition {
        QuestDefinition::builder(qid(name))
            .entry("xp", TaskEntry::Experience(ExperienceEntry::new(1, None)))
            .repeatable(repeatable)
            .cooldown(Duration::from_secs(60))
            .build()
            .unwrap()
    }

    struct FailingStorage;

    impl ProgressStorage for FailingStorage {
        fn load(&self, _agent_id: AgentId) -> QuestlineResult<Option<AgentSnapshot>> {
            Ok(None)
        }

        fn save(&self, _snapshot: &AgentSnapshot) -> QuestlineResult<()> {
            Err(StateError::StorageFailed {
                reason: "disk full".to_string(),
            }
            .into())
        }
    }

    struct UnreadableStorage;

    impl ProgressStorage for UnreadableStorage {
        fn load(&self, _agent_id: AgentId) -> QuestlineResult<Option<AgentSnapshot>> {
            Err(StateError::StorageFailed {
                reason: "offline".to_string(),
            }
            .into())
        }

        fn save(&self, _snapshot: &AgentSnapshot) -> QuestlineResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = EngineConfig {
            max_active_quests: Some(0),
            ..EngineConfig::default()
        };
        assert!(QuestEngine::builder().config(config).build().is_err());
    }

    #[test]
    fn test_show_available_filters_by_outcome() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()));
        let engine = QuestEngine::builder()
            .definitions(vec![xp_quest("a", false), xp_quest("b", true)])
            .clock(clock.clone())
            .build()
            .unwrap();
        let agent = AgentId::now_v7();

        assert_eq!(engine.show_available(agent).unwrap().len(), 2);
        assert!(engine.accept(agent, &qid("a")).unwrap());
        let ids: Vec<String> = engine
            .show_available(agent)
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, vec!["questline:b"]);
    }

    #[test]
    fn test_state_persists_across_unload() {
        let storage = Arc::new(InMemoryProgressStorage::new());
        let engine = QuestEngine::builder()
            .definitions(vec![xp_quest("a", false)])
            .storage(storage.clone())
            .build()
            .unwrap();
        let agent = AgentId::now_v7();
        engine.accept(agent, &qid("a")).unwrap();
        assert_eq!(storage.len(), 1);

        assert!(engine.unload_agent(agent));
        assert_eq!(engine.loaded_agents(), 0);
        assert_eq!(engine.state_of(agent, &qid("a")).unwrap(), QuestState::Accepted);
    }

    #[test]
    fn test_failed_save_keeps_memory_state() {
        let engine = QuestEngine::builder()
            .definitions(vec![xp_quest("a", false)])
            .storage(Arc::new(FailingStorage))
            .build()
            .unwrap();
        let agent = AgentId::now_v7();
        assert!(engine.accept(agent, &qid("a")).unwrap());
        assert_eq!(engine.state_of(agent, &qid("a")).unwrap(), QuestState::Accepted);
    }

    #[test]
    fn test_failed_load_is_an_error() {
        let engine = QuestEngine::builder()
            .definitions(vec![xp_quest("a", false)])
            .storage(Arc::new(UnreadableStorage))
            .build()
            .unwrap();
        let err = engine.accept(AgentId::now_v7(), &qid("a")).unwrap_err();
        assert!(matches!(err, QuestlineError::State(StateError::StorageFailed { .. })));
        assert_eq!(engine.loaded_agents(), 0);
    }

    #[test]
    fn test_restore_agent_reports_dropped_quests() {
        let engine = QuestEngine::builder()
            .definitions(vec![xp_quest("a", false), xp_quest("b", false)])
            .build()
            .unwrap();
        let agent = AgentId::now_v7();
        engine.accept(agent, &qid("a")).unwrap();
        engine.accept(agent, &qid("b")).unwrap();
        let exported = engine.export_agent(agent).unwrap();

        engine.reload(vec![xp_quest("a", false)]);
        engine.reset_all(agent).unwrap();
        let dropped = engine.restore_agent(exported).unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(engine.state_of(agent, &qid("a")).unwrap(), QuestState::Accepted);
        assert_eq!(engine.state_of(agent, &qid("b")).unwrap(), QuestState::NotAccepted);
    }

    #[test]
    fn test_cooldown_follows_manual_clock() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()));
        let engine = QuestEngine::builder()
            .definitions(vec![xp_quest("b", true)])
            .clock(clock.clone())
            .build()
            .unwrap();
        let agent = AgentId::now_v7();
        let mut state = InMemoryAgentState::new().with_experience(3);

        engine.accept(agent, &qid("b")).unwrap();
        assert!(engine.submit_all(agent, &mut state).unwrap().succeeded());
        assert_eq!(engine.try_accept(agent, &qid("b")).unwrap(), AcceptOutcome::OnCooldown);
        assert_eq!(
            engine.cooldown_remaining(agent, &qid("b")).unwrap(),
            Some(Duration::from_secs(60))
        );

        clock.advance(Duration::from_secs(60));
        assert_eq!(engine.try_accept(agent, &qid("b")).unwrap(), AcceptOutcome::Accept);
    }
}
