//! Per-agent quest state machine.
//!
//! `AgentProgressStore` is plain owned data. It takes the registry snapshot,
//! the clock reading and the agent's live state as arguments, so every
//! decision it makes is reproducible. Locking lives one level up in
//! [`crate::engine::QuestEngine`].

use crate::hooks::CompletionHook;
use crate::progress::AgentProgress;
use crate::registry::RegistrySnapshot;
use crate::storage::{AgentSnapshot, DailyTally};
use questline_core::{
    AcceptOutcome, AgentId, AgentState, EngineConfig, QuestDefinition, QuestId, QuestState,
    StateError, TaskEntry, Timestamp,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// REPORTS AND VIEWS
// ============================================================================

/// What one `submit_all` pass achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    /// Quests that reached Completed, in processing order
    pub completed: Vec<QuestId>,
    /// Entries marked satisfied during this pass, including those of completed quests
    pub newly_satisfied: Vec<(QuestId, String)>,
}

impl SubmitReport {
    /// True iff at least one quest completed.
    pub fn succeeded(&self) -> bool {
        !self.completed.is_empty()
    }

    pub fn made_progress(&self) -> bool {
        !self.newly_satisfied.is_empty()
    }
}

/// An accepted quest together with its current definition.
#[derive(Debug, Clone)]
pub struct ProgressView {
    pub definition: Arc<QuestDefinition>,
    pub accepted_at: Timestamp,
    pub satisfied: BTreeSet<String>,
}

impl ProgressView {
    /// Entries still to be satisfied, in definition order.
    pub fn unsatisfied_entries(&self) -> Vec<(&str, &TaskEntry)> {
        self.definition
            .entries()
            .filter(|(key, _)| !self.satisfied.contains(*key))
            .collect()
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProgressStore {
    agent_id: AgentId,
    active: BTreeMap<QuestId, AgentProgress>,
    completed: BTreeMap<QuestId, Timestamp>,
    daily: BTreeMap<QuestId, DailyTally>,
    completion_count: u64,
}

impl AgentProgressStore {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            active: BTreeMap::new(),
            completed: BTreeMap::new(),
            daily: BTreeMap::new(),
            completion_count: 0,
        }
    }

    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, quest_id: &QuestId) -> bool {
        self.active.contains_key(quest_id)
    }

    pub fn progress(&self, quest_id: &QuestId) -> Option<&AgentProgress> {
        self.active.get(quest_id)
    }

    pub fn last_completion(&self, quest_id: &QuestId) -> Option<Timestamp> {
        self.completed.get(quest_id).copied()
    }

    pub fn completion_count(&self) -> u64 {
        self.completion_count
    }

    // ------------------------------------------------------------------------
    // Accept
    // ------------------------------------------------------------------------

    /// Decide whether the quest may be accepted right now. Pure.
    pub fn can_accept(
        &self,
        registry: &RegistrySnapshot,
        quest_id: &QuestId,
        now: Timestamp,
        config: &EngineConfig,
    ) -> AcceptOutcome {
        let Some(definition) = registry.get(quest_id) else {
            return AcceptOutcome::NotFound;
        };
        if self.active.contains_key(quest_id) {
            return AcceptOutcome::AlreadyActive;
        }
        if let Some(&completed_at) = self.completed.get(quest_id) {
            if !definition.is_repeatable() {
                return AcceptOutcome::AlreadyCompleted;
            }
            if definition
                .cooldown_end(completed_at)
                .is_some_and(|end| now < end)
            {
                return AcceptOutcome::OnCooldown;
            }
        }
        if let Some(limit) = definition.daily_limit() {
            if self.completions_today(quest_id, now, config) >= limit {
                return AcceptOutcome::DailyLimitReached;
            }
        }
        if !definition
            .prerequisites()
            .iter()
            .all(|parent| self.completed.contains_key(parent))
        {
            return AcceptOutcome::PrerequisiteUnmet;
        }
        if config
            .max_active_quests
            .is_some_and(|max| self.active.len() >= max)
        {
            return AcceptOutcome::MaxActiveReached;
        }
        AcceptOutcome::Accept
    }

    /// Re-run [`Self::can_accept`] and start the quest on `Accept`.
    pub fn accept(
        &mut self,
        registry: &RegistrySnapshot,
        quest_id: &QuestId,
        now: Timestamp,
        config: &EngineConfig,
    ) -> AcceptOutcome {
        let outcome = self.can_accept(registry, quest_id, now, config);
        if outcome.is_accept() {
            self.active
                .insert(quest_id.clone(), AgentProgress::new(quest_id.clone(), now));
            tracing::info!(agent = %self.agent_id, quest = %quest_id, "Quest accepted");
        } else {
            tracing::debug!(agent = %self.agent_id, quest = %quest_id, %outcome, "Quest not accepted");
        }
        outcome
    }

    // ------------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------------

    /// Try every unsatisfied entry of every accepted quest against `state`.
    ///
    /// Satisfied marks persist even when the quest does not complete. Quests
    /// whose definition has been removed from the registry are left untouched.
    pub fn submit_all(
        &mut self,
        registry: &RegistrySnapshot,
        state: &mut dyn AgentState,
        now: Timestamp,
        config: &EngineConfig,
        hook: &dyn CompletionHook,
    ) -> SubmitReport {
        let mut report = SubmitReport::default();
        let quest_ids: Vec<QuestId> = self.active.keys().cloned().collect();

        for quest_id in quest_ids {
            let Some(definition) = registry.get(&quest_id).cloned() else {
                tracing::debug!(agent = %self.agent_id, quest = %quest_id, "Accepted quest no longer registered");
                continue;
            };
            let Some(progress) = self.active.get_mut(&quest_id) else {
                continue;
            };
            progress.retain_known(&definition);

            let pending: Vec<String> = progress
                .unsatisfied(&definition)
                .into_iter()
                .map(|(key, _)| key.to_string())
                .collect();
            for key in pending {
                let Some(entry) = definition.entry(&key) else {
                    continue;
                };
                if entry.submit(state) {
                    progress.mark_satisfied(&definition, &key);
                    tracing::debug!(
                        agent = %self.agent_id,
                        quest = %quest_id,
                        entry = %key,
                        kind = entry.identify(),
                        "Entry satisfied"
                    );
                    report.newly_satisfied.push((quest_id.clone(), key));
                }
            }

            if progress.is_complete(&definition) {
                self.complete(&definition, now, config);
                hook.on_completed(self.agent_id, &definition, state);
                report.completed.push(quest_id);
            }
        }
        report
    }

    fn complete(&mut self, definition: &QuestDefinition, now: Timestamp, config: &EngineConfig) {
        let quest_id = definition.id();
        self.active.remove(quest_id);
        self.completed.insert(quest_id.clone(), now);
        if definition.daily_limit().is_some() {
            let count = self.completions_today(quest_id, now, config);
            let window_start = match self.daily.get(quest_id) {
                Some(tally) if count > 0 => tally.window_start,
                _ => now,
            };
            self.daily.insert(
                quest_id.clone(),
                DailyTally {
                    window_start,
                    count: count.saturating_add(1),
                },
            );
        }
        self.completion_count += 1;
        tracing::info!(
            agent = %self.agent_id,
            quest = %quest_id,
            completions = self.completion_count,
            "Quest completed"
        );
    }

    /// Completions of `quest_id` inside the daily window that is open at `now`.
    fn completions_today(&self, quest_id: &QuestId, now: Timestamp, config: &EngineConfig) -> u32 {
        let Some(tally) = self.daily.get(quest_id) else {
            return 0;
        };
        let window_end = chrono::Duration::from_std(config.daily_window())
            .ok()
            .and_then(|window| tally.window_start.checked_add_signed(window));
        match window_end {
            Some(end) if now >= end => 0,
            _ => tally.count,
        }
    }

    // ------------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------------

    /// Drop the progress for one quest, and optionally its completion record.
    /// Returns whether anything changed.
    pub fn reset(&mut self, quest_id: &QuestId, also_reset_cooldown: bool) -> bool {
        let mut changed = self.active.remove(quest_id).is_some();
        if also_reset_cooldown {
            changed |= self.completed.remove(quest_id).is_some();
            changed |= self.daily.remove(quest_id).is_some();
        }
        if changed {
            tracing::info!(agent = %self.agent_id, quest = %quest_id, also_reset_cooldown, "Quest reset");
        }
        changed
    }

    /// Clear every completion record. Active progress is kept.
    pub fn reset_cooldowns(&mut self) {
        let cleared = self.completed.len();
        self.completed.clear();
        self.daily.clear();
        tracing::info!(agent = %self.agent_id, cleared, "Quest cooldowns reset");
    }

    /// Clear all progress and completion records. The lifetime completion
    /// count is history and survives.
    pub fn reset_all(&mut self) {
        let dropped = self.active.len();
        self.active.clear();
        self.completed.clear();
        self.daily.clear();
        tracing::info!(agent = %self.agent_id, dropped, "All quest state reset");
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Accepted quests with their definitions, oldest first. Quests whose
    /// definition is gone are skipped.
    pub fn current_progress(&self, registry: &RegistrySnapshot) -> Vec<ProgressView> {
        let mut views: Vec<ProgressView> = self
            .active
            .values()
            .filter_map(|progress| {
                let definition = registry.get(progress.quest_id())?;
                Some(ProgressView {
                    definition: Arc::clone(definition),
                    accepted_at: progress.accepted_at(),
                    satisfied: progress
                        .satisfied_keys()
                        .iter()
                        .filter(|key| definition.contains_key(key))
                        .cloned()
                        .collect(),
                })
            })
            .collect();
        views.sort_by(|a, b| {
            a.accepted_at
                .cmp(&b.accepted_at)
                .then_with(|| a.definition.id().cmp(b.definition.id()))
        });
        views
    }

    pub fn state_of(&self, registry: &RegistrySnapshot, quest_id: &QuestId, now: Timestamp) -> QuestState {
        if self.active.contains_key(quest_id) {
            return QuestState::Accepted;
        }
        let Some(&completed_at) = self.completed.get(quest_id) else {
            return QuestState::NotAccepted;
        };
        match registry.get(quest_id) {
            Some(def) if !def.is_repeatable() => QuestState::Completed,
            Some(def) if def.cooldown_end(completed_at).is_some_and(|end| now < end) => {
                QuestState::Cooldown
            }
            _ => QuestState::NotAccepted,
        }
    }

    /// Time left before the quest leaves cooldown, if it is on one.
    pub fn cooldown_remaining(
        &self,
        registry: &RegistrySnapshot,
        quest_id: &QuestId,
        now: Timestamp,
    ) -> Option<Duration> {
        let completed_at = *self.completed.get(quest_id)?;
        let definition = registry.get(quest_id)?;
        if !definition.is_repeatable() {
            return None;
        }
        let end = definition.cooldown_end(completed_at)?;
        (end - now).to_std().ok().filter(|left| !left.is_zero())
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    pub fn to_snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.agent_id,
            active: self.active.values().cloned().collect(),
            completed: self.completed.clone(),
            daily: self.daily.clone(),
            completion_count: self.completion_count,
        }
    }

    /// Rebuild from persisted data, dropping progress the current registry
    /// can no longer account for. The dropped pieces are returned.
    pub fn from_snapshot(snapshot: AgentSnapshot, registry: &RegistrySnapshot) -> (Self, Vec<StateError>) {
        let mut store = Self::new(snapshot.agent_id);
        let mut dropped = Vec::new();

        for mut progress in snapshot.active {
            let quest_id = progress.quest_id().clone();
            let Some(definition) = registry.get(&quest_id) else {
                dropped.push(StateError::UnknownQuest { quest_id });
                continue;
            };
            for key in progress.retain_known(definition) {
                dropped.push(StateError::UnknownEntryKey {
                    quest_id: quest_id.clone(),
                    key,
                });
            }
            store.active.insert(quest_id, progress);
        }
        store.completed = snapshot.completed;
        store.daily = snapshot.daily;
        store.completion_count = snapshot.completion_count;

        for problem in &dropped {
            tracing::warn!(agent = %store.agent_id, error = %problem, "Dropped stale persisted progress");
        }
        (store, dropped)
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::hooks::NoRewards;
    use crate::registry::QuestRegistry;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use questline_core::{ExperienceEntry, InMemoryAgentState};

    fn quest(name: &str, repeatable: bool, cooldown_secs: u64) -> QuestDefinition {
        let mut builder = QuestDefinition::builder(name.parse().unwrap())
            .entry("xp", TaskEntry::Experience(ExperienceEntry::new(1, None)))
            .repeatable(repeatable);
        if cooldown_secs > 0 {
            builder = builder.cooldown(Duration::from_secs(cooldown_secs));
        }
        builder.build().unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_accept_then_reset_restores_state(
            completed_before in proptest::collection::vec(0usize..4, 0..4),
            target in 0usize..4,
            offset_secs in 0i64..100_000,
        ) {
            let defs: Vec<QuestDefinition> = (0..4)
                .map(|i| quest(&format!("q{i}"), i % 2 == 0, 300))
                .collect();
            let reg = QuestRegistry::from_definitions(defs).snapshot();
            let config = EngineConfig::default();
            let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let mut store = AgentProgressStore::new(AgentId::now_v7());
            let mut state = InMemoryAgentState::new().with_experience(100);

            for i in completed_before {
                let id: QuestId = format!("q{i}").parse().unwrap();
                store.accept(&reg, &id, start, &config);
                store.submit_all(&reg, &mut state, start, &config, &NoRewards);
            }

            let now = start + chrono::Duration::seconds(offset_secs);
            let target: QuestId = format!("q{target}").parse().unwrap();
            let before = store.clone();
            if store.accept(&reg, &target, now, &config).is_accept() {
                prop_assert!(store.reset(&target, false));
            }
            prop_assert_eq!(store, before);
        }

        #[test]
        fn prop_cooldown_flips_exactly_at_end(
            cooldown_secs in 1u64..1_000_000,
            probe_millis in 0i64..2_000_000_000,
        ) {
            let reg = QuestRegistry::from_definitions(vec![quest("rep", true, cooldown_secs)]).snapshot();
            let config = EngineConfig::default();
            let id: QuestId = "rep".parse().unwrap();
            let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let mut store = AgentProgressStore::new(AgentId::now_v7());
            let mut state = InMemoryAgentState::new().with_experience(1);
            store.accept(&reg, &id, start, &config);
            prop_assert!(store.submit_all(&reg, &mut state, start, &config, &NoRewards).succeeded());

            let now = start + chrono::Duration::milliseconds(probe_millis);
            let end = start + chrono::Duration::seconds(cooldown_secs as i64);
            let outcome = store.can_accept(&reg, &id, now, &config);
            if now < end {
                prop_assert_eq!(outcome, AcceptOutcome::OnCooldown);
            } else {
                prop_assert_eq!(outcome, AcceptOutcome::Accept);
            }
        }
    }
}
