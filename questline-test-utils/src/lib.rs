//! Questline Test Utilities
//!
//! Centralized test infrastructure for the Questline workspace:
//! - Proptest generators for identifiers, entries, definitions and agent state
//! - Test fixtures for the common quest scenarios
//! - A completion hook that records what it saw
//! - Custom assertions for Questline-specific validation

// Re-export core and engine types for convenience
pub use questline_core::{
    AcceptOutcome, AdvancementEntry, AgentId, AgentState, DefinitionError, EngineConfig,
    EntryError, ExperienceEntry, InMemoryAgentState, Ingredient, IngredientEntry, ItemStack,
    KillEntry, QuestDefinition, QuestId, QuestState, QuestlineError, QuestlineResult, ResourceId,
    TaskEntry, Timestamp,
};
pub use questline_engine::{
    CompletionHook, InMemoryProgressStorage, ManualClock, QuestEngine, QuestRegistry,
    SubmitReport,
};

use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly `tracing` subscriber. Safe to call from every test.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// RECORDING HOOK
// ============================================================================

/// Completion hook that remembers every completion and can grant experience.
#[derive(Debug, Default)]
pub struct RecordingHook {
    completions: Mutex<Vec<(AgentId, QuestId)>>,
    xp_reward: u32,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `levels` experience on every completion.
    pub fn granting_xp(levels: u32) -> Self {
        Self {
            completions: Mutex::new(Vec::new()),
            xp_reward: levels,
        }
    }

    pub fn completions(&self) -> Vec<(AgentId, QuestId)> {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count_for(&self, agent_id: AgentId) -> usize {
        self.completions()
            .iter()
            .filter(|(agent, _)| *agent == agent_id)
            .count()
    }
}

impl CompletionHook for RecordingHook {
    fn on_completed(&self, agent_id: AgentId, definition: &QuestDefinition, state: &mut dyn AgentState) {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((agent_id, definition.id().clone()));
        if self.xp_reward > 0 {
            state.set_experience_level(state.experience_level().saturating_add(self.xp_reward));
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Questline types.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    // === Identity Generators ===

    /// Generate a random AgentId.
    pub fn arb_agent_id() -> impl Strategy<Value = AgentId> {
        any::<[u8; 16]>().prop_map(|bytes| AgentId::new(Uuid::from_bytes(bytes)))
    }

    /// Generate a Timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a valid namespace.
    pub fn arb_namespace() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("questline".to_string()),
            Just("minecraft".to_string()),
            "[a-z][a-z0-9_]{0,8}",
        ]
    }

    /// Generate a valid namespaced ResourceId.
    pub fn arb_resource_id() -> impl Strategy<Value = ResourceId> {
        (arb_namespace(), "[a-z][a-z0-9_]{0,10}(/[a-z0-9_]{1,6})?").prop_filter_map(
            "valid resource id",
            |(ns, path)| ResourceId::new(&ns, &path).ok(),
        )
    }

    /// Generate a QuestId.
    pub fn arb_quest_id() -> impl Strategy<Value = QuestId> {
        arb_resource_id().prop_map(QuestId::new)
    }

    // === Agent State Generators ===

    /// Generate an item stack of one of a few item types, sometimes damaged or
    /// carrying custom data.
    pub fn arb_item_stack() -> impl Strategy<Value = ItemStack> {
        (
            prop::sample::select(vec!["ore", "gem", "wood"]),
            1u32..64,
            prop::bool::weighted(0.2),
            prop::bool::weighted(0.1),
        )
            .prop_map(|(item, count, damaged, custom)| {
                let mut stack = ItemStack::new(fixtures::rid(item), count);
                if damaged {
                    stack = stack.with_durability(100, 7);
                }
                if custom {
                    stack = stack.with_data("Enchantments", serde_json::json!([{"id": "sharpness"}]));
                }
                stack
            })
    }

    /// Generate an in-memory agent state.
    pub fn arb_agent_state() -> impl Strategy<Value = InMemoryAgentState> {
        (
            prop::collection::vec(arb_item_stack(), 0..12),
            0u32..50,
            0u32..10,
        )
            .prop_map(|(inventory, level, zombies)| InMemoryAgentState {
                inventory,
                experience_level: level,
                ..InMemoryAgentState::default()
            }
            .with_kills(fixtures::rid("zombie"), zombies))
    }

    // === Entry and Definition Generators ===

    /// Generate an Ingredient over the fixture item names.
    pub fn arb_ingredient() -> impl Strategy<Value = Ingredient> {
        prop_oneof![
            prop::sample::select(vec!["ore", "gem", "wood"])
                .prop_map(|item| Ingredient::of_item(fixtures::rid(item))),
            Just(Ingredient::of_tag(fixtures::rid("ores"))),
            Just(Ingredient::new(vec![])),
        ]
    }

    fn arb_description() -> impl Strategy<Value = Option<String>> {
        prop::option::of("[A-Za-z ]{1,24}")
    }

    /// Generate a TaskEntry of any variant.
    pub fn arb_task_entry() -> impl Strategy<Value = TaskEntry> {
        prop_oneof![
            (arb_ingredient(), 1u32..100, arb_description()).prop_map(|(ing, amount, desc)| {
                TaskEntry::Ingredient(IngredientEntry::new(ing, amount, desc))
            }),
            (arb_resource_id(), 1u32..20, arb_description())
                .prop_map(|(entity, amount, desc)| TaskEntry::Kill(KillEntry::new(entity, amount, desc))),
            (1u32..30, arb_description())
                .prop_map(|(amount, desc)| TaskEntry::Experience(ExperienceEntry::new(amount, desc))),
            (arb_resource_id(), arb_description())
                .prop_map(|(adv, desc)| TaskEntry::Advancement(AdvancementEntry::new(adv, desc))),
        ]
    }

    /// Generate a valid QuestDefinition with 1-4 entries.
    pub fn arb_quest_definition() -> impl Strategy<Value = QuestDefinition> {
        (
            arb_quest_id(),
            prop::collection::vec(arb_task_entry(), 1..5),
            any::<bool>(),
            prop::option::of(1u64..86_400),
            prop::option::of(1u32..5),
            -10i32..10,
        )
            .prop_filter_map(
                "buildable definition",
                |(id, entries, repeatable, cooldown, daily_limit, order)| {
                    let mut builder = QuestDefinition::builder(id)
                        .task("generated")
                        .repeatable(repeatable)
                        .sort_order(order);
                    for (i, entry) in entries.into_iter().enumerate() {
                        builder = builder.entry(format!("entry_{i}"), entry);
                    }
                    if let Some(secs) = cooldown {
                        builder = builder.cooldown(Duration::from_secs(secs));
                    }
                    if let Some(limit) = daily_limit {
                        builder = builder.daily_limit(limit);
                    }
                    builder.build().ok()
                },
            )
    }

    /// Generate any AcceptOutcome.
    pub fn arb_accept_outcome() -> impl Strategy<Value = AcceptOutcome> {
        prop_oneof![
            Just(AcceptOutcome::Accept),
            Just(AcceptOutcome::NotFound),
            Just(AcceptOutcome::AlreadyActive),
            Just(AcceptOutcome::AlreadyCompleted),
            Just(AcceptOutcome::OnCooldown),
            Just(AcceptOutcome::DailyLimitReached),
            Just(AcceptOutcome::PrerequisiteUnmet),
            Just(AcceptOutcome::MaxActiveReached),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built quests, inventories and engines for common scenarios.

    use super::*;
    use serde_json::{json, Value};

    /// Parse a resource id, defaulting to the `questline` namespace. Panics on
    /// invalid input.
    pub fn rid(s: &str) -> ResourceId {
        s.parse().unwrap_or_else(|e| panic!("invalid fixture resource id {s}: {e}"))
    }

    /// Parse a quest id. Panics on invalid input.
    pub fn qid(s: &str) -> QuestId {
        QuestId::new(rid(s))
    }

    /// Fixed start instant shared by clock-driven tests.
    pub fn start_time() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(start_time()))
    }

    /// `q1`: deliver 5 plain ore.
    pub fn ore_quest() -> QuestDefinition {
        QuestDefinition::builder(qid("q1"))
            .task("Bring five ore to the smith")
            .entry(
                "ore",
                TaskEntry::Ingredient(IngredientEntry::new(Ingredient::of_item(rid("ore")), 5, None)),
            )
            .build()
            .unwrap_or_else(|e| panic!("ore quest fixture: {e}"))
    }

    /// `q2`: one-time quest needing one experience level.
    pub fn one_time_quest() -> QuestDefinition {
        QuestDefinition::builder(qid("q2"))
            .task("Prove yourself once")
            .entry("xp", TaskEntry::Experience(ExperienceEntry::new(1, None)))
            .build()
            .unwrap_or_else(|e| panic!("one-time quest fixture: {e}"))
    }

    /// Repeatable quest with a cooldown, needing one experience level.
    pub fn repeatable_quest(name: &str, cooldown: Duration) -> QuestDefinition {
        QuestDefinition::builder(qid(name))
            .task("Do it again")
            .entry("xp", TaskEntry::Experience(ExperienceEntry::new(1, None)))
            .repeatable(true)
            .cooldown(cooldown)
            .build()
            .unwrap_or_else(|e| panic!("repeatable quest fixture: {e}"))
    }

    /// Two entries that can be satisfied independently: 2 gems and 3 zombie kills.
    pub fn two_part_quest() -> QuestDefinition {
        QuestDefinition::builder(qid("two_part"))
            .entry(
                "gems",
                TaskEntry::Ingredient(IngredientEntry::new(Ingredient::of_item(rid("gem")), 2, None)),
            )
            .entry("zombies", TaskEntry::Kill(KillEntry::new(rid("zombie"), 3, None)))
            .build()
            .unwrap_or_else(|e| panic!("two-part quest fixture: {e}"))
    }

    /// An agent holding one plain ore stack per count.
    pub fn ore_inventory(counts: &[u32]) -> InMemoryAgentState {
        counts.iter().fold(InMemoryAgentState::new(), |state, &count| {
            state.with_stack(ItemStack::new(rid("ore"), count))
        })
    }

    /// Document form of [`ore_quest`].
    pub fn ore_quest_document() -> Value {
        json!({
            "task": "Bring five ore to the smith",
            "entries": [
                {"key": "ore", "type": "questline:ingredient", "ingredient": {"item": "questline:ore"}, "amount": 5}
            ]
        })
    }

    pub fn engine_with(definitions: Vec<QuestDefinition>, clock: Arc<ManualClock>) -> QuestEngine {
        QuestEngine::builder()
            .definitions(definitions)
            .clock(clock)
            .build()
            .unwrap_or_else(|e| panic!("engine fixture: {e}"))
    }

    /// Engine over `definitions` with an observable hook and storage.
    pub fn recording_engine(
        definitions: Vec<QuestDefinition>,
        clock: Arc<ManualClock>,
    ) -> (QuestEngine, Arc<RecordingHook>, Arc<InMemoryProgressStorage>) {
        let hook = Arc::new(RecordingHook::new());
        let storage = Arc::new(InMemoryProgressStorage::new());
        let engine = QuestEngine::builder()
            .definitions(definitions)
            .clock(clock)
            .completion_hook(hook.clone())
            .storage(storage.clone())
            .build()
            .unwrap_or_else(|e| panic!("engine fixture: {e}"));
        (engine, hook, storage)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertions for Questline-specific validation.

    use super::*;

    /// Assert an accept decision.
    #[track_caller]
    pub fn assert_outcome(actual: AcceptOutcome, expected: AcceptOutcome) {
        assert_eq!(
            actual, expected,
            "Accept outcome mismatch: expected {}, got {}",
            expected, actual
        );
    }

    /// Assert that `quest_id` completed in this submit pass.
    #[track_caller]
    pub fn assert_completed(report: &SubmitReport, quest_id: &QuestId) {
        assert!(
            report.completed.contains(quest_id),
            "Expected {} to complete, completed: {:?}",
            quest_id,
            report.completed
        );
    }

    /// Assert that nothing completed in this submit pass.
    #[track_caller]
    pub fn assert_nothing_completed(report: &SubmitReport) {
        assert!(
            !report.succeeded(),
            "Expected no completions, got {:?}",
            report.completed
        );
    }

    /// Assert an agent state was left exactly as it was.
    #[track_caller]
    pub fn assert_state_unchanged(before: &InMemoryAgentState, after: &InMemoryAgentState) {
        assert_eq!(before, after, "Agent state changed when it should not have");
    }

    /// Assert that a decode failed with MalformedEntry on `field`.
    #[track_caller]
    pub fn assert_malformed_field<T: std::fmt::Debug>(result: &Result<T, EntryError>, field: &str) {
        match result {
            Err(EntryError::MalformedEntry { field: f, .. }) if f == field => {}
            other => panic!("Expected MalformedEntry on {field}, got: {other:?}"),
        }
    }

    /// Assert that a quest decode failed inside one of its entries.
    #[track_caller]
    pub fn assert_entry_rejected<T: std::fmt::Debug>(result: &Result<T, DefinitionError>) {
        match result {
            Err(DefinitionError::Entry { .. }) => {}
            other => panic!("Expected an entry error, got: {other:?}"),
        }
    }

    /// Assert a lifecycle state.
    #[track_caller]
    pub fn assert_quest_state(actual: QuestState, expected: QuestState) {
        assert_eq!(
            actual, expected,
            "Quest state mismatch: expected {}, got {}",
            expected, actual
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ore_quest_fixture_matches_document() {
        let decoded = QuestDefinition::from_keyed_document(
            "q1",
            &fixtures::ore_quest_document(),
            questline_core::DEFAULT_NAMESPACE,
        )
        .unwrap();
        assert_eq!(decoded.revision(), fixtures::ore_quest().revision());
    }

    #[test]
    fn test_ore_inventory_fixture() {
        let state = fixtures::ore_inventory(&[3, 2]);
        assert_eq!(state.inventory.len(), 2);
        assert_eq!(state.count_of(&fixtures::rid("ore")), 5);
    }

    #[test]
    fn test_recording_hook_grants_xp() {
        let hook = RecordingHook::granting_xp(4);
        let agent = AgentId::now_v7();
        let mut state = InMemoryAgentState::new();
        hook.on_completed(agent, &fixtures::one_time_quest(), &mut state);
        assert_eq!(state.experience_level, 4);
        assert_eq!(hook.count_for(agent), 1);
    }

    #[test]
    fn test_init_test_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_definitions_are_non_empty(def in generators::arb_quest_definition()) {
            prop_assert!(!def.is_empty());
            prop_assert!(def.entries().all(|(key, _)| key.starts_with("entry_")));
        }

        #[test]
        fn prop_generated_resource_ids_parse_back(id in generators::arb_resource_id()) {
            let parsed: ResourceId = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }

        #[test]
        fn prop_generated_entries_decode_from_their_document(entry in generators::arb_task_entry()) {
            let decoded = TaskEntry::from_document(&entry.to_document()).unwrap();
            prop_assert_eq!(decoded, entry);
        }
    }
}
