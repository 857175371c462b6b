use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use questline_core::{
    AgentId, EngineConfig, ExperienceEntry, InMemoryAgentState, Ingredient, IngredientEntry,
    ItemStack, KillEntry, QuestDefinition, QuestId, ResourceId, TaskEntry,
};
use questline_engine::{AgentProgressStore, NoRewards, QuestRegistry};
use std::hint::black_box;

fn rid(s: &str) -> ResourceId {
    s.parse().expect("valid id")
}

/// Twenty accepted quests, each with a delivery, a kill and an xp entry.
fn busy_agent() -> (QuestRegistry, AgentProgressStore, InMemoryAgentState) {
    let defs: Vec<QuestDefinition> = (0..20)
        .map(|i| {
            QuestDefinition::builder(QuestId::new(rid(&format!("bench/q{i}"))))
                .entry(
                    "ore",
                    TaskEntry::Ingredient(IngredientEntry::new(Ingredient::of_item(rid("ore")), 3, None)),
                )
                .entry("kills", TaskEntry::Kill(KillEntry::new(rid("zombie"), 2, None)))
                .entry("xp", TaskEntry::Experience(ExperienceEntry::new(1, None)))
                .build()
                .expect("valid quest")
        })
        .collect();
    let registry = QuestRegistry::from_definitions(defs);
    let snapshot = registry.snapshot();
    let config = EngineConfig::default();
    let now = chrono::Utc::now();

    let mut store = AgentProgressStore::new(AgentId::now_v7());
    for def in snapshot.ordered() {
        store.accept(&snapshot, def.id(), now, &config);
    }

    let mut state = InMemoryAgentState::new()
        .with_experience(15)
        .with_kills(rid("zombie"), 30);
    for slot in 0..36 {
        let item = if slot % 2 == 0 { "ore" } else { "dirt" };
        state.inventory.push(ItemStack::new(rid(item), 4));
    }
    (registry, store, state)
}

fn bench_submit_all(c: &mut Criterion) {
    let (registry, store, state) = busy_agent();
    let snapshot = registry.snapshot();
    let config = EngineConfig::default();
    let now = chrono::Utc::now();

    c.bench_function("store/submit_all_twenty_quests", |b| {
        b.iter_batched(
            || (store.clone(), state.clone()),
            |(mut store, mut state)| {
                black_box(store.submit_all(&snapshot, &mut state, now, &config, &NoRewards));
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_can_accept(c: &mut Criterion) {
    let (registry, store, _) = busy_agent();
    let snapshot = registry.snapshot();
    let config = EngineConfig::default();
    let now = chrono::Utc::now();
    let id = QuestId::new(rid("bench/q7"));

    c.bench_function("store/can_accept", |b| {
        b.iter(|| black_box(store.can_accept(&snapshot, &id, now, &config)));
    });
}

criterion_group!(benches, bench_submit_all, bench_can_accept);
criterion_main!(benches);
