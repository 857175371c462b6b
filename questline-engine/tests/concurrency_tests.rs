use questline_core::{AgentState, ExperienceEntry, QuestDefinition, TaskEntry};
use questline_engine::{AgentSnapshot, ProgressStorage, QuestEngine, QuestRegistry};
use questline_test_utils::fixtures::*;
use questline_test_utils::{
    AgentId, InMemoryAgentState, InMemoryProgressStorage, QuestState, QuestlineResult,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// A quest whose every entry asks for `version` levels, so a mixed read
/// would show entries with different amounts.
fn versioned_quest(version: u32) -> QuestDefinition {
    let mut builder = QuestDefinition::builder(qid("versioned")).task(format!("v{version}"));
    for i in 0..8 {
        builder = builder.entry(
            format!("e{i}"),
            TaskEntry::Experience(ExperienceEntry::new(version, None)),
        );
    }
    builder.build().unwrap()
}

fn amounts(def: &QuestDefinition) -> HashSet<u32> {
    def.entries()
        .map(|(_, entry)| match entry {
            TaskEntry::Experience(xp) => xp.amount(),
            _ => 0,
        })
        .collect()
}

#[test]
fn lookups_never_see_a_half_reloaded_definition() {
    let registry = Arc::new(QuestRegistry::from_definitions(vec![versioned_quest(1)]));
    let revisions: HashSet<[u8; 32]> = (1..=50).map(|v| *versioned_quest(v).revision()).collect();

    thread::scope(|s| {
        let writer = Arc::clone(&registry);
        s.spawn(move || {
            for version in 2..=50 {
                writer.reload(vec![versioned_quest(version)]);
            }
        });
        for _ in 0..4 {
            let reader = Arc::clone(&registry);
            let revisions = &revisions;
            s.spawn(move || {
                for _ in 0..500 {
                    let def = reader.lookup(&qid("versioned")).unwrap();
                    let seen = amounts(&def);
                    assert_eq!(seen.len(), 1, "entries from two versions");
                    assert!(revisions.contains(def.revision()));
                    let version = seen.into_iter().next().unwrap_or(0);
                    assert_eq!(def.task(), format!("v{version}"));
                }
            });
        }
    });
    assert_eq!(registry.generation(), 50);
}

#[test]
fn same_agent_accepts_are_serialized() {
    let engine = Arc::new(engine_with(vec![ore_quest()], manual_clock()));
    let agent = AgentId::now_v7();

    let winners: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                s.spawn(move || engine.accept(agent, &qid("q1")).unwrap())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|accepted| *accepted)
            .count()
    });
    assert_eq!(winners, 1);
    assert_eq!(engine.current_progress(agent).unwrap().len(), 1);
}

#[test]
fn concurrent_submit_and_reset_never_lose_or_resurrect_progress() {
    let engine = Arc::new(engine_with(vec![two_part_quest()], manual_clock()));
    let agent = AgentId::now_v7();
    let quest = qid("two_part");

    for _ in 0..50 {
        engine.accept(agent, &quest).unwrap();
        thread::scope(|s| {
            let submitter = Arc::clone(&engine);
            s.spawn(move || {
                let mut state = InMemoryAgentState::new()
                    .with_stack(questline_test_utils::ItemStack::new(rid("gem"), 2));
                submitter.submit_all(agent, &mut state).unwrap();
            });
            let admin = Arc::clone(&engine);
            s.spawn(move || {
                admin.reset(agent, &qid("two_part"), false).unwrap();
            });
        });
        // Either the reset ran last and the quest is gone, or it ran first and
        // the submit found nothing to work on. Progress never outlives the reset.
        assert!(engine.current_progress(agent).unwrap().is_empty());
    }
}

#[test]
fn different_agents_progress_independently() {
    let engine: Arc<QuestEngine> = Arc::new(engine_with(vec![ore_quest()], manual_clock()));
    let agents: Vec<AgentId> = (0..16).map(|_| AgentId::now_v7()).collect();

    thread::scope(|s| {
        for &agent in &agents {
            let engine = Arc::clone(&engine);
            s.spawn(move || {
                assert!(engine.accept(agent, &qid("q1")).unwrap());
                let mut state = ore_inventory(&[2, 3]);
                assert!(engine.submit_all(agent, &mut state).unwrap().succeeded());
            });
        }
    });

    assert_eq!(engine.loaded_agents(), agents.len());
    for agent in agents {
        assert_eq!(engine.export_agent(agent).unwrap().completion_count, 1);
    }
}

#[test]
fn unload_waits_for_the_operation_holding_the_agent() {
    let gate = Arc::new(Barrier::new(2));
    let hook_gate = Arc::clone(&gate);
    let storage = Arc::new(InMemoryProgressStorage::new());
    let engine = Arc::new(
        QuestEngine::builder()
            .definitions(vec![repeatable_quest("daily", Duration::from_secs(3600))])
            .clock(manual_clock())
            .storage(storage.clone())
            .completion_hook(Arc::new(
                move |_: AgentId, _: &QuestDefinition, _: &mut dyn AgentState| {
                    // Parked inside the agent's lock until the main thread lets go.
                    hook_gate.wait();
                    hook_gate.wait();
                },
            ))
            .build()
            .unwrap(),
    );
    let agent = AgentId::now_v7();
    assert!(engine.accept(agent, &qid("daily")).unwrap());

    thread::scope(|s| {
        let submitter = Arc::clone(&engine);
        let completed = s.spawn(move || {
            let mut state = InMemoryAgentState::new().with_experience(2);
            submitter.submit_all(agent, &mut state).unwrap().succeeded()
        });
        gate.wait();

        let unloader = Arc::clone(&engine);
        let seen = s.spawn(move || {
            assert!(unloader.unload_agent(agent));
            unloader.state_of(agent, &qid("daily")).unwrap()
        });
        thread::sleep(Duration::from_millis(50));
        gate.wait();

        assert!(completed.join().unwrap());
        assert_eq!(seen.join().unwrap(), QuestState::Cooldown);
    });

    engine.reset_cooldown(agent).unwrap();
    let stored = storage.load(agent).unwrap().unwrap();
    assert_eq!(stored.completion_count, 1);
    assert!(stored.completed.is_empty());
    assert_eq!(engine.loaded_agents(), 1);
}

#[test]
fn unloading_under_load_never_loses_a_completion() {
    let (engine, hook, storage) =
        recording_engine(vec![repeatable_quest("daily", Duration::ZERO)], manual_clock());
    let engine = Arc::new(engine);
    let agent = AgentId::now_v7();

    thread::scope(|s| {
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            s.spawn(move || {
                for _ in 0..50 {
                    engine.accept(agent, &qid("daily")).unwrap();
                    let mut state = InMemoryAgentState::new().with_experience(1);
                    engine.submit_all(agent, &mut state).unwrap();
                }
            });
        }
        let unloader = Arc::clone(&engine);
        s.spawn(move || {
            for _ in 0..200 {
                unloader.unload_agent(agent);
                thread::yield_now();
            }
        });
    });

    let completions = hook.count_for(agent) as u64;
    assert!(completions > 0);
    assert_eq!(storage.load(agent).unwrap().unwrap().completion_count, completions);
    assert_eq!(engine.export_agent(agent).unwrap().completion_count, completions);
}

/// Storage whose first load of one agent blocks until released.
struct GatedStorage {
    inner: InMemoryProgressStorage,
    slow: AgentId,
    entered: Barrier,
    release: Barrier,
}

impl ProgressStorage for GatedStorage {
    fn load(&self, agent_id: AgentId) -> QuestlineResult<Option<AgentSnapshot>> {
        if agent_id == self.slow {
            self.entered.wait();
            self.release.wait();
        }
        self.inner.load(agent_id)
    }

    fn save(&self, snapshot: &AgentSnapshot) -> QuestlineResult<()> {
        self.inner.save(snapshot)
    }
}

#[test]
fn slow_load_of_one_agent_does_not_block_others() {
    let slow = AgentId::now_v7();
    let storage = Arc::new(GatedStorage {
        inner: InMemoryProgressStorage::new(),
        slow,
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let engine = Arc::new(
        QuestEngine::builder()
            .definitions(vec![ore_quest()])
            .clock(manual_clock())
            .storage(storage.clone())
            .build()
            .unwrap(),
    );

    thread::scope(|s| {
        let blocked = Arc::clone(&engine);
        let waiting = s.spawn(move || blocked.accept(slow, &qid("q1")).unwrap());
        storage.entered.wait();

        let fast = AgentId::now_v7();
        assert!(engine.accept(fast, &qid("q1")).unwrap());
        let mut state = ore_inventory(&[5]);
        assert!(engine.submit_all(fast, &mut state).unwrap().succeeded());
        assert_eq!(engine.export_agent(fast).unwrap().completion_count, 1);

        storage.release.wait();
        assert!(waiting.join().unwrap());
    });
    assert_eq!(engine.loaded_agents(), 2);
}
