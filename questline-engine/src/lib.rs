//! Questline Engine - Quest Progression
//!
//! Runs the per-agent quest lifecycle on top of `questline-core`:
//! - Quest registry with atomic snapshot reload
//! - Accepted-quest progress and the accept/submit/reset state machine
//! - Per-agent locking, clock and persistence hooks
//!
//! ```text
//! QuestEngine ──→ QuestRegistry ──→ Arc<RegistrySnapshot> ──→ Arc<QuestDefinition>
//!      │
//!      └──→ agent id ──→ Mutex<AgentProgressStore> ──→ AgentProgress per quest
//! ```

pub mod clock;
pub mod engine;
pub mod hooks;
pub mod progress;
pub mod registry;
pub mod storage;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{QuestEngine, QuestEngineBuilder};
pub use hooks::{CompletionHook, NoRewards};
pub use progress::AgentProgress;
pub use registry::{QuestRegistry, RegistrySnapshot, RejectedQuest, ReloadReport};
pub use storage::{AgentSnapshot, DailyTally, InMemoryProgressStorage, ProgressStorage};
pub use store::{AgentProgressStore, ProgressView, SubmitReport};
