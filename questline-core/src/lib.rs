//! Questline Core - Quest Data Types
//!
//! Immutable quest definitions and the task entries they are made of.
//! Everything here is pure data plus per-entry behavior against an agent's
//! live state: no locks, no clocks, no registries. The engine crate builds
//! the progression state machine on top.

pub mod agent_state;
pub mod config;
pub mod describe;
pub mod entry;
pub mod enums;
pub mod error;
pub mod identity;
pub mod ingredient;
pub mod quest;

pub use agent_state::{AgentState, InMemoryAgentState, ItemStack};
pub use config::EngineConfig;
pub use describe::{DescribeContext, LangTable, NameKind};
pub use entry::{
    AdvancementEntry, EntryKind, ExperienceEntry, IngredientEntry, KillEntry, TaskEntry,
};
pub use enums::{AcceptOutcome, AcceptOutcomeParseError, QuestState};
pub use error::{
    ConfigError, DefinitionError, EntryError, QuestlineError, QuestlineResult, StateError,
};
pub use identity::{
    compute_content_hash, AgentId, ContentHash, QuestId, ResourceId, ResourceIdParseError,
    Timestamp, DEFAULT_NAMESPACE,
};
pub use ingredient::{Ingredient, IngredientMatcher};
pub use quest::{QuestDefinition, QuestDefinitionBuilder};
