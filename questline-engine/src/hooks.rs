//! Completion side effects supplied by the host.

use questline_core::{AgentId, AgentState, QuestDefinition};

/// Called once for every quest that reaches Completed, while the agent's
/// progress is still locked and its live state is still borrowed.
pub trait CompletionHook: Send + Sync {
    fn on_completed(&self, agent_id: AgentId, definition: &QuestDefinition, state: &mut dyn AgentState);
}

/// Hook that grants nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewards;

impl CompletionHook for NoRewards {
    fn on_completed(&self, _agent_id: AgentId, _definition: &QuestDefinition, _state: &mut dyn AgentState) {}
}

impl<F> CompletionHook for F
where
    F: Fn(AgentId, &QuestDefinition, &mut dyn AgentState) + Send + Sync,
{
    fn on_completed(&self, agent_id: AgentId, definition: &QuestDefinition, state: &mut dyn AgentState) {
        self(agent_id, definition, state)
    }
}
