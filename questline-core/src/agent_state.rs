//! Live agent state that task entries test and consume.
//!
//! The state itself is owned by the host (the game server, in practice). The
//! engine only sees it through [`AgentState`] for the duration of one call.

use crate::ResourceId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Custom-data keys a stack may carry and still count as a plain item.
pub const DATA_KEY_DAMAGE: &str = "Damage";
pub const DATA_KEY_REPAIR_COST: &str = "RepairCost";
pub const DATA_KEY_DISPLAY: &str = "display";
pub const DISPLAY_KEY_NAME: &str = "Name";

/// One inventory slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ResourceId,
    pub count: u32,
    /// Tags the stack's item type belongs to
    #[serde(default)]
    pub tags: BTreeSet<ResourceId>,
    /// Durability of the item type, 0 for items that cannot be damaged
    #[serde(default)]
    pub max_damage: u32,
    #[serde(default)]
    pub damage: u32,
    /// Player-attached custom data
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ItemStack {
    pub fn new(item: ResourceId, count: u32) -> Self {
        Self {
            item,
            count,
            tags: BTreeSet::new(),
            max_damage: 0,
            damage: 0,
            data: Map::new(),
        }
    }

    pub fn with_tag(mut self, tag: ResourceId) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn with_durability(mut self, max_damage: u32, damage: u32) -> Self {
        self.max_damage = max_damage;
        self.damage = damage;
        self
    }

    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// Attach a custom display name, the one customization that stays plain.
    pub fn renamed(self, name: &str) -> Self {
        let mut display = Map::new();
        display.insert(DISPLAY_KEY_NAME.to_string(), Value::String(name.to_string()));
        self.with_data(DATA_KEY_DISPLAY, Value::Object(display))
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_damaged(&self) -> bool {
        self.max_damage > 0 && self.damage > 0
    }

    /// True when the stack carries no custom data beyond repair cost,
    /// damage and a display name.
    pub fn is_plain(&self) -> bool {
        self.data.iter().all(|(key, value)| match key.as_str() {
            DATA_KEY_DAMAGE | DATA_KEY_REPAIR_COST => true,
            DATA_KEY_DISPLAY => match value {
                Value::Object(display) => display.keys().all(|k| k == DISPLAY_KEY_NAME),
                _ => false,
            },
            _ => false,
        })
    }

    /// Remove up to `amount` units, returning how many were taken.
    pub fn shrink(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.count);
        self.count -= taken;
        taken
    }
}

/// Capability set a task entry needs from the agent's live state.
pub trait AgentState {
    fn inventory(&self) -> &[ItemStack];

    fn inventory_mut(&mut self) -> &mut [ItemStack];

    fn experience_level(&self) -> u32;

    fn set_experience_level(&mut self, level: u32);

    /// `None` when the advancement does not exist on this host.
    fn advancement_done(&self, advancement: &ResourceId) -> Option<bool>;

    /// Kills of `entity` not yet claimed by a quest.
    fn kill_tally(&self, entity: &ResourceId) -> u32;

    fn set_kill_tally(&mut self, entity: &ResourceId, count: u32);
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

/// Plain in-memory agent state, for hosts without their own and for tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryAgentState {
    pub inventory: Vec<ItemStack>,
    pub experience_level: u32,
    /// Known advancements and whether the agent has finished each
    pub advancements: BTreeMap<ResourceId, bool>,
    pub kills: BTreeMap<ResourceId, u32>,
}

impl InMemoryAgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack(mut self, stack: ItemStack) -> Self {
        self.inventory.push(stack);
        self
    }

    pub fn with_experience(mut self, level: u32) -> Self {
        self.experience_level = level;
        self
    }

    pub fn with_advancement(mut self, advancement: ResourceId, done: bool) -> Self {
        self.advancements.insert(advancement, done);
        self
    }

    pub fn with_kills(mut self, entity: ResourceId, count: u32) -> Self {
        self.kills.insert(entity, count);
        self
    }

    /// Total units of `item` across all slots.
    pub fn count_of(&self, item: &ResourceId) -> u32 {
        self.inventory
            .iter()
            .filter(|s| &s.item == item)
            .map(|s| s.count)
            .sum()
    }
}

impl AgentState for InMemoryAgentState {
    fn inventory(&self) -> &[ItemStack] {
        &self.inventory
    }

    fn inventory_mut(&mut self) -> &mut [ItemStack] {
        &mut self.inventory
    }

    fn experience_level(&self) -> u32 {
        self.experience_level
    }

    fn set_experience_level(&mut self, level: u32) {
        self.experience_level = level;
    }

    fn advancement_done(&self, advancement: &ResourceId) -> Option<bool> {
        self.advancements.get(advancement).copied()
    }

    fn kill_tally(&self, entity: &ResourceId) -> u32 {
        self.kills.get(entity).copied().unwrap_or(0)
    }

    fn set_kill_tally(&mut self, entity: &ResourceId, count: u32) {
        self.kills.insert(entity.clone(), count);
    }
}
