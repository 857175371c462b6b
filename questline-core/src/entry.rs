//! Task entries: the individual requirements of a quest.
//!
//! Entries are immutable and hold no progress. `submit` is a function of the
//! agent's live state at call time and is all-or-nothing: either the full
//! requirement is consumed and `true` is returned, or nothing changes.

use crate::describe::{name_or_placeholder, render, DescribeContext, NameKind};
use crate::{AgentState, EntryError, Ingredient, IngredientMatcher, ResourceId, DEFAULT_NAMESPACE};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTRY KIND
// ============================================================================

/// Stable type tag of an entry variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Ingredient,
    Kill,
    Experience,
    Advancement,
}

impl EntryKind {
    pub const ALL: [EntryKind; 4] = [
        EntryKind::Ingredient,
        EntryKind::Kill,
        EntryKind::Experience,
        EntryKind::Advancement,
    ];

    /// Tag written to the `type` field and used as the template key.
    pub fn tag(&self) -> &'static str {
        match self {
            EntryKind::Ingredient => "questline:ingredient",
            EntryKind::Kill => "questline:entity",
            EntryKind::Experience => "questline:xp",
            EntryKind::Advancement => "questline:advancement",
        }
    }

    /// Parse a type tag; a bare path is read in the `questline` namespace.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let qualified = if tag.contains(':') {
            tag.to_string()
        } else {
            format!("{}:{}", DEFAULT_NAMESPACE, tag)
        };
        Self::ALL.into_iter().find(|k| k.tag() == qualified)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for EntryKind {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| EntryError::UnknownEntryType {
            entry_type: s.to_string(),
        })
    }
}

// ============================================================================
// VARIANTS
// ============================================================================

/// Deliver items matching an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IngredientEntry {
    ingredient: Ingredient,
    amount: u32,
    description: Option<String>,
}

impl IngredientEntry {
    pub fn new(ingredient: Ingredient, amount: u32, description: Option<String>) -> Self {
        Self {
            ingredient,
            amount,
            description: description.filter(|d| !d.is_empty()),
        }
    }

    pub fn ingredient(&self) -> &Ingredient {
        &self.ingredient
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    /// Indices of inventory slots this entry may consume from.
    fn matching_slots(&self, state: &dyn AgentState) -> (Vec<usize>, u64) {
        let mut slots = Vec::new();
        let mut available = 0u64;
        for (index, stack) in state.inventory().iter().enumerate() {
            if stack.is_empty() || !self.ingredient.test(stack) {
                continue;
            }
            if stack.is_damaged() || !stack.is_plain() {
                continue;
            }
            slots.push(index);
            available += u64::from(stack.count);
        }
        (slots, available)
    }

    fn submit(&self, state: &mut dyn AgentState) -> bool {
        let (slots, available) = self.matching_slots(state);
        if available < u64::from(self.amount) {
            return false;
        }
        let inventory = state.inventory_mut();
        let mut remaining = self.amount;
        for index in slots {
            if remaining == 0 {
                break;
            }
            remaining -= inventory[index].shrink(remaining);
        }
        true
    }

    fn describe(&self, ctx: &dyn DescribeContext) -> String {
        let tag = EntryKind::Ingredient.tag();
        let amount = self.amount.to_string();
        let names: Vec<String> = self
            .ingredient
            .alternatives()
            .iter()
            .map(|m| match m {
                IngredientMatcher::Item(item) => name_or_placeholder(ctx, NameKind::Item, item),
                IngredientMatcher::Tag(tag) => format!("#{}", tag),
            })
            .collect();
        match names.as_slice() {
            [] => render(ctx, &format!("{}.empty", tag), &[]),
            [single] => render(
                ctx,
                &format!("{}.single", tag),
                &[("amount", &amount), ("item", single)],
            ),
            many => render(
                ctx,
                &format!("{}.multi", tag),
                &[("amount", &amount), ("items", &format!("[{}]", many.join(", ")))],
            ),
        }
    }
}

/// Defeat a number of entities of one type.
///
/// Kills are claimed from the agent's unclaimed tally, so one kill never
/// counts toward two quests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KillEntry {
    entity: ResourceId,
    amount: u32,
    description: Option<String>,
}

impl KillEntry {
    pub fn new(entity: ResourceId, amount: u32, description: Option<String>) -> Self {
        Self {
            entity,
            amount,
            description: description.filter(|d| !d.is_empty()),
        }
    }

    pub fn entity(&self) -> &ResourceId {
        &self.entity
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    fn submit(&self, state: &mut dyn AgentState) -> bool {
        let tally = state.kill_tally(&self.entity);
        if tally < self.amount {
            return false;
        }
        state.set_kill_tally(&self.entity, tally - self.amount);
        true
    }
}

/// Hand in experience levels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperienceEntry {
    amount: u32,
    description: Option<String>,
}

impl ExperienceEntry {
    pub fn new(amount: u32, description: Option<String>) -> Self {
        Self {
            amount,
            description: description.filter(|d| !d.is_empty()),
        }
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    fn submit(&self, state: &mut dyn AgentState) -> bool {
        let level = state.experience_level();
        if level < self.amount {
            return false;
        }
        state.set_experience_level(level - self.amount);
        true
    }
}

/// Have completed an advancement. Checked, never consumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdvancementEntry {
    advancement: ResourceId,
    description: Option<String>,
}

impl AdvancementEntry {
    pub fn new(advancement: ResourceId, description: Option<String>) -> Self {
        Self {
            advancement,
            description: description.filter(|d| !d.is_empty()),
        }
    }

    pub fn advancement(&self) -> &ResourceId {
        &self.advancement
    }
}

// ============================================================================
// TASK ENTRY
// ============================================================================

/// One requirement of a quest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskEntry {
    Ingredient(IngredientEntry),
    Kill(KillEntry),
    Experience(ExperienceEntry),
    Advancement(AdvancementEntry),
}

impl TaskEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            TaskEntry::Ingredient(_) => EntryKind::Ingredient,
            TaskEntry::Kill(_) => EntryKind::Kill,
            TaskEntry::Experience(_) => EntryKind::Experience,
            TaskEntry::Advancement(_) => EntryKind::Advancement,
        }
    }

    /// Stable type tag, used for decoding and template lookup.
    pub fn identify(&self) -> &'static str {
        self.kind().tag()
    }

    /// Whether a successful submit removes something from the agent.
    pub fn is_consuming(&self) -> bool {
        !matches!(self, TaskEntry::Advancement(_))
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            TaskEntry::Ingredient(e) => e.description.as_deref(),
            TaskEntry::Kill(e) => e.description.as_deref(),
            TaskEntry::Experience(e) => e.description.as_deref(),
            TaskEntry::Advancement(e) => e.description.as_deref(),
        }
    }

    /// Test the requirement against live state and consume it on success.
    pub fn submit(&self, state: &mut dyn AgentState) -> bool {
        match self {
            TaskEntry::Ingredient(e) => e.submit(state),
            TaskEntry::Kill(e) => e.submit(state),
            TaskEntry::Experience(e) => e.submit(state),
            TaskEntry::Advancement(e) => state.advancement_done(&e.advancement) == Some(true),
        }
    }

    /// Human-readable text; an explicit description always wins.
    pub fn describe(&self, ctx: &dyn DescribeContext) -> String {
        if let Some(description) = self.description() {
            return description.to_string();
        }
        let tag = self.identify();
        match self {
            TaskEntry::Ingredient(e) => e.describe(ctx),
            TaskEntry::Kill(e) => render(
                ctx,
                tag,
                &[
                    ("amount", &e.amount.to_string()),
                    ("entity", &name_or_placeholder(ctx, NameKind::Entity, &e.entity)),
                ],
            ),
            TaskEntry::Experience(e) => render(ctx, tag, &[("amount", &e.amount.to_string())]),
            TaskEntry::Advancement(e) => render(
                ctx,
                tag,
                &[(
                    "advancement",
                    &name_or_placeholder(ctx, NameKind::Advancement, &e.advancement),
                )],
            ),
        }
    }

    /// Encode as a document carrying the type tag plus variant fields.
    pub fn to_document(&self) -> Value {
        let mut doc = match self {
            TaskEntry::Ingredient(e) => json!({
                "ingredient": e.ingredient.to_document(),
                "amount": e.amount,
            }),
            TaskEntry::Kill(e) => json!({
                "entity": e.entity.to_string(),
                "amount": e.amount,
            }),
            TaskEntry::Experience(e) => json!({ "amount": e.amount }),
            TaskEntry::Advancement(e) => json!({ "advancement": e.advancement.to_string() }),
        };
        if let Value::Object(obj) = &mut doc {
            obj.insert("type".to_string(), Value::String(self.identify().to_string()));
            if let Some(description) = self.description() {
                obj.insert(
                    "description".to_string(),
                    Value::String(description.to_string()),
                );
            }
        }
        doc
    }

    /// Decode with bare resource ids read in the `questline` namespace.
    pub fn from_document(doc: &Value) -> Result<Self, EntryError> {
        Self::from_document_in(doc, DEFAULT_NAMESPACE)
    }

    /// Decode with bare resource ids read in `namespace`.
    pub fn from_document_in(doc: &Value, namespace: &str) -> Result<Self, EntryError> {
        let obj = doc
            .as_object()
            .ok_or_else(|| EntryError::malformed("entry", "<root>", "must be an object"))?;
        let raw_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| EntryError::malformed("entry", "type", "is required"))?;
        let kind: EntryKind = raw_type.parse()?;
        let tag = kind.tag();
        let description = optional_string(obj, tag, "description")?;

        let entry = match kind {
            EntryKind::Ingredient => {
                let ingredient = obj
                    .get("ingredient")
                    .ok_or_else(|| EntryError::malformed(tag, "ingredient", "is required"))?;
                TaskEntry::Ingredient(IngredientEntry::new(
                    Ingredient::from_document(ingredient, tag, namespace)?,
                    amount_field(obj, tag, None)?,
                    description,
                ))
            }
            EntryKind::Kill => TaskEntry::Kill(KillEntry::new(
                resource_field(obj, tag, "entity", namespace)?,
                amount_field(obj, tag, Some(1))?,
                description,
            )),
            EntryKind::Experience => TaskEntry::Experience(ExperienceEntry::new(
                amount_field(obj, tag, Some(1))?,
                description,
            )),
            EntryKind::Advancement => TaskEntry::Advancement(AdvancementEntry::new(
                resource_field(obj, tag, "advancement", namespace)?,
                description,
            )),
        };
        Ok(entry)
    }
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn amount_field(
    obj: &Map<String, Value>,
    entry_type: &str,
    default: Option<u32>,
) -> Result<u32, EntryError> {
    let amount = match (obj.get("amount"), default) {
        (Some(value), _) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                EntryError::malformed(entry_type, "amount", "must be a non-negative integer")
            })?,
        (None, Some(default)) => default,
        (None, None) => return Err(EntryError::malformed(entry_type, "amount", "is required")),
    };
    if amount == 0 {
        return Err(EntryError::malformed(entry_type, "amount", "must be at least 1"));
    }
    Ok(amount)
}

fn resource_field(
    obj: &Map<String, Value>,
    entry_type: &str,
    field: &str,
    namespace: &str,
) -> Result<ResourceId, EntryError> {
    let raw = obj
        .get(field)
        .ok_or_else(|| EntryError::malformed(entry_type, field, "is required"))?
        .as_str()
        .ok_or_else(|| EntryError::malformed(entry_type, field, "must be a string"))?;
    ResourceId::parse_with_default(raw, namespace)
        .map_err(|e| EntryError::malformed(entry_type, field, e.to_string()))
}

fn optional_string(
    obj: &Map<String, Value>,
    entry_type: &str,
    field: &str,
) -> Result<Option<String>, EntryError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(EntryError::malformed(entry_type, field, "must be a string")),
    }
}

// ============================================================================
// TESTS
// ============================================================================
