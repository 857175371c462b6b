//! Quest definitions and their document codec.
//!
//! A definition is built once (from a document or the builder) and never
//! mutated; reloads replace it wholesale.

use crate::{
    compute_content_hash, ContentHash, DefinitionError, QuestId, ResourceId, TaskEntry, Timestamp,
};
use serde_json::{json, Value};
use std::time::Duration;

/// An immutable, named collection of task entries plus metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestDefinition {
    id: QuestId,
    /// Insertion-ordered; keys are unique.
    entries: Vec<(String, TaskEntry)>,
    task: String,
    repeatable: bool,
    cooldown: Option<Duration>,
    daily_limit: Option<u32>,
    prerequisites: Vec<QuestId>,
    loot_table: Option<ResourceId>,
    sort_order: i32,
    revision: ContentHash,
}

impl QuestDefinition {
    pub fn builder(id: QuestId) -> QuestDefinitionBuilder {
        QuestDefinitionBuilder {
            id,
            entries: Vec::new(),
            task: String::new(),
            repeatable: false,
            cooldown: None,
            daily_limit: None,
            prerequisites: Vec::new(),
            loot_table: None,
            sort_order: 0,
        }
    }

    pub fn id(&self) -> &QuestId {
        &self.id
    }

    /// Entries in definition order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &TaskEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn entry(&self, key: &str) -> Option<&TaskEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summary text shown for the quest as a whole.
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    /// Wait between completion and re-acceptance. Always `None` for one-time quests.
    pub fn cooldown(&self) -> Option<Duration> {
        self.cooldown
    }

    pub fn daily_limit(&self) -> Option<u32> {
        self.daily_limit
    }

    pub fn prerequisites(&self) -> &[QuestId] {
        &self.prerequisites
    }

    /// Reward loot table handed to the completion hook.
    pub fn loot_table(&self) -> Option<&ResourceId> {
        self.loot_table.as_ref()
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    /// SHA-256 of the canonical document this definition encodes to.
    pub fn revision(&self) -> &ContentHash {
        &self.revision
    }

    pub fn revision_hex(&self) -> String {
        hex::encode(self.revision)
    }

    /// Instant the cooldown following a completion at `completed_at` ends.
    ///
    /// `None` only when the quest has no cooldown. A cooldown reaching past
    /// the representable range ends at `Timestamp::MAX_UTC`.
    pub fn cooldown_end(&self, completed_at: Timestamp) -> Option<Timestamp> {
        let cooldown = self.cooldown?;
        let end = chrono::Duration::from_std(cooldown)
            .ok()
            .and_then(|delta| completed_at.checked_add_signed(delta));
        Some(end.unwrap_or(Timestamp::MAX_UTC))
    }

    // ------------------------------------------------------------------------
    // Document codec
    // ------------------------------------------------------------------------

    pub fn to_document(&self) -> Value {
        let entries: Vec<Value> = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let mut doc = entry.to_document();
                if let Value::Object(obj) = &mut doc {
                    obj.insert("key".to_string(), Value::String(key.clone()));
                }
                doc
            })
            .collect();
        let mut doc = json!({
            "task": self.task,
            "repeatable": self.repeatable,
            "sort_order": self.sort_order,
            "entries": entries,
        });
        if let Value::Object(obj) = &mut doc {
            if let Some(cooldown) = self.cooldown {
                obj.insert("cooldown".to_string(), json!(cooldown.as_secs()));
            }
            if let Some(limit) = self.daily_limit {
                obj.insert("daily_limit".to_string(), json!(limit));
            }
            if !self.prerequisites.is_empty() {
                let parents: Vec<String> =
                    self.prerequisites.iter().map(ToString::to_string).collect();
                obj.insert("parents".to_string(), json!(parents));
            }
            if let Some(loot) = &self.loot_table {
                obj.insert("loot_table".to_string(), json!(loot.to_string()));
            }
        }
        doc
    }

    /// Decode a quest document. Bare resource ids are read in `namespace`.
    pub fn from_document(id: QuestId, doc: &Value, namespace: &str) -> Result<Self, DefinitionError> {
        let invalid = |field: &str, reason: &str| DefinitionError::InvalidField {
            quest_id: id.clone(),
            field: field.to_string(),
            reason: reason.to_string(),
        };
        let obj = doc
            .as_object()
            .ok_or_else(|| invalid("<root>", "must be an object"))?;

        let mut builder = QuestDefinition::builder(id.clone());

        if let Some(task) = obj.get("task") {
            builder = builder.task(task.as_str().ok_or_else(|| invalid("task", "must be a string"))?);
        }
        if let Some(repeatable) = obj.get("repeatable") {
            builder = builder.repeatable(
                repeatable
                    .as_bool()
                    .ok_or_else(|| invalid("repeatable", "must be a boolean"))?,
            );
        }
        if let Some(cooldown) = obj.get("cooldown") {
            let secs = cooldown
                .as_u64()
                .ok_or_else(|| invalid("cooldown", "must be a non-negative number of seconds"))?;
            if secs > 0 {
                builder = builder.cooldown(Duration::from_secs(secs));
            }
        }
        if let Some(limit) = obj.get("daily_limit") {
            let limit = limit
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("daily_limit", "must be a positive integer"))?;
            builder = builder.daily_limit(limit);
        }
        if let Some(order) = obj.get("sort_order") {
            let order = order
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| invalid("sort_order", "must be an integer"))?;
            builder = builder.sort_order(order);
        }
        if let Some(parents) = obj.get("parents") {
            let parents = parents
                .as_array()
                .ok_or_else(|| invalid("parents", "must be an array of quest ids"))?;
            for parent in parents {
                let parent = parent
                    .as_str()
                    .and_then(|raw| ResourceId::parse_with_default(raw, namespace).ok())
                    .ok_or_else(|| invalid("parents", "must be an array of quest ids"))?;
                builder = builder.prerequisite(QuestId::new(parent));
            }
        }
        if let Some(loot) = obj.get("loot_table") {
            let loot = loot
                .as_str()
                .and_then(|raw| ResourceId::parse_with_default(raw, namespace).ok())
                .ok_or_else(|| invalid("loot_table", "must be a resource id"))?;
            builder = builder.loot_table(loot);
        }

        let entries = obj
            .get("entries")
            .ok_or_else(|| invalid("entries", "is required"))?
            .as_array()
            .ok_or_else(|| invalid("entries", "must be an array"))?;
        for (index, entry_doc) in entries.iter().enumerate() {
            let key = match entry_doc.get("key") {
                None => format!("entry_{}", index),
                Some(Value::String(key)) if !key.is_empty() => key.clone(),
                Some(_) => return Err(invalid("entries.key", "must be a non-empty string")),
            };
            let entry = TaskEntry::from_document_in(entry_doc, namespace).map_err(|source| {
                DefinitionError::Entry {
                    quest_id: id.clone(),
                    key: key.clone(),
                    source,
                }
            })?;
            builder = builder.entry(key, entry);
        }

        builder.build()
    }

    /// Decode a keyed document, parsing the quest id as well.
    pub fn from_keyed_document(
        raw_id: &str,
        doc: &Value,
        namespace: &str,
    ) -> Result<Self, DefinitionError> {
        let id = ResourceId::parse_with_default(raw_id, namespace)
            .map(QuestId::new)
            .map_err(|_| DefinitionError::InvalidQuestId {
                raw: raw_id.to_string(),
            })?;
        Self::from_document(id, doc, namespace)
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder validating the definition invariants on `build`.
#[derive(Debug, Clone)]
pub struct QuestDefinitionBuilder {
    id: QuestId,
    entries: Vec<(String, TaskEntry)>,
    task: String,
    repeatable: bool,
    cooldown: Option<Duration>,
    daily_limit: Option<u32>,
    prerequisites: Vec<QuestId>,
    loot_table: Option<ResourceId>,
    sort_order: i32,
}

impl QuestDefinitionBuilder {
    pub fn entry(mut self, key: impl Into<String>, entry: TaskEntry) -> Self {
        self.entries.push((key.into(), entry));
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn repeatable(mut self, repeatable: bool) -> Self {
        self.repeatable = repeatable;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    pub fn prerequisite(mut self, parent: QuestId) -> Self {
        self.prerequisites.push(parent);
        self
    }

    pub fn loot_table(mut self, loot_table: ResourceId) -> Self {
        self.loot_table = Some(loot_table);
        self
    }

    pub fn sort_order(mut self, order: i32) -> Self {
        self.sort_order = order;
        self
    }

    pub fn build(self) -> Result<QuestDefinition, DefinitionError> {
        if self.entries.is_empty() {
            return Err(DefinitionError::EmptyEntries { quest_id: self.id });
        }
        for (i, (key, _)) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|(k, _)| k == key) {
                return Err(DefinitionError::DuplicateEntryKey {
                    quest_id: self.id,
                    key: key.clone(),
                });
            }
        }
        if self.prerequisites.contains(&self.id) {
            return Err(DefinitionError::InvalidField {
                quest_id: self.id,
                field: "parents".to_string(),
                reason: "a quest cannot require itself".to_string(),
            });
        }

        let mut definition = QuestDefinition {
            id: self.id,
            entries: self.entries,
            task: self.task,
            repeatable: self.repeatable,
            cooldown: if self.repeatable { self.cooldown } else { None },
            daily_limit: self.daily_limit,
            prerequisites: self.prerequisites,
            loot_table: self.loot_table,
            sort_order: self.sort_order,
            revision: [0u8; 32],
        };
        // serde_json maps are sorted, so the encoding is canonical.
        let canonical = serde_json::to_vec(&definition.to_document()).unwrap_or_default();
        definition.revision = compute_content_hash(&canonical);
        Ok(definition)
    }
}

// ============================================================================
// TESTS
// ============================================================================
