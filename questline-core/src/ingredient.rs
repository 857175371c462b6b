//! Item predicates for ingredient entries.
//!
//! Document form is either a single alternative (`{"item": id}` or
//! `{"tag": id}`) or an array of alternatives. A stack matches when any
//! alternative matches.

use crate::{EntryError, ItemStack, ResourceId};
use serde_json::{json, Map, Value};

/// One way an item stack can satisfy an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IngredientMatcher {
    /// Exactly this item type
    Item(ResourceId),
    /// Any item type carrying this tag
    Tag(ResourceId),
}

impl IngredientMatcher {
    pub fn test(&self, stack: &ItemStack) -> bool {
        match self {
            IngredientMatcher::Item(item) => &stack.item == item,
            IngredientMatcher::Tag(tag) => stack.tags.contains(tag),
        }
    }

    fn to_document(&self) -> Value {
        match self {
            IngredientMatcher::Item(item) => json!({ "item": item.to_string() }),
            IngredientMatcher::Tag(tag) => json!({ "tag": tag.to_string() }),
        }
    }

    fn from_object(
        obj: &Map<String, Value>,
        entry_type: &str,
        namespace: &str,
    ) -> Result<Self, EntryError> {
        let parse = |field: &str, raw: &Value| -> Result<ResourceId, EntryError> {
            let raw = raw
                .as_str()
                .ok_or_else(|| EntryError::malformed(entry_type, field, "must be a string"))?;
            ResourceId::parse_with_default(raw, namespace)
                .map_err(|e| EntryError::malformed(entry_type, field, e.to_string()))
        };
        match (obj.get("item"), obj.get("tag")) {
            (Some(item), None) => Ok(IngredientMatcher::Item(parse("ingredient.item", item)?)),
            (None, Some(tag)) => Ok(IngredientMatcher::Tag(parse("ingredient.tag", tag)?)),
            (Some(_), Some(_)) => Err(EntryError::malformed(
                entry_type,
                "ingredient",
                "must name either an item or a tag, not both",
            )),
            (None, None) => Err(EntryError::malformed(
                entry_type,
                "ingredient",
                "requires an 'item' or 'tag' field",
            )),
        }
    }
}

/// A set of alternative item matchers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Ingredient {
    alternatives: Vec<IngredientMatcher>,
}

impl Ingredient {
    pub fn new(alternatives: Vec<IngredientMatcher>) -> Self {
        Self { alternatives }
    }

    pub fn of_item(item: ResourceId) -> Self {
        Self::new(vec![IngredientMatcher::Item(item)])
    }

    pub fn of_tag(tag: ResourceId) -> Self {
        Self::new(vec![IngredientMatcher::Tag(tag)])
    }

    pub fn alternatives(&self) -> &[IngredientMatcher] {
        &self.alternatives
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Type/tag test only; damage and custom data are the entry's concern.
    pub fn test(&self, stack: &ItemStack) -> bool {
        self.alternatives.iter().any(|m| m.test(stack))
    }

    pub fn to_document(&self) -> Value {
        match self.alternatives.as_slice() {
            [single] => single.to_document(),
            many => Value::Array(many.iter().map(IngredientMatcher::to_document).collect()),
        }
    }

    pub fn from_document(
        doc: &Value,
        entry_type: &str,
        namespace: &str,
    ) -> Result<Self, EntryError> {
        match doc {
            Value::Object(obj) => Ok(Self::new(vec![IngredientMatcher::from_object(
                obj, entry_type, namespace,
            )?])),
            Value::Array(items) => {
                let alternatives = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(obj) => {
                            IngredientMatcher::from_object(obj, entry_type, namespace)
                        }
                        _ => Err(EntryError::malformed(
                            entry_type,
                            "ingredient",
                            "array elements must be objects",
                        )),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(alternatives))
            }
            _ => Err(EntryError::malformed(
                entry_type,
                "ingredient",
                "must be an object or an array of objects",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPE: &str = "questline:ingredient";

    fn id(s: &str) -> ResourceId {
        s.parse().unwrap()
    }

    #[test]
    fn test_item_and_tag_matching() {
        let stack = ItemStack::new(id("minecraft:iron_ore"), 1).with_tag(id("forge:ores"));
        assert!(Ingredient::of_item(id("minecraft:iron_ore")).test(&stack));
        assert!(Ingredient::of_tag(id("forge:ores")).test(&stack));
        assert!(!Ingredient::of_item(id("minecraft:gold_ore")).test(&stack));
        assert!(!Ingredient::default().test(&stack));
    }

    #[test]
    fn test_single_object_document() {
        let doc = json!({ "item": "minecraft:iron_ore" });
        let ingredient = Ingredient::from_document(&doc, TYPE, "minecraft").unwrap();
        assert_eq!(ingredient, Ingredient::of_item(id("minecraft:iron_ore")));
        assert_eq!(ingredient.to_document(), doc);
    }

    #[test]
    fn test_array_document_with_default_namespace() {
        let doc = json!([{ "item": "iron_ore" }, { "tag": "forge:ores" }]);
        let ingredient = Ingredient::from_document(&doc, TYPE, "minecraft").unwrap();
        assert_eq!(ingredient.alternatives().len(), 2);
        assert_eq!(
            ingredient.alternatives()[0],
            IngredientMatcher::Item(id("minecraft:iron_ore"))
        );
        assert_eq!(
            ingredient.to_document(),
            json!([{ "item": "minecraft:iron_ore" }, { "tag": "forge:ores" }])
        );
    }

    #[test]
    fn test_malformed_documents() {
        for doc in [
            json!("minecraft:iron_ore"),
            json!({}),
            json!({ "item": 5 }),
            json!({ "item": "a", "tag": "b" }),
            json!([1, 2]),
            json!({ "item": "Bad Id" }),
        ] {
            let err = Ingredient::from_document(&doc, TYPE, "minecraft").unwrap_err();
            assert!(matches!(err, EntryError::MalformedEntry { .. }), "{:?}", doc);
        }
    }
}
