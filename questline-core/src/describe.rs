//! Human-readable entry descriptions.
//!
//! Rendering proper is the host's business. This module only fills
//! templates, so it never fails: unknown names degrade to placeholders and
//! missing templates fall back to the built-in English ones.

use crate::ResourceId;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid regex"));

/// What kind of thing a display name is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NameKind {
    Item,
    Entity,
    Advancement,
}

impl NameKind {
    fn missing_key(&self) -> &'static str {
        match self {
            NameKind::Item => "questline.missing.item",
            NameKind::Entity => "questline.missing.entity",
            NameKind::Advancement => "questline.missing.advancement",
        }
    }
}

/// Host-supplied lookups used while describing an entry.
pub trait DescribeContext {
    /// Template for a translation key, if the host overrides it.
    fn template(&self, key: &str) -> Option<&str>;

    /// Display name of a referenced resource, `None` when it does not exist.
    fn display_name(&self, kind: NameKind, id: &ResourceId) -> Option<String>;
}

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("questline:ingredient.empty", "Deliver an item that no longer exists"),
    ("questline:ingredient.single", "Deliver {amount} x {item}"),
    ("questline:ingredient.multi", "Deliver {amount} of any of {items}"),
    ("questline:entity", "Defeat {amount} x {entity}"),
    ("questline:xp", "Hand in {amount} experience levels"),
    ("questline:advancement", "Complete the advancement {advancement}"),
    ("questline.missing.item", "<missing item {id}>"),
    ("questline.missing.entity", "<missing entity {id}>"),
    ("questline.missing.advancement", "<missing advancement {id}>"),
];

/// Built-in English template for `key`.
pub fn builtin_template(key: &str) -> Option<&'static str> {
    BUILTIN_TEMPLATES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

/// Substitute `{name}` placeholders in one pass over the template.
/// Substituted values are never scanned again; unknown placeholders stay as written.
pub fn fill(template: &str, args: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            args.iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}

/// Resolve a template through the context, then the built-ins, then the key itself.
pub fn render(ctx: &dyn DescribeContext, key: &str, args: &[(&str, &str)]) -> String {
    let template = ctx
        .template(key)
        .map(str::to_string)
        .or_else(|| builtin_template(key).map(str::to_string))
        .unwrap_or_else(|| key.to_string());
    fill(&template, args)
}

/// Display name of `id`, or the "missing reference" placeholder.
pub fn name_or_placeholder(ctx: &dyn DescribeContext, kind: NameKind, id: &ResourceId) -> String {
    match ctx.display_name(kind, id) {
        Some(name) => name,
        None => render(ctx, kind.missing_key(), &[("id", &id.to_string())]),
    }
}

// ============================================================================
// LANG TABLE
// ============================================================================

/// Table-backed context: template overrides plus known display names.
#[derive(Debug, Clone, Default)]
pub struct LangTable {
    templates: BTreeMap<String, String>,
    names: BTreeMap<(NameKind, ResourceId), String>,
}

impl LangTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, key: &str, template: &str) -> Self {
        self.templates.insert(key.to_string(), template.to_string());
        self
    }

    pub fn with_name(mut self, kind: NameKind, id: ResourceId, name: &str) -> Self {
        self.names.insert((kind, id), name.to_string());
        self
    }
}

impl DescribeContext for LangTable {
    fn template(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }

    fn display_name(&self, kind: NameKind, id: &ResourceId) -> Option<String> {
        self.names.get(&(kind, id.clone())).cloned()
    }
}
