//! Identity types for Questline entities

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash of a quest document.
pub type ContentHash = [u8; 32];

/// Namespace applied to identifiers written without one.
pub const DEFAULT_NAMESPACE: &str = "questline";

static NAMESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_.-]+$").expect("valid regex"));
static PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_./-]+$").expect("valid regex"));

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

// ============================================================================
// AGENT ID
// ============================================================================

/// Identifier of an agent (player) whose quest progress is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(Uuid);

impl AgentId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a new timestamp-sortable agent id.
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AgentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// ============================================================================
// RESOURCE ID
// ============================================================================

/// Namespaced identifier (`namespace:path`) naming items, tags, entity types,
/// advancements, loot tables and quests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    namespace: String,
    path: String,
}

impl ResourceId {
    /// Build from separate parts, validating both.
    pub fn new(namespace: &str, path: &str) -> Result<Self, ResourceIdParseError> {
        if !NAMESPACE_RE.is_match(namespace) || !PATH_RE.is_match(path) {
            return Err(ResourceIdParseError(format!("{}:{}", namespace, path)));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// Parse `namespace:path`, or a bare `path` placed in `default_namespace`.
    pub fn parse_with_default(s: &str, default_namespace: &str) -> Result<Self, ResourceIdParseError> {
        match s.split_once(':') {
            Some((ns, path)) => Self::new(ns, path),
            None => Self::new(default_namespace, s),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for ResourceId {
    type Err = ResourceIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_default(s, DEFAULT_NAMESPACE)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ResourceIdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

/// Error when parsing an invalid namespaced identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdParseError(pub String);

impl fmt::Display for ResourceIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid resource id: {}", self.0)
    }
}

impl std::error::Error for ResourceIdParseError {}

// ============================================================================
// QUEST ID
// ============================================================================

/// Identifier of a quest definition, unique within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestId(ResourceId);

impl QuestId {
    pub fn new(id: ResourceId) -> Self {
        Self(id)
    }

    pub fn as_resource(&self) -> &ResourceId {
        &self.0
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for QuestId {
    type Err = ResourceIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<ResourceId> for QuestId {
    fn from(id: ResourceId) -> Self {
        Self(id)
    }
}
