use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ancillary record participating in the same store as memories,
/// linking named entities (people, projects, systems, decisions,
/// concepts) to the memories that mention them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub aliases: Vec<String>,
    pub memory_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

impl Default for EntityRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: String::new(),
            entity_type: EntityType::Concept,
            aliases: Vec::new(),
            memory_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: Default::default(),
        }
    }
}

impl EntityRecord {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            entity_type,
            ..Default::default()
        }
    }

    /// Link a memory id, idempotently: re-linking the same pair is a
    /// no-op and `memory_ids` never accumulates duplicates.
    pub fn link_memory(&mut self, memory_id: &str) {
        if !self.memory_ids.iter().any(|id| id == memory_id) {
            self.memory_ids.push(memory_id.to_string());
        }
    }

    /// Case-insensitive substring match against name and all aliases.
    pub fn matches_substring(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.name.to_ascii_lowercase().contains(&needle)
            || self
                .aliases
                .iter()
                .any(|a| a.to_ascii_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Project,
    System,
    Decision,
    #[default]
    Concept,
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "person" => Ok(EntityType::Person),
            "project" => Ok(EntityType::Project),
            "system" => Ok(EntityType::System),
            "decision" => Ok(EntityType::Decision),
            "concept" => Ok(EntityType::Concept),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Person => "person",
            EntityType::Project => "project",
            EntityType::System => "system",
            EntityType::Decision => "decision",
            EntityType::Concept => "concept",
        };
        write!(f, "{s}")
    }
}
