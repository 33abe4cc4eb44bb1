use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored record describing a fact, rule, procedure, episode, or
/// preference surfaced back to an agent during recall.
///
/// Round-trips through the store: `upsert(m, v)` followed by `get(m.id)`
/// must return a record equal to `m` field-for-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryRecord {
    pub id: String,
    pub memory_type: MemoryType,
    pub scope: Scope,
    pub visibility: Visibility,
    pub content: String,
    pub confidence: f64,
    pub source: String,
    pub tags: Vec<String>,
    pub project: String,
    pub ttl_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub metadata: HashMap<String, serde_json::Value>,
    pub supersedes_id: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    /// blake3 digest of the trimmed content, recomputed on construction.
    /// Used by the capture pipeline's cheap pre-filter and by the
    /// consolidation phase's audit log; not part of the spec's named
    /// fields but required to make "near-duplicate rejection" auditable.
    pub content_hash: ContentHash,
}

impl Default for MemoryRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            memory_type: MemoryType::Fact,
            scope: Scope::Permanent,
            visibility: Visibility::Private,
            content: String::new(),
            confidence: 1.0,
            source: String::new(),
            tags: Vec::new(),
            project: String::new(),
            ttl_seconds: 0,
            created_at: now,
            updated_at: now,
            last_accessed: now,
            access_count: 0,
            metadata: HashMap::new(),
            supersedes_id: None,
            valid_until: None,
            content_hash: ContentHash::of(""),
        }
    }
}

impl MemoryRecord {
    /// Build a fresh record with a generated id and current timestamps,
    /// as the capture pipeline and the markdown indexer do.
    pub fn new(content: impl Into<String>, memory_type: MemoryType, scope: Scope) -> Self {
        let content = content.into().trim().to_string();
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            memory_type,
            scope,
            content_hash: ContentHash::of(&content),
            content,
            created_at: now,
            updated_at: now,
            last_accessed: now,
            ..Default::default()
        }
    }

    /// Non-empty content after trimming is a storage precondition;
    /// callers at the interface boundary validate with this.
    pub fn has_valid_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Whether `scope == Ttl` and a TTL is actually configured.
    pub fn has_active_ttl(&self) -> bool {
        self.scope == Scope::Ttl && self.ttl_seconds > 0
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.has_active_ttl()
            .then(|| self.created_at + chrono::Duration::seconds(self.ttl_seconds as i64))
    }
}

/// blake3 digest of trimmed memory content, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn of(content: &str) -> Self {
        Self(blake3::hash(content.trim().as_bytes()).to_hex().to_string())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        ContentHash::of("")
    }
}

/// The kind of thing a memory captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Rule,
    #[default]
    Fact,
    Episode,
    Procedure,
    Preference,
}

impl FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rule" => Ok(MemoryType::Rule),
            "fact" => Ok(MemoryType::Fact),
            "episode" => Ok(MemoryType::Episode),
            "procedure" => Ok(MemoryType::Procedure),
            "preference" => Ok(MemoryType::Preference),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryType::Rule => "rule",
            MemoryType::Fact => "fact",
            MemoryType::Episode => "episode",
            MemoryType::Procedure => "procedure",
            MemoryType::Preference => "preference",
        };
        write!(f, "{s}")
    }
}

/// Retention class controlling lifecycle behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Permanent,
    Project,
    Session,
    Ttl,
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permanent" => Ok(Scope::Permanent),
            "project" => Ok(Scope::Project),
            "session" => Ok(Scope::Session),
            "ttl" => Ok(Scope::Ttl),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Permanent => "permanent",
            Scope::Project => "project",
            Scope::Session => "session",
            Scope::Ttl => "ttl",
        };
        write!(f, "{s}")
    }
}

/// Access class; sensitive records require explicit opt-in to be
/// returned from `list`/`search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Shared,
    Sensitive,
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Visibility::Private),
            "shared" => Ok(Visibility::Shared),
            "sensitive" => Ok(Visibility::Sensitive),
            other => Err(format!("unknown visibility: {other}")),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Visibility::Private => "private",
            Visibility::Shared => "shared",
            Visibility::Sensitive => "sensitive",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_ignores_surrounding_whitespace() {
        assert_eq!(ContentHash::of("  hello  "), ContentHash::of("hello"));
    }

    #[test]
    fn memory_type_round_trips_through_display_and_from_str() {
        for mt in [
            MemoryType::Rule,
            MemoryType::Fact,
            MemoryType::Episode,
            MemoryType::Procedure,
            MemoryType::Preference,
        ] {
            assert_eq!(mt.to_string().parse::<MemoryType>().unwrap(), mt);
        }
    }

    #[test]
    fn new_record_has_non_empty_id_and_trimmed_content() {
        let m = MemoryRecord::new("  some fact  ", MemoryType::Fact, Scope::Permanent);
        assert!(!m.id.is_empty());
        assert_eq!(m.content, "some fact");
        assert!(m.has_valid_content());
    }

    #[test]
    fn ttl_scope_without_seconds_has_no_active_ttl() {
        let mut m = MemoryRecord::new("x", MemoryType::Fact, Scope::Ttl);
        m.ttl_seconds = 0;
        assert!(!m.has_active_ttl());
        assert!(m.expires_at().is_none());
    }
}
