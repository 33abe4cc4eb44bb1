//! Bidirectional mapping between domain records and vector-DB point
//! payloads. Scalar fields map to typed scalars, `tags` to a list of
//! strings, `metadata` to a JSON-serialized string (payload schemas on
//! the vector-DB side are schema-less key/value bags; a nested map
//! would not survive every backend's payload type constraints, so it
//! travels as one opaque string field and is parsed back on read).
//! Read-back tolerates missing fields by defaulting to zero values.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use memory_core::model::{ContentHash, EntityRecord, EntityType, MemoryRecord, MemoryType};

pub fn memory_to_payload(memory: &MemoryRecord) -> Value {
    json!({
        "memory_type": memory.memory_type.to_string(),
        "scope": memory.scope.to_string(),
        "visibility": memory.visibility.to_string(),
        "content": memory.content,
        "confidence": memory.confidence,
        "source": memory.source,
        "tags": memory.tags,
        "project": memory.project,
        "ttl_seconds": memory.ttl_seconds,
        "created_at": memory.created_at.to_rfc3339(),
        "updated_at": memory.updated_at.to_rfc3339(),
        "last_accessed": memory.last_accessed.to_rfc3339(),
        "access_count": memory.access_count,
        "metadata": serde_json::to_string(&memory.metadata).unwrap_or_default(),
        "supersedes_id": memory.supersedes_id,
        "valid_until": memory.valid_until.map(|t| t.to_rfc3339()),
        "content_hash": memory.content_hash.0,
    })
}

fn str_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn timestamp_field(payload: &Value, key: &str) -> DateTime<Utc> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap_or_else(Utc::now))
}

pub fn payload_to_memory(id: &str, payload: &Value) -> MemoryRecord {
    let content = str_field(payload, "content");
    let metadata: HashMap<String, Value> = payload
        .get("metadata")
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    let tags = payload
        .get("tags")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    MemoryRecord {
        id: id.to_string(),
        memory_type: str_field(payload, "memory_type").parse().unwrap_or_default(),
        scope: str_field(payload, "scope").parse().unwrap_or_default(),
        visibility: str_field(payload, "visibility").parse().unwrap_or_default(),
        content_hash: ContentHash::of(&content),
        content,
        confidence: payload.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
        source: str_field(payload, "source"),
        tags,
        project: str_field(payload, "project"),
        ttl_seconds: payload.get("ttl_seconds").and_then(Value::as_u64).unwrap_or(0),
        created_at: timestamp_field(payload, "created_at"),
        updated_at: timestamp_field(payload, "updated_at"),
        last_accessed: timestamp_field(payload, "last_accessed"),
        access_count: payload.get("access_count").and_then(Value::as_u64).unwrap_or(0),
        metadata,
        supersedes_id: payload
            .get("supersedes_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        valid_until: payload
            .get("valid_until")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

pub fn entity_to_payload(entity: &EntityRecord) -> Value {
    json!({
        "name": entity.name,
        "entity_type": entity.entity_type.to_string(),
        "aliases": entity.aliases,
        "memory_ids": entity.memory_ids,
        "created_at": entity.created_at.to_rfc3339(),
        "updated_at": entity.updated_at.to_rfc3339(),
        "metadata": serde_json::to_string(&entity.metadata).unwrap_or_default(),
    })
}

pub fn payload_to_entity(id: &str, payload: &Value) -> EntityRecord {
    let metadata: HashMap<String, Value> = payload
        .get("metadata")
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    EntityRecord {
        id: id.to_string(),
        name: str_field(payload, "name"),
        entity_type: str_field(payload, "entity_type").parse().unwrap_or(EntityType::Concept),
        aliases: payload
            .get("aliases")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        memory_ids: payload
            .get("memory_ids")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        created_at: timestamp_field(payload, "created_at"),
        updated_at: timestamp_field(payload, "updated_at"),
        metadata,
    }
}

/// Fields that receive keyword payload indexes so the store can filter
/// efficiently on them.
pub const INDEXED_FIELDS: &[&str] = &["memory_type", "scope", "visibility", "project", "source"];

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::model::{MemoryRecord, Scope};

    #[test]
    fn round_trips_through_payload() {
        let mut m = MemoryRecord::new("hello world", MemoryType::Rule, Scope::Project);
        m.project = "alpha".to_string();
        m.tags = vec!["a".to_string(), "b".to_string()];
        m.metadata.insert("k".to_string(), json!("v"));

        let payload = memory_to_payload(&m);
        let back = payload_to_memory(&m.id, &payload);

        assert_eq!(back.content, m.content);
        assert_eq!(back.memory_type, m.memory_type);
        assert_eq!(back.scope, m.scope);
        assert_eq!(back.project, m.project);
        assert_eq!(back.tags, m.tags);
        assert_eq!(back.metadata, m.metadata);
    }

    #[test]
    fn missing_fields_default_to_zero_values() {
        let empty = json!({});
        let back = payload_to_memory("id-1", &empty);
        assert_eq!(back.access_count, 0);
        assert_eq!(back.ttl_seconds, 0);
        assert!(back.tags.is_empty());
    }
}
