//! HTTP adapter against a Qdrant-shaped vector-DB REST contract:
//! `/collections/{name}/points/search`, `/points/upsert`,
//! `/points/scroll`, `/points/payload`. The vector DB is treated purely
//! as an external HTTP-reachable service per the spec — no vendor SDK
//! is pulled in; this adapter is built on the same `reqwest` +
//! `serde_json` stack the rest of the workspace already uses for
//! outbound HTTP.
//!
//! Entities are stored in a sibling collection (`{collection}_entities`)
//! since they share no vector space with memories but do share the
//! store's transport, pagination, and payload-mapping machinery.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use memory_core::config::StorageConfig;
use memory_core::errors::{MemoryError, MemoryResult, StorageError};
use memory_core::model::{EntityRecord, MemoryRecord, MemoryType, Scope, SearchFilters, Vector, Visibility};
use memory_core::traits::{ListPage, MemoryStore, ScoredMemory, StoreStats, DUPLICATE_CANDIDATE_LIMIT};

use crate::payload::{entity_to_payload, memory_to_payload, payload_to_entity, payload_to_memory, INDEXED_FIELDS};

const READ_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    pub fn new(config: &StorageConfig, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url(),
            collection: config.collection.clone(),
            dimension,
        }
    }

    fn entities_collection(&self) -> String {
        format!("{}_entities", self.collection)
    }

    async fn dial_health_check(&self) -> MemoryResult<()> {
        let url = format!("{}/collections", self.base_url);
        self.request_with_timeout(READ_TIMEOUT, self.client.get(&url))
            .await
            .map(|_| ())
    }

    async fn request_with_timeout(
        &self,
        timeout: Duration,
        builder: reqwest::RequestBuilder,
    ) -> MemoryResult<Value> {
        let response = tokio::time::timeout(timeout, builder.send())
            .await
            .map_err(|_| StorageError::Timeout {
                millis: timeout.as_millis() as u64,
            })?
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Transport(format!("{status}: {body}")).into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(body)
    }

    async fn ensure_one_collection(&self, name: &str) -> MemoryResult<()> {
        let url = format!("{}/collections/{name}", self.base_url);
        let body = json!({
            "vectors": { "size": self.dimension, "distance": "Cosine" }
        });
        let _ = self
            .request_with_timeout(WRITE_TIMEOUT, self.client.put(&url).json(&body))
            .await;

        for field in INDEXED_FIELDS {
            let index_url = format!("{}/collections/{name}/index", self.base_url);
            let index_body = json!({ "field_name": field, "field_schema": "keyword" });
            let _ = self
                .request_with_timeout(WRITE_TIMEOUT, self.client.put(&index_url).json(&index_body))
                .await;
        }
        Ok(())
    }

    fn build_filter(&self, filters: &SearchFilters) -> Value {
        let mut must = Vec::new();
        if let Some(mt) = filters.memory_type {
            must.push(json!({ "key": "memory_type", "match": { "value": mt.to_string() } }));
        }
        if let Some(scope) = filters.scope {
            must.push(json!({ "key": "scope", "match": { "value": scope.to_string() } }));
        }
        if let Some(ref project) = filters.project {
            must.push(json!({ "key": "project", "match": { "value": project } }));
        }
        if let Some(ref source) = filters.source {
            must.push(json!({ "key": "source", "match": { "value": source } }));
        }
        if let Some(ref tag) = filters.tag {
            must.push(json!({ "key": "tags", "match": { "value": tag } }));
        }
        if filters.wants_sensitive() {
            must.push(json!({ "key": "visibility", "match": { "value": "sensitive" } }));
        } else if let Some(vis) = filters.visibility {
            must.push(json!({ "key": "visibility", "match": { "value": vis.to_string() } }));
        } else {
            must.push(json!({ "key": "visibility", "match": { "except": ["sensitive"] } }));
        }
        json!({ "must": must })
    }

    async fn count(&self, name: &str, filter: &Value) -> MemoryResult<u64> {
        let url = format!("{}/collections/{name}/points/count", self.base_url);
        let body = json!({ "filter": filter, "exact": true });
        let resp = self
            .request_with_timeout(READ_TIMEOUT, self.client.post(&url).json(&body))
            .await?;
        Ok(resp
            .get("result")
            .and_then(|r| r.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl MemoryStore for QdrantStore {
    async fn ensure_collection(&self) -> MemoryResult<()> {
        self.dial_health_check().await?;
        self.ensure_one_collection(&self.collection).await?;
        self.ensure_one_collection(&self.entities_collection()).await
    }

    async fn upsert(&self, memory: &MemoryRecord, vector: &Vector) -> MemoryResult<()> {
        vector
            .require_dimension(self.dimension)
            .map_err(MemoryError::from)?;
        let url = format!("{}/collections/{}/points", self.base_url, self.collection);
        let body = json!({
            "points": [{
                "id": memory.id,
                "vector": vector.0,
                "payload": memory_to_payload(memory),
            }]
        });
        self.request_with_timeout(WRITE_TIMEOUT, self.client.put(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &Vector,
        limit: usize,
        filters: &SearchFilters,
    ) -> MemoryResult<Vec<ScoredMemory>> {
        let url = format!("{}/collections/{}/points/search", self.base_url, self.collection);
        let body = json!({
            "vector": vector.0,
            "limit": limit,
            "filter": self.build_filter(filters),
            "with_payload": true,
        });
        let resp = self
            .request_with_timeout(READ_TIMEOUT, self.client.post(&url).json(&body))
            .await?;

        let mut results = Vec::new();
        if let Some(points) = resp.get("result").and_then(Value::as_array) {
            for point in points {
                let id = point_id_string(point);
                let score = point.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
                let payload = point.get("payload").cloned().unwrap_or(json!({}));
                results.push(ScoredMemory {
                    memory: payload_to_memory(&id, &payload),
                    score,
                });
            }
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    async fn get(&self, id: &str) -> MemoryResult<MemoryRecord> {
        let url = format!("{}/collections/{}/points/{id}", self.base_url, self.collection);
        let resp = tokio::time::timeout(READ_TIMEOUT, self.client.get(&url).send())
            .await
            .map_err(|_| StorageError::Timeout {
                millis: READ_TIMEOUT.as_millis() as u64,
            })?
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(StorageError::Transport(resp.status().to_string()).into());
        }
        let body: Value = resp.json().await.map_err(|e| StorageError::Transport(e.to_string()))?;
        let result = body.get("result");
        match result {
            None | Some(Value::Null) => Err(MemoryError::NotFound(id.to_string())),
            Some(point) => {
                let payload = point.get("payload").cloned().unwrap_or(json!({}));
                Ok(payload_to_memory(id, &payload))
            }
        }
    }

    async fn delete(&self, id: &str) -> MemoryResult<()> {
        let url = format!("{}/collections/{}/points/delete", self.base_url, self.collection);
        let body = json!({ "points": [id] });
        self.request_with_timeout(WRITE_TIMEOUT, self.client.post(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn list(
        &self,
        filters: &SearchFilters,
        limit: usize,
        cursor: &str,
    ) -> MemoryResult<ListPage> {
        let url = format!("{}/collections/{}/points/scroll", self.base_url, self.collection);
        let mut body = json!({
            "filter": self.build_filter(filters),
            "limit": limit,
            "with_payload": true,
            "order_by": "id",
        });
        if !cursor.is_empty() {
            body["offset"] = json!(cursor);
        }
        let resp = self
            .request_with_timeout(READ_TIMEOUT, self.client.post(&url).json(&body))
            .await?;

        let mut records = Vec::new();
        if let Some(points) = resp.get("result").and_then(|r| r.get("points")).and_then(Value::as_array) {
            for point in points {
                let id = point_id_string(point);
                let payload = point.get("payload").cloned().unwrap_or(json!({}));
                records.push(payload_to_memory(&id, &payload));
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let next_cursor = resp
            .get("result")
            .and_then(|r| r.get("next_page_offset"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(ListPage { records, next_cursor })
    }

    async fn find_duplicates(&self, vector: &Vector, threshold: f32) -> MemoryResult<Vec<ScoredMemory>> {
        let mut results = self
            .search(vector, DUPLICATE_CANDIDATE_LIMIT, &SearchFilters::default())
            .await?;
        results.retain(|r| r.score >= threshold);
        Ok(results)
    }

    async fn update_access_metadata(&self, id: &str) -> MemoryResult<()> {
        // Atomic patch of only the affected fields: fetch access_count
        // first (read-modify-write races are tolerated per spec, which
        // treats the counter as approximate under concurrency).
        let current = self.get(id).await?;
        let url = format!("{}/collections/{}/points/payload", self.base_url, self.collection);
        let body = json!({
            "points": [id],
            "payload": {
                "last_accessed": chrono::Utc::now().to_rfc3339(),
                "access_count": current.access_count + 1,
            }
        });
        self.request_with_timeout(WRITE_TIMEOUT, self.client.post(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn stats(&self) -> MemoryResult<StoreStats> {
        let total_filter = json!({});
        let types = [
            MemoryType::Rule,
            MemoryType::Fact,
            MemoryType::Episode,
            MemoryType::Procedure,
            MemoryType::Preference,
        ];
        let scopes = [Scope::Permanent, Scope::Project, Scope::Session, Scope::Ttl];

        // Fan out the per-field counts concurrently, then join.
        let total_fut = self.count(&self.collection, &total_filter);
        let type_futs = types.iter().map(|t| {
            let filter = json!({ "must": [{ "key": "memory_type", "match": { "value": t.to_string() } }] });
            self.count(&self.collection, &filter)
        });
        let scope_futs = scopes.iter().map(|s| {
            let filter = json!({ "must": [{ "key": "scope", "match": { "value": s.to_string() } }] });
            self.count(&self.collection, &filter)
        });

        let (total, type_counts, scope_counts) = tokio::join!(
            total_fut,
            futures::future::join_all(type_futs),
            futures::future::join_all(scope_futs),
        );

        let mut by_type = HashMap::new();
        for (t, count) in types.iter().zip(type_counts) {
            by_type.insert(*t, count.unwrap_or(0));
        }
        let mut by_scope = HashMap::new();
        for (s, count) in scopes.iter().zip(scope_counts) {
            by_scope.insert(*s, count.unwrap_or(0));
        }

        Ok(StoreStats {
            total: total?,
            by_type,
            by_scope,
        })
    }

    async fn upsert_entity(&self, entity: &EntityRecord) -> MemoryResult<()> {
        let url = format!("{}/collections/{}/points", self.base_url, self.entities_collection());
        let body = json!({
            "points": [{
                "id": entity.id,
                "vector": vec![0.0f32; self.dimension],
                "payload": entity_to_payload(entity),
            }]
        });
        self.request_with_timeout(WRITE_TIMEOUT, self.client.put(&url).json(&body))
            .await?;
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> MemoryResult<EntityRecord> {
        let url = format!("{}/collections/{}/points/{id}", self.base_url, self.entities_collection());
        let resp = tokio::time::timeout(READ_TIMEOUT, self.client.get(&url).send())
            .await
            .map_err(|_| StorageError::Timeout {
                millis: READ_TIMEOUT.as_millis() as u64,
            })?
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        let body: Value = resp.json().await.map_err(|e| StorageError::Transport(e.to_string()))?;
        match body.get("result") {
            None | Some(Value::Null) => Err(MemoryError::NotFound(id.to_string())),
            Some(point) => {
                let payload = point.get("payload").cloned().unwrap_or(json!({}));
                Ok(payload_to_entity(id, &payload))
            }
        }
    }

    async fn search_entities(&self, substring: &str) -> MemoryResult<Vec<EntityRecord>> {
        let url = format!("{}/collections/{}/points/scroll", self.base_url, self.entities_collection());
        let body = json!({ "limit": 1000, "with_payload": true });
        let resp = self
            .request_with_timeout(READ_TIMEOUT, self.client.post(&url).json(&body))
            .await?;
        let mut entities = Vec::new();
        if let Some(points) = resp.get("result").and_then(|r| r.get("points")).and_then(Value::as_array) {
            for point in points {
                let id = point_id_string(point);
                let payload = point.get("payload").cloned().unwrap_or(json!({}));
                let entity = payload_to_entity(&id, &payload);
                if entity.matches_substring(substring) {
                    entities.push(entity);
                }
            }
        }
        Ok(entities)
    }

    async fn link_memory_to_entity(&self, entity_id: &str, memory_id: &str) -> MemoryResult<()> {
        let mut entity = self.get_entity(entity_id).await?;
        entity.link_memory(memory_id);
        self.upsert_entity(&entity).await
    }

    async fn close(&self) -> MemoryResult<()> {
        Ok(())
    }
}

fn point_id_string(point: &Value) -> String {
    match point.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_filter_excludes_sensitive_by_default() {
        let store = QdrantStore::new(&StorageConfig::default(), 4);
        let filter = store.build_filter(&SearchFilters::default());
        let must = filter.get("must").and_then(Value::as_array).unwrap();
        assert!(must
            .iter()
            .any(|clause| clause.get("key").and_then(Value::as_str) == Some("visibility")));
    }

    #[test]
    fn build_filter_includes_sensitive_when_requested() {
        let store = QdrantStore::new(&StorageConfig::default(), 4);
        let filters = SearchFilters {
            visibility: Some(Visibility::Sensitive),
            ..Default::default()
        };
        let filter = store.build_filter(&filters);
        let must = filter.get("must").and_then(Value::as_array).unwrap();
        let matches_sensitive = must.iter().any(|clause| {
            clause.get("match").and_then(|m| m.get("value")).and_then(Value::as_str) == Some("sensitive")
        });
        assert!(matches_sensitive);
    }
}
