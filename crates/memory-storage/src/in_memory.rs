//! Deterministic in-memory substitute for the vector-DB adapter. Used by
//! unit tests, the lifecycle dry-run preview, and local benchmarking.
//! Functionally identical contract to [`memory_core::traits::MemoryStore`]:
//! pagination sorts by id, search/find_duplicates use a naive full scan
//! with cosine similarity.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use memory_core::errors::{MemoryError, MemoryResult};
use memory_core::model::{cosine_similarity, EntityRecord, MemoryRecord, MemoryType, Scope, SearchFilters, Vector};
use memory_core::traits::{ListPage, MemoryStore, ScoredMemory, StoreStats, DUPLICATE_CANDIDATE_LIMIT};

struct Entry {
    memory: MemoryRecord,
    vector: Vector,
}

/// A single reader-writer lock guards both maps; the lock is taken for
/// the whole of any mutating call so `update_access_metadata` never
/// races a concurrent upsert into a lost update.
#[derive(Default)]
pub struct InMemoryStore {
    memories: RwLock<HashMap<String, Entry>>,
    entities: RwLock<HashMap<String, EntityRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.memories.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn ensure_collection(&self) -> MemoryResult<()> {
        Ok(())
    }

    async fn upsert(&self, memory: &MemoryRecord, vector: &Vector) -> MemoryResult<()> {
        let mut guard = self.memories.write().expect("lock poisoned");
        guard.insert(
            memory.id.clone(),
            Entry {
                memory: memory.clone(),
                vector: vector.clone(),
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        vector: &Vector,
        limit: usize,
        filters: &SearchFilters,
    ) -> MemoryResult<Vec<ScoredMemory>> {
        let guard = self.memories.read().expect("lock poisoned");
        let mut scored: Vec<ScoredMemory> = guard
            .values()
            .filter(|e| filters.matches(&e.memory))
            .map(|e| ScoredMemory {
                memory: e.memory.clone(),
                score: cosine_similarity(&vector.0, &e.vector.0),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get(&self, id: &str) -> MemoryResult<MemoryRecord> {
        let guard = self.memories.read().expect("lock poisoned");
        guard
            .get(id)
            .map(|e| e.memory.clone())
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> MemoryResult<()> {
        let mut guard = self.memories.write().expect("lock poisoned");
        guard.remove(id);
        Ok(())
    }

    async fn list(
        &self,
        filters: &SearchFilters,
        limit: usize,
        cursor: &str,
    ) -> MemoryResult<ListPage> {
        let guard = self.memories.read().expect("lock poisoned");
        let mut ids: Vec<&String> = guard
            .values()
            .filter(|e| filters.matches(&e.memory))
            .map(|e| &e.memory.id)
            .collect();
        ids.sort();

        let start = if cursor.is_empty() {
            0
        } else {
            match ids.iter().position(|id| id.as_str() > cursor) {
                Some(idx) => idx,
                None => ids.len(),
            }
        };

        let page_ids: Vec<String> = ids
            .into_iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect();

        let next_cursor = if page_ids.len() == limit {
            page_ids.last().cloned().unwrap_or_default()
        } else {
            String::new()
        };

        let records = page_ids
            .into_iter()
            .filter_map(|id| guard.get(&id).map(|e| e.memory.clone()))
            .collect();

        Ok(ListPage {
            records,
            next_cursor,
        })
    }

    async fn find_duplicates(&self, vector: &Vector, threshold: f32) -> MemoryResult<Vec<ScoredMemory>> {
        let guard = self.memories.read().expect("lock poisoned");
        let mut scored: Vec<ScoredMemory> = guard
            .values()
            .map(|e| ScoredMemory {
                memory: e.memory.clone(),
                score: cosine_similarity(&vector.0, &e.vector.0),
            })
            .filter(|s| s.score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(DUPLICATE_CANDIDATE_LIMIT);
        Ok(scored)
    }

    async fn update_access_metadata(&self, id: &str) -> MemoryResult<()> {
        let mut guard = self.memories.write().expect("lock poisoned");
        let entry = guard
            .get_mut(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        entry.memory.last_accessed = Utc::now();
        entry.memory.access_count += 1;
        Ok(())
    }

    async fn stats(&self) -> MemoryResult<StoreStats> {
        let guard = self.memories.read().expect("lock poisoned");
        let mut by_type: HashMap<MemoryType, u64> = HashMap::new();
        let mut by_scope: HashMap<Scope, u64> = HashMap::new();
        for entry in guard.values() {
            *by_type.entry(entry.memory.memory_type).or_insert(0) += 1;
            *by_scope.entry(entry.memory.scope).or_insert(0) += 1;
        }
        Ok(StoreStats {
            total: guard.len() as u64,
            by_type,
            by_scope,
        })
    }

    async fn upsert_entity(&self, entity: &EntityRecord) -> MemoryResult<()> {
        let mut guard = self.entities.write().expect("lock poisoned");
        guard.insert(entity.id.clone(), entity.clone());
        Ok(())
    }

    async fn get_entity(&self, id: &str) -> MemoryResult<EntityRecord> {
        let guard = self.entities.read().expect("lock poisoned");
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    async fn search_entities(&self, substring: &str) -> MemoryResult<Vec<EntityRecord>> {
        let guard = self.entities.read().expect("lock poisoned");
        Ok(guard
            .values()
            .filter(|e| e.matches_substring(substring))
            .cloned()
            .collect())
    }

    async fn link_memory_to_entity(&self, entity_id: &str, memory_id: &str) -> MemoryResult<()> {
        let mut guard = self.entities.write().expect("lock poisoned");
        let entity = guard
            .get_mut(entity_id)
            .ok_or_else(|| MemoryError::NotFound(entity_id.to_string()))?;
        entity.link_memory(memory_id);
        Ok(())
    }

    async fn close(&self) -> MemoryResult<()> {
        Ok(())
    }
}
