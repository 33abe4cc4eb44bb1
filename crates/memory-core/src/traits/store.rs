use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::MemoryResult;
use crate::model::{EntityRecord, MemoryRecord, MemoryType, Scope, SearchFilters, Vector};

/// A memory paired with the similarity score the store computed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMemory {
    pub memory: MemoryRecord,
    pub score: f32,
}

/// Aggregate counts returned by `stats()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub total: u64,
    pub by_type: HashMap<MemoryType, u64>,
    pub by_scope: HashMap<Scope, u64>,
}

/// A page of `list` results plus an opaque cursor for the next page.
/// An empty `next_cursor` means "no more".
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub records: Vec<MemoryRecord>,
    pub next_cursor: String,
}

/// Bound on how many near-duplicates `find_duplicates` returns.
pub const DUPLICATE_CANDIDATE_LIMIT: usize = 5;

/// Storage abstraction over a vector database: bidirectional mapping
/// between domain records and vector-DB points, cursor pagination,
/// duplicate detection, and per-point metadata updates.
///
/// Implementations apply deadlines: a short deadline (~10s) on read
/// RPCs, a longer deadline (~30s) on write RPCs, and a dial-health check
/// on startup (`ensure_collection`). `NotFound` is the only error
/// variant callers are expected to branch on; everything else surfaces
/// as an opaque transport/serialization error.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Idempotently create the backing collection with dimension D and
    /// cosine distance; also ensure keyword payload indexes on `type`,
    /// `scope`, `visibility`, `project`, `source`.
    async fn ensure_collection(&self) -> MemoryResult<()>;

    /// Insert or replace the (id, vector, payload) tuple atomically from
    /// the store's perspective. A record's id is stable across upserts:
    /// re-upserting the same id replaces content/metadata, never re-keys.
    async fn upsert(&self, memory: &MemoryRecord, vector: &Vector) -> MemoryResult<()>;

    /// Up to `limit` highest-cosine-similarity records matching
    /// `filters`, strictly descending by score. Sensitive records are
    /// excluded unless `filters` explicitly selects them.
    async fn search(
        &self,
        vector: &Vector,
        limit: usize,
        filters: &SearchFilters,
    ) -> MemoryResult<Vec<ScoredMemory>>;

    /// Fetch by id, or `MemoryError::NotFound`.
    async fn get(&self, id: &str) -> MemoryResult<MemoryRecord>;

    /// Idempotent: succeeds even if the id does not exist.
    async fn delete(&self, id: &str) -> MemoryResult<()>;

    /// Cursor-based pagination. Empty `cursor` means "start". Ordering
    /// across pages is stable and total under a fixed filter.
    async fn list(
        &self,
        filters: &SearchFilters,
        limit: usize,
        cursor: &str,
    ) -> MemoryResult<ListPage>;

    /// Up to `DUPLICATE_CANDIDATE_LIMIT` nearest records whose cosine
    /// similarity meets or exceeds `threshold`.
    async fn find_duplicates(&self, vector: &Vector, threshold: f32) -> MemoryResult<Vec<ScoredMemory>>;

    /// Set `last_accessed = now()` and increment `access_count` without
    /// a read-modify-write race: implementations atomically patch only
    /// the affected fields.
    async fn update_access_metadata(&self, id: &str) -> MemoryResult<()>;

    /// Total count plus per-type and per-scope counts. Implementations
    /// may gather per-field counts concurrently to minimize wall time.
    async fn stats(&self) -> MemoryResult<StoreStats>;

    async fn upsert_entity(&self, entity: &EntityRecord) -> MemoryResult<()>;

    async fn get_entity(&self, id: &str) -> MemoryResult<EntityRecord>;

    /// Case-insensitive substring match against `name` and all aliases.
    async fn search_entities(&self, substring: &str) -> MemoryResult<Vec<EntityRecord>>;

    /// Idempotent: re-linking the same (entity_id, memory_id) pair is a
    /// no-op.
    async fn link_memory_to_entity(&self, entity_id: &str, memory_id: &str) -> MemoryResult<()>;

    /// Newest-first list walking `supersedes_id` until an empty link or
    /// a missing record. Detects cycles and returns a bounded result;
    /// the default implementation below is shared by every adapter
    /// since cycle-breaking is a walker concern, not a data concern.
    async fn get_chain(&self, id: &str) -> MemoryResult<Vec<MemoryRecord>> {
        const MAX_CHAIN_LEN: usize = 256;
        let mut chain = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut current = Some(id.to_string());

        while let Some(next_id) = current {
            if !visited.insert(next_id.clone()) || chain.len() >= MAX_CHAIN_LEN {
                break;
            }
            match self.get(&next_id).await {
                Ok(record) => {
                    current = record.supersedes_id.clone();
                    chain.push(record);
                }
                Err(_) => break,
            }
        }
        Ok(chain)
    }

    /// Release any held connections.
    async fn close(&self) -> MemoryResult<()>;
}
