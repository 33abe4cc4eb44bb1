mod capabilities;
mod store;

pub use capabilities::{
    CapturedItem, Classifier, ConflictDetector, ConflictVerdict, Embedder, MemoryExtractor,
    Reasoner,
};
pub use store::{ListPage, MemoryStore, ScoredMemory, StoreStats, DUPLICATE_CANDIDATE_LIMIT};
