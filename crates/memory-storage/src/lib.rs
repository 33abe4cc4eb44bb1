//! Storage abstraction over a vector database: the Qdrant-shaped HTTP
//! adapter (`qdrant::QdrantStore`) and a deterministic in-memory
//! reference implementation (`in_memory::InMemoryStore`) sharing the
//! one `memory_core::traits::MemoryStore` contract.

pub mod in_memory;
mod payload;
pub mod qdrant;

pub use in_memory::InMemoryStore;
pub use qdrant::QdrantStore;
