//! Domain model, error taxonomy, configuration, and the small
//! capability traits (`MemoryStore`, `Embedder`, `MemoryExtractor`,
//! `Classifier`, `ConflictDetector`, `Reasoner`) that every other crate
//! in the workspace builds against. No subsystem owns process-wide
//! mutable state or a singleton; everything here is constructor-
//! injected by its callers.

pub mod config;
pub mod errors;
pub mod model;
pub mod traits;
