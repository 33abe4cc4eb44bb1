mod defaults;
mod embedding_config;
mod engine_config;
mod ranker_config;
mod storage_config;

use serde::{Deserialize, Serialize};

pub use embedding_config::EmbeddingConfig;
pub use engine_config::EngineConfig;
pub use ranker_config::RankerConfig;
pub use storage_config::StorageConfig;

/// Top-level configuration aggregating every subsystem config. Loaded
/// from TOML with `#[serde(default)]` on every subsection so a partial
/// file still produces a usable config, then overridden by
/// `CORTEX_MEMORY_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CortexMemoryConfig {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub engine: EngineConfig,
    pub ranker: RankerConfig,
}

impl CortexMemoryConfig {
    /// Load from a TOML string, falling back to defaults for missing
    /// fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Apply `CORTEX_MEMORY_<SECTION>_<FIELD>` environment overrides on
    /// top of a loaded config. Only the handful of fields operators
    /// commonly override at deploy time are wired; anything else stays
    /// file-driven.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CORTEX_MEMORY_STORAGE_HOST") {
            self.storage.host = v;
        }
        if let Ok(v) = std::env::var("CORTEX_MEMORY_STORAGE_PORT") {
            if let Ok(port) = v.parse() {
                self.storage.port = port;
            }
        }
        if let Ok(v) = std::env::var("CORTEX_MEMORY_STORAGE_COLLECTION") {
            self.storage.collection = v;
        }
        if let Ok(v) = std::env::var("CORTEX_MEMORY_EMBEDDER_URL") {
            self.embedding.url = v;
        }
        if let Ok(v) = std::env::var("CORTEX_MEMORY_EMBEDDER_MODEL") {
            self.embedding.model = v;
        }
    }

    /// Validate every subsection. Rejects empty host/collection/embedder
    /// URL, non-positive chunk size, an overlap that is negative or >=
    /// chunk size, dedup thresholds outside [0, 1], non-positive vector
    /// dimension, and a negative default TTL.
    pub fn validate(&self) -> Result<(), String> {
        if self.storage.host.trim().is_empty() {
            return Err("storage.host must not be empty".to_string());
        }
        if self.storage.collection.trim().is_empty() {
            return Err("storage.collection must not be empty".to_string());
        }
        if self.embedding.url.trim().is_empty() {
            return Err("embedding.url must not be empty".to_string());
        }
        if self.engine.chunk_size == 0 {
            return Err("engine.chunk_size must be > 0".to_string());
        }
        if self.engine.chunk_overlap >= self.engine.chunk_size as i64
            || self.engine.chunk_overlap < 0
        {
            return Err(
                "engine.chunk_overlap must be >= 0 and < engine.chunk_size".to_string(),
            );
        }
        if !(0.0..=1.0).contains(&self.engine.dedup_threshold) {
            return Err("engine.dedup_threshold must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.engine.dedup_threshold_hook) {
            return Err("engine.dedup_threshold_hook must be within [0, 1]".to_string());
        }
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".to_string());
        }
        if self.engine.default_ttl_hours < 0 {
            return Err("engine.default_ttl_hours must not be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(CortexMemoryConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_host_is_rejected() {
        let mut cfg = CortexMemoryConfig::default();
        cfg.storage.host = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overlap_equal_to_chunk_size_is_rejected() {
        let mut cfg = CortexMemoryConfig::default();
        cfg.engine.chunk_size = 100;
        cfg.engine.chunk_overlap = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn dedup_threshold_out_of_range_is_rejected() {
        let mut cfg = CortexMemoryConfig::default();
        cfg.engine.dedup_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = CortexMemoryConfig::from_toml("[storage]\nhost = \"vectors.internal\"\n")
            .expect("parses");
        assert_eq!(cfg.storage.host, "vectors.internal");
        assert_eq!(cfg.storage.collection, StorageConfig::default().collection);
    }
}
