use serde::{Deserialize, Serialize};

/// Vector database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
    pub use_tls: bool,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6333,
            collection: "agent_memories".to_string(),
            use_tls: false,
            read_timeout_secs: 10,
            write_timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}
