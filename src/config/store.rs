use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the bearer token is persisted between runs:
/// - key: the entry name holding the token.
/// - backend: the actual store backend, selected by a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StoreConfig {
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(flatten)]
    pub backend: StoreBackend,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            backend: StoreBackend::Memory,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum StoreBackend {
    /// Process-local, lost on exit.
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "file")]
    File(FileStoreConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct FileStoreConfig {
    pub path: String,
}

fn default_key() -> String {
    "accessToken".to_string()
}
