use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the session (token set and pending login) is kept between boots.
/// We differentiate the backends via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// Process memory only; the session ends with the process.
    #[serde(rename = "memory")]
    Memory,
    /// A JSON file, so a login started in one run can complete in the next.
    #[serde(rename = "file")]
    File(FileStoreConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct FileStoreConfig {
    pub path: String,
}
