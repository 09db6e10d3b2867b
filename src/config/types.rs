use serde::Deserialize;

/// Main configuration structure for Wikiharvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub harvester: HarvesterConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "seed")]
    pub seeds: Vec<SeedEntry>,
}

/// Remote API endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the api.php endpoint
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum items the server returns per call
    #[serde(rename = "result-limit", default = "default_result_limit")]
    pub result_limit: u32,

    /// Maximum item identifiers packed into one batched call
    #[serde(rename = "request-limit", default = "default_request_limit")]
    pub request_limit: u32,
}

/// Harvester behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Maximum number of concurrent network fetches
    #[serde(rename = "max-connections", default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the harvest is written into; must not already exist
    #[serde(rename = "target-dir")]
    pub target_dir: String,
}

/// One seed page to start the harvest from
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    /// Page title
    pub title: String,

    /// Optional pinned revision id; the latest revision is used when absent
    #[serde(default)]
    pub revision: Option<u64>,
}

fn default_result_limit() -> u32 {
    500
}

fn default_request_limit() -> u32 {
    20
}

fn default_max_connections() -> u32 {
    5
}
