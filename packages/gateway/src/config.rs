use common::config::{DeliveryConfig, DownstreamConfig, UpstreamConfig};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "EDI_GATEWAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/config";

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Pause between cycles in continuous mode. Default: 60.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Operator HTTP boundary.
#[derive(Debug, Deserialize, Clone)]
pub struct OpsConfig {
    #[serde(default)]
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub downstream: DownstreamConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub ops: OpsConfig,
}

impl AppConfig {
    /// Load from defaults, then the config file, then `EDI_GATEWAY__*` variables.
    ///
    /// The file is `path` if given, else `$EDI_GATEWAY_CONFIG`, else
    /// `config/config.toml`; a missing file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let path = path
            .map(str::to_owned)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());

        let s = Config::builder()
            .set_default("database.url", "sqlite://edi-gateway.db?mode=rwc")?
            .set_default("ops.host", "127.0.0.1")?
            .set_default("ops.port", 8085)?
            .add_source(File::with_name(&path).required(false))
            // e.g. EDI_GATEWAY__DOWNSTREAM__URL, EDI_GATEWAY__UPSTREAM__DOC_TYPES=ORDER,INVOICE
            .add_source(
                Environment::with_prefix("EDI_GATEWAY")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("upstream.doc_types")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
