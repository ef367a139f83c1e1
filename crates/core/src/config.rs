use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `ADBOARD__` and TOML config files.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub pacer: PacerConfig,
    #[serde(default)]
    pub decisions: DecisionLogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Bounded internal retries for a wallet write that hits a
    /// serialization conflict before the error surfaces to the caller.
    #[serde(default = "default_max_debit_retries")]
    pub max_debit_retries: u32,
    #[serde(default = "default_low_balance_threshold_cents")]
    pub default_low_balance_threshold_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacerConfig {
    /// Interval for the periodic status sweep. Staleness between a budget
    /// crossing and the sweep observing it is bounded by this interval.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionLogConfig {
    #[serde(default = "default_decision_buffer_size")]
    pub buffer_size: usize,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_max_debit_retries() -> u32 {
    3
}
fn default_low_balance_threshold_cents() -> i64 {
    1_000
}
fn default_sweep_interval_secs() -> u64 {
    5
}
fn default_decision_buffer_size() -> usize {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_debit_retries: default_max_debit_retries(),
            default_low_balance_threshold_cents: default_low_balance_threshold_cents(),
        }
    }
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for DecisionLogConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_decision_buffer_size(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            ledger: LedgerConfig::default(),
            pacer: PacerConfig::default(),
            decisions: DecisionLogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ADBOARD")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.pacer.sweep_interval_secs, 5);
        assert_eq!(config.ledger.max_debit_retries, 3);
    }
}
