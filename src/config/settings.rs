use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the broker.
///
/// Controls expiration sweeping, default message time-to-live,
/// backpressure and latency tracking.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    /// Seconds between expiration sweeps.
    pub sweep_interval_secs: u64,
    /// TTL applied to messages published without one. `None` means never expire.
    pub default_ttl_secs: Option<f64>,
    /// Upper bound on pending records per subscriber. `None` disables backpressure.
    pub max_pending_per_subscriber: Option<usize>,
    /// Number of latency samples kept in the rolling window.
    pub latency_window: usize,
    /// Publish latency budget, reported by the CLI.
    pub latency_budget_ms: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub sweep_interval_secs: Option<u64>,
    pub default_ttl_secs: Option<f64>,
    pub max_pending_per_subscriber: Option<usize>,
    pub latency_window: Option<usize>,
    pub latency_budget_ms: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10,
            default_ttl_secs: None,
            max_pending_per_subscriber: None,
            latency_window: 1000,
            latency_budget_ms: 100.0,
        }
    }
}

impl PartialSettings {
    /// Overlay the values that were provided onto `base`.
    pub fn merge_into(self, base: Settings) -> Settings {
        let broker = self.broker.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            broker: BrokerSettings {
                sweep_interval_secs: broker
                    .sweep_interval_secs
                    .unwrap_or(base.broker.sweep_interval_secs),
                default_ttl_secs: broker.default_ttl_secs.or(base.broker.default_ttl_secs),
                max_pending_per_subscriber: broker
                    .max_pending_per_subscriber
                    .or(base.broker.max_pending_per_subscriber),
                latency_window: broker
                    .latency_window
                    .unwrap_or(base.broker.latency_window),
                latency_budget_ms: broker
                    .latency_budget_ms
                    .unwrap_or(base.broker.latency_budget_ms),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(base.logging.level),
            },
        }
    }
}
