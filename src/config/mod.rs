mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LoggingSettings, PartialBrokerSettings, PartialLoggingSettings,
    PartialSettings, Settings,
};

/// Environment variable prefix, e.g. `AGENTMQ_BROKER__SWEEP_INTERVAL_SECS=5`.
pub const ENV_PREFIX: &str = "AGENTMQ";

/// Loads the configuration from `config/default` (if present) and
/// `AGENTMQ_*` environment variables, merged over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] with an explicit base file path (extension optional).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available, then merge with defaults
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = partial.merge_into(Settings::default());

    if settings.broker.sweep_interval_secs == 0 {
        return Err(ConfigError::Message(
            "broker.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    if settings
        .broker
        .default_ttl_secs
        .is_some_and(|ttl| !ttl.is_finite() || ttl <= 0.0)
    {
        return Err(ConfigError::Message(
            "broker.default_ttl_secs must be a positive number of seconds".to_string(),
        ));
    }
    if settings.broker.latency_window == 0 {
        return Err(ConfigError::Message(
            "broker.latency_window must be greater than zero".to_string(),
        ));
    }

    Ok(settings)
}

#[cfg(test)]
mod tests;
