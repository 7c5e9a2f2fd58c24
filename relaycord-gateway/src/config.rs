//! Process configuration, loaded once from the environment at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("{0} is not a valid value for {1}")]
    Invalid(String, &'static str),
}

/// Everything the gateway binary needs to bootstrap, read once from the
/// environment and never reloaded for the life of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub scylla_hosts: Vec<String>,
    pub scylla_user: String,
    pub scylla_password: String,
    pub kafka_hosts: String,
    pub kafka_group_id: String,
    pub sentry_dsn: Option<String>,
}

impl Config {
    /// Load configuration from the environment, matching the original's
    /// `get_hosts()`-style comma-split host lists and falling back to port
    /// 6000 when `BIND_ADDR` is unset, matching the source's default
    /// gateway port.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:6000".to_string());

        let scylla_hosts = split_hosts(&require_env("SCYLLA_HOSTS")?);
        let scylla_user = require_env("SCYLLA_USER")?;
        let scylla_password = require_env("SCYLLA_PASSWORD")?;

        let kafka_hosts = require_env("KAFKA_HOSTS")?;
        let kafka_group_id =
            std::env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "relaycord-gateway".to_string());

        let sentry_dsn = std::env::var("SENTRY_DSN").ok();

        Ok(Config {
            bind_addr,
            scylla_hosts,
            scylla_user,
            scylla_password,
            kafka_hosts,
            kafka_group_id,
            sentry_dsn,
        })
    }
}

fn require_env(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn split_hosts(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_hosts_trims_and_drops_empties() {
        assert_eq!(
            split_hosts(" 10.0.0.1:9042, 10.0.0.2:9042 ,,10.0.0.3:9042"),
            vec!["10.0.0.1:9042", "10.0.0.2:9042", "10.0.0.3:9042"]
        );
    }

    #[test]
    fn split_hosts_single_value() {
        assert_eq!(split_hosts("localhost:9042"), vec!["localhost:9042"]);
    }
}
