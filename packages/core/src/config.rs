use std::env;
use std::time::Duration;

use crate::cli::Cli;
use crate::scheduler::SchedulerConfig;

const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_OVERDUE_INTERVAL_SECONDS: u64 = 300;
const DEFAULT_CALIBRATION_INTERVAL_SECONDS: u64 = 3600;
const DEFAULT_EDGE_NODE: &str = "EDGE-001";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_port: u16,
    pub overdue_interval_seconds: u64,
    pub calibration_interval_seconds: u64,
    /// Node id recorded on custody events that do not name their origin.
    pub default_edge_node: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let database_url = lookup("DATABASE_URL").ok_or("DATABASE_URL is required")?;

        let api_port = parse_or(&lookup, "API_PORT", DEFAULT_API_PORT)?;
        let overdue_interval_seconds = parse_or(
            &lookup,
            "OVERDUE_CHECK_INTERVAL_SECONDS",
            DEFAULT_OVERDUE_INTERVAL_SECONDS,
        )?;
        let calibration_interval_seconds = parse_or(
            &lookup,
            "CALIBRATION_CHECK_INTERVAL_SECONDS",
            DEFAULT_CALIBRATION_INTERVAL_SECONDS,
        )?;
        let default_edge_node =
            lookup("DEFAULT_EDGE_NODE").unwrap_or_else(|| DEFAULT_EDGE_NODE.to_string());

        let config = Self {
            database_url,
            api_port,
            overdue_interval_seconds,
            calibration_interval_seconds,
            default_edge_node,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_cli(mut self, cli: &Cli) -> Result<Self, String> {
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(port) = cli.port {
            self.api_port = port;
        }
        if let Some(seconds) = cli.overdue_interval {
            self.overdue_interval_seconds = seconds;
        }
        if let Some(seconds) = cli.calibration_interval {
            self.calibration_interval_seconds = seconds;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            overdue_interval: Duration::from_secs(self.overdue_interval_seconds),
            calibration_interval: Duration::from_secs(self.calibration_interval_seconds),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.overdue_interval_seconds == 0 {
            return Err("OVERDUE_CHECK_INTERVAL_SECONDS must be greater than zero".into());
        }
        if self.calibration_interval_seconds == 0 {
            return Err("CALIBRATION_CHECK_INTERVAL_SECONDS must be greater than zero".into());
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, String> {
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.overdue_interval_seconds, 300);
        assert_eq!(config.calibration_interval_seconds, 3600);
        assert_eq!(config.default_edge_node, "EDGE-001");
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, "DATABASE_URL is required");
    }

    #[test]
    fn bad_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("API_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert_eq!(err, "API_PORT must be a valid number");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("OVERDUE_CHECK_INTERVAL_SECONDS", "0"),
        ]))
        .unwrap_err();
        assert!(err.starts_with("OVERDUE_CHECK_INTERVAL_SECONDS"));
    }

    #[test]
    fn cli_flags_override_environment() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite://env.db")])).unwrap();
        let cli = Cli {
            database_url: Some("sqlite://cli.db".into()),
            port: Some(9090),
            overdue_interval: Some(60),
            calibration_interval: None,
        };
        let config = config.with_cli(&cli).unwrap();
        assert_eq!(config.database_url, "sqlite://cli.db");
        assert_eq!(config.api_port, 9090);
        assert_eq!(config.scheduler().overdue_interval, Duration::from_secs(60));
        assert_eq!(config.scheduler().calibration_interval, Duration::from_secs(3600));
    }
}
