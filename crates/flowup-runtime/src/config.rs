//! Runtime configuration
//!
//! Loaded from JSON or from `FLOWUP_*` environment variables. Durations are
//! written in humantime form (`"250ms"`, `"1s"`, `"15m"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use flowup_core::{
    FlowError, FlowResult, PeerConfig, PeerId, StrategyKind, DEFAULT_TICK_INTERVAL,
    DEFAULT_TICK_TIMEOUT,
};

pub const ENV_STRATEGY: &str = "FLOWUP_STRATEGY";
pub const ENV_TICK_INTERVAL: &str = "FLOWUP_TICK_INTERVAL";
pub const ENV_TICK_TIMEOUT: &str = "FLOWUP_TICK_TIMEOUT";
pub const ENV_WATCH_INTERVAL: &str = "FLOWUP_WATCH_INTERVAL";
pub const ENV_RUN_UNTIL: &str = "FLOWUP_RUN_UNTIL";
pub const ENV_VIRTUAL_TIME: &str = "FLOWUP_VIRTUAL_TIME";
pub const ENV_LOG: &str = "FLOWUP_LOG";
pub const ENV_LOG_JSON: &str = "FLOWUP_LOG_JSON";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info,flowup_peer=debug"`
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub strategy: StrategyKind,
    #[serde(with = "duration_str")]
    pub tick_interval: Duration,
    pub tick_timeout: u32,
    #[serde(with = "duration_str")]
    pub watch_interval: Duration,
    /// Horizon after which the watcher stops and the deployment shuts down
    #[serde(with = "duration_str")]
    pub run_until: Duration,
    /// Drive the runtime on paused tokio time
    pub virtual_time: bool,
    pub log: LoggingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            strategy: StrategyKind::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            tick_timeout: DEFAULT_TICK_TIMEOUT,
            watch_interval: Duration::from_secs(10),
            run_until: Duration::from_secs(1000),
            virtual_time: false,
            log: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> FlowResult<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(json).map_err(|e| FlowError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by whichever `FLOWUP_*` variables are set
    pub fn from_env() -> FlowResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FlowResult<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(v) = lookup(ENV_STRATEGY) {
            config.strategy = v.parse()?;
        }
        if let Some(v) = lookup(ENV_TICK_INTERVAL) {
            config.tick_interval = parse_duration(ENV_TICK_INTERVAL, &v)?;
        }
        if let Some(v) = lookup(ENV_TICK_TIMEOUT) {
            config.tick_timeout = v.trim().parse().map_err(|e| {
                FlowError::InvalidConfig(format!("{ENV_TICK_TIMEOUT}={v}: {e}"))
            })?;
        }
        if let Some(v) = lookup(ENV_WATCH_INTERVAL) {
            config.watch_interval = parse_duration(ENV_WATCH_INTERVAL, &v)?;
        }
        if let Some(v) = lookup(ENV_RUN_UNTIL) {
            config.run_until = parse_duration(ENV_RUN_UNTIL, &v)?;
        }
        if let Some(v) = lookup(ENV_VIRTUAL_TIME) {
            config.virtual_time = parse_flag(ENV_VIRTUAL_TIME, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG) {
            config.log.filter = v;
        }
        if let Some(v) = lookup(ENV_LOG_JSON) {
            config.log.json = parse_flag(ENV_LOG_JSON, &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FlowResult<()> {
        if self.watch_interval.is_zero() {
            return Err(FlowError::InvalidConfig(
                "watch_interval must be non-zero".to_string(),
            ));
        }
        // tick fields are checked by PeerConfig
        self.peer_config(0.0, Vec::new()).validate()
    }

    /// Peer config sharing this runtime's scheduling parameters
    pub fn peer_config(&self, value: f64, neighbors: Vec<PeerId>) -> PeerConfig {
        PeerConfig {
            value,
            neighbors,
            strategy: self.strategy,
            tick_interval: self.tick_interval,
            tick_timeout: self.tick_timeout,
        }
    }
}

fn parse_duration(key: &str, value: &str) -> FlowResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| FlowError::InvalidConfig(format!("{key}={value}: {e}")))
}

fn parse_flag(key: &str, value: &str) -> FlowResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(FlowError::InvalidConfig(format!(
            "{key}={value}: expected a boolean"
        ))),
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.tick_timeout, 50);
        assert_eq!(config.watch_interval, Duration::from_secs(10));
        assert_eq!(config.run_until, Duration::from_secs(1000));
    }

    #[test]
    fn test_env_overrides() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (ENV_STRATEGY, "pairwise"),
            (ENV_TICK_INTERVAL, "250ms"),
            (ENV_TICK_TIMEOUT, "8"),
            (ENV_RUN_UNTIL, "2m"),
            (ENV_VIRTUAL_TIME, "yes"),
            (ENV_LOG, "debug"),
        ]))
        .unwrap();

        assert_eq!(config.strategy, StrategyKind::Pairwise);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.tick_timeout, 8);
        assert_eq!(config.run_until, Duration::from_secs(120));
        assert!(config.virtual_time);
        assert_eq!(config.log.filter, "debug");

        let peer = config.peer_config(3.0, vec![PeerId::new(1)]);
        assert_eq!(peer.staleness(), Duration::from_secs(2));
    }

    #[test]
    fn test_env_rejects_garbage() {
        assert!(RuntimeConfig::from_lookup(lookup(&[(ENV_TICK_INTERVAL, "soon")])).is_err());
        assert!(RuntimeConfig::from_lookup(lookup(&[(ENV_TICK_TIMEOUT, "0")])).is_err());
        assert!(RuntimeConfig::from_lookup(lookup(&[(ENV_VIRTUAL_TIME, "maybe")])).is_err());
        assert!(matches!(
            RuntimeConfig::from_lookup(lookup(&[(ENV_STRATEGY, "flood")])),
            Err(FlowError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_json_with_humantime_durations() {
        let config = RuntimeConfig::from_json(
            r#"{"strategy": "pairwise", "tick_interval": "500ms", "log": {"json": true}}"#,
        )
        .unwrap();

        assert_eq!(config.strategy, StrategyKind::Pairwise);
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.tick_timeout, DEFAULT_TICK_TIMEOUT);
        assert!(config.log.json);
        assert_eq!(config.log.filter, "info");

        let back = RuntimeConfig::from_json(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
