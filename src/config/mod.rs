use crate::content::{Facade, FacadeDirectory, FacadeId, PublishPolicy};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Complete facade-sync configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacadeSyncConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub facades: Vec<Facade>,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Per-connection limits
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Descriptors that may wait for a slow display before it is dropped
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// How often the server pings an attached display
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Silence longer than this closes the session
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

fn default_outbound_queue_capacity() -> usize {
    64
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    30_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_outbound_queue_capacity(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

/// Publish-side configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishConfig {
    #[serde(flatten)]
    pub policy: PublishPolicy,
    /// Bearer token required by the publish endpoint. None = open (dev mode).
    #[serde(default)]
    pub publish_token: Option<String>,
}

/// Settings for the `facade-display` client
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Base WebSocket URL of the sync server, e.g. `ws://localhost:8080`
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_facade_id")]
    pub facade_id: FacadeId,
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// No frame at all (content or ping) for this long = dead link
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,
    /// Interval of the system tick that retries blocked playback
    #[serde(default = "default_playback_retry_ms")]
    pub playback_retry_ms: u64,
    /// Position drift tolerated before the reconciler re-seeks
    #[serde(default = "default_seek_tolerance_ms")]
    pub seek_tolerance_ms: u64,
}

fn default_server_url() -> String {
    "ws://localhost:8080".to_string()
}

fn default_facade_id() -> FacadeId {
    FacadeId(1)
}

fn default_reconnect_initial_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_silence_timeout_ms() -> u64 {
    45_000
}

fn default_playback_retry_ms() -> u64 {
    5_000
}

fn default_seek_tolerance_ms() -> u64 {
    500
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            facade_id: default_facade_id(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            silence_timeout_ms: default_silence_timeout_ms(),
            playback_retry_ms: default_playback_retry_ms(),
            seek_tolerance_ms: default_seek_tolerance_ms(),
        }
    }
}

impl DisplayConfig {
    /// Full endpoint for this display's facade
    pub fn facade_url(&self) -> String {
        format!(
            "{}/ws/facade/{}",
            self.server_url.trim_end_matches('/'),
            self.facade_id
        )
    }
}

impl FacadeSyncConfig {
    /// Facade directory built from the `[[facades]]` entries
    pub fn directory(&self) -> FacadeDirectory {
        FacadeDirectory::new(self.facades.iter().cloned())
    }

    /// Apply environment overrides, falling back to file/default values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (environment variable name → value).
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("FACADE_SYNC_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("FACADE_SYNC_PUBLISH_TOKEN") {
            if !v.is_empty() {
                self.publish.publish_token = Some(v);
            }
        }
        if let Some(v) = lookup("FACADE_SYNC_URL") {
            self.display.server_url = v;
        }
        if let Some(v) = lookup("FACADE_ID") {
            self.display.facade_id = v.parse::<FacadeId>().map_err(|e| {
                ConfigError::Invalid(format!("FACADE_ID '{v}' is not a facade id: {e}"))
            })?;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "session.outbound_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.session.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "session.heartbeat_interval_ms must be positive".to_string(),
            ));
        }
        if self.session.heartbeat_timeout_ms <= self.session.heartbeat_interval_ms {
            return Err(ConfigError::Invalid(
                "session.heartbeat_timeout_ms must exceed session.heartbeat_interval_ms".to_string(),
            ));
        }
        if self.publish.policy.max_future_skew_ms < 0 {
            return Err(ConfigError::Invalid(
                "publish.max_future_skew_ms must not be negative".to_string(),
            ));
        }
        if self.display.reconnect_initial_ms == 0
            || self.display.reconnect_max_ms < self.display.reconnect_initial_ms
        {
            return Err(ConfigError::Invalid(
                "display.reconnect_initial_ms must be positive and not exceed reconnect_max_ms"
                    .to_string(),
            ));
        }
        if self.display.playback_retry_ms == 0 || self.display.silence_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "display timers must be positive".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for facade in &self.facades {
            if !seen.insert(facade.id) {
                return Err(ConfigError::Invalid(format!(
                    "facade {} is listed more than once",
                    facade.id
                )));
            }
        }

        Ok(())
    }
}

/// Load configuration from a TOML file and validate it
pub fn load_config(path: impl AsRef<Path>) -> Result<FacadeSyncConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: FacadeSyncConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load from `FACADE_SYNC_CONFIG` if set (defaults otherwise), then apply
/// environment overrides.
pub fn load_from_env() -> Result<FacadeSyncConfig, ConfigError> {
    let mut config = match std::env::var("FACADE_SYNC_CONFIG") {
        Ok(path) => load_config(path)?,
        Err(_) => FacadeSyncConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FutureAnchorPolicy;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FacadeSyncConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.session.outbound_queue_capacity, 64);
        assert_eq!(config.session.heartbeat_interval_ms, 10_000);
        assert_eq!(config.publish.policy.max_future_skew_ms, 2_000);
        assert_eq!(
            config.publish.policy.future_anchor_policy,
            FutureAnchorPolicy::Reject
        );
        assert!(config.publish.publish_token.is_none());
        assert!(config.directory().is_open());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind = "127.0.0.1:9000"

            [session]
            outbound_queue_capacity = 8
            heartbeat_interval_ms = 2000
            heartbeat_timeout_ms = 5000

            [publish]
            max_future_skew_ms = 500
            future_anchor_policy = "clamp"
            publish_token = "s3cret"

            [[facades]]
            id = 7
            name = "Arbat 1"
            rows = 4
            columns = 8
            width_px = 1920
            height_px = 1080

            [display]
            server_url = "ws://sync.local:9000"
            facade_id = 7
        "#;

        let config: FacadeSyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.session.outbound_queue_capacity, 8);
        assert_eq!(config.session.heartbeat_timeout(), Duration::from_secs(5));
        assert_eq!(config.publish.policy.max_future_skew_ms, 500);
        assert_eq!(
            config.publish.policy.future_anchor_policy,
            FutureAnchorPolicy::Clamp
        );
        assert_eq!(config.publish.publish_token.as_deref(), Some("s3cret"));
        assert_eq!(config.facades.len(), 1);
        assert_eq!(config.facades[0].width_px, 1920);
        assert_eq!(config.display.facade_url(), "ws://sync.local:9000/ws/facade/7");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [session]
            outbound_queue_capacity = 3
        "#;

        let config: FacadeSyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.session.outbound_queue_capacity, 3);
        assert_eq!(config.session.heartbeat_timeout_ms, 30_000); // Default
        assert_eq!(config.publish.policy.max_source_len, 2_048); // Default
        assert_eq!(config.display.seek_tolerance_ms, 500); // Default
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let mut config = FacadeSyncConfig::default();
        config.session.outbound_queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_timeout_must_exceed_interval() {
        let mut config = FacadeSyncConfig::default();
        config.session.heartbeat_timeout_ms = config.session.heartbeat_interval_ms;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_facades_rejected() {
        let toml = r#"
            [[facades]]
            id = 1
            [[facades]]
            id = 1
        "#;
        let config: FacadeSyncConfig = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_overrides_applied() {
        let mut config = FacadeSyncConfig::default();
        config
            .apply_overrides(|key| match key {
                "FACADE_SYNC_BIND" => Some("127.0.0.1:9100".to_string()),
                "FACADE_ID" => Some(" 12 ".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:9100");
        assert_eq!(config.display.facade_id, FacadeId(12));
        assert!(config.publish.publish_token.is_none());
    }

    #[test]
    fn test_unparsable_facade_id_rejected() {
        let mut config = FacadeSyncConfig::default();
        let result = config.apply_overrides(|key| match key {
            "FACADE_ID" => Some("north-wall".to_string()),
            _ => None,
        });

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert_eq!(config.display.facade_id, FacadeId(1));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind = \"127.0.0.1:7070\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7070");
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\noutbound_queue_capacity = \"many\"").unwrap();

        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
