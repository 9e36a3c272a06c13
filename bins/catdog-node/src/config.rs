//! Configuration types for the CATDOG bootnode.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use catdog_bridge::Placement;
use catdog_discovery::{Netlist, ProtocolVersion, RESP_TIMEOUT, REVALIDATE_INTERVAL};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading or writing configuration file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing TOML configuration file.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration validation failed.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration for the CATDOG bootnode.
///
/// Configuration precedence (highest to lowest):
/// 1. Command line flags
/// 2. Environment variables
/// 3. Config file values
/// 4. Default values
///
/// # Example
///
/// ```
/// use catdog_node::config::NodeConfig;
///
/// let config = NodeConfig::default();
/// assert_eq!(config.node.api_addr, "0.0.0.0:8000");
/// assert_eq!(config.log.level, "debug");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Listen addresses.
    pub node: NodeSettings,
    /// Content of both local records.
    pub record: RecordSettings,
    /// The v5.0 engine.
    pub v50: ProtocolSettings,
    /// The v5.1 engine.
    pub v51: ProtocolSettings,
    /// Engine and bridge tuning.
    pub discovery: DiscoverySettings,
    pub log: LogSettings,
}

impl NodeConfig {
    /// Load configuration from environment variables only.
    ///
    /// Starts with default values and applies environment variable overrides.
    pub fn from_env() -> Result<Self> {
        tracing::debug!("Loading configuration from environment variables");
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate().map_err(|e| {
            tracing::error!(error = %e, "Configuration validation failed");
            e
        })?;
        tracing::info!("Successfully loaded configuration from environment");
        Ok(config)
    }

    /// Load configuration from a TOML file, creating it with defaults if it doesn't exist.
    ///
    /// Environment variables are applied as overrides. A newly created file
    /// holds the defaults only, never values taken from the environment.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading or creating configuration");

        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::info!(path = %path.display(), "Configuration file doesn't exist, creating with defaults");
            let config = Self::default();
            config.save(path)?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading configuration from file");

        let contents = std::fs::read_to_string(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to read configuration file");
            ConfigError::IoError(e)
        })?;

        let config: Self = toml::from_str(&contents).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to parse TOML configuration");
            ConfigError::ParseError(e)
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "Saving configuration to file");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            ConfigError::ValidationError(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(path, contents)?;

        tracing::info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Default location of the configuration file, `~/.catdog/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".catdog").join("config.toml"))
    }

    /// Settings of one protocol version's engine.
    pub fn protocol(&self, version: ProtocolVersion) -> &ProtocolSettings {
        match version {
            ProtocolVersion::V50 => &self.v50,
            ProtocolVersion::V51 => &self.v51,
        }
    }

    pub fn protocol_mut(&mut self, version: ProtocolVersion) -> &mut ProtocolSettings {
        match version {
            ProtocolVersion::V50 => &mut self.v50,
            ProtocolVersion::V51 => &mut self.v51,
        }
    }

    /// HTTP API address, or `None` when the API is disabled.
    ///
    /// Call after [`NodeConfig::validate`].
    pub fn api_addr(&self) -> Option<SocketAddr> {
        if self.node.api_addr.is_empty() {
            return None;
        }
        self.node.api_addr.parse().ok()
    }

    /// UDP address the `version` engine listens on.
    ///
    /// Falls back to the record's UDP port when no listen port is set.
    pub fn listen_addr(&self, version: ProtocolVersion) -> Result<SocketAddr> {
        let ip: IpAddr = self.node.listen_ip.parse().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid listen IP '{}': {}",
                self.node.listen_ip, e
            ))
        })?;
        let settings = self.protocol(version);
        let port = if settings.listen_udp == 0 {
            settings.enr_udp
        } else {
            settings.listen_udp
        };
        Ok(SocketAddr::new(ip, port))
    }

    /// Static IP for both records, if configured.
    pub fn enr_ip(&self) -> Result<Option<IpAddr>> {
        if self.record.enr_ip.is_empty() {
            return Ok(None);
        }
        self.record.enr_ip.parse().map(Some).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid ENR IP '{}': {}", self.record.enr_ip, e))
        })
    }

    /// Parsed fork version of the `eth2` entry.
    pub fn fork_version(&self) -> Result<[u8; 4]> {
        let value = &self.record.fork_version;
        hex::decode(value)
            .ok()
            .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "Invalid fork version '{}': expected 4 hex-encoded bytes",
                    value
                ))
            })
    }

    /// Parsed network restriction, if configured.
    pub fn net_restrict(&self) -> Result<Option<Netlist>> {
        if self.discovery.net_restrict.is_empty() {
            return Ok(None);
        }
        Netlist::parse(&self.discovery.net_restrict)
            .map(Some)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    pub fn resp_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery.resp_timeout_ms)
    }

    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_millis(self.discovery.revalidate_interval_ms)
    }

    /// Validate configuration values.
    ///
    /// Checks:
    /// - API address is empty or a socket address
    /// - listen and ENR IPs are IP addresses
    /// - record entries are hex
    /// - the network restriction parses
    /// - the response timeout is non-zero and shorter than the revalidation interval
    /// - the log level is known
    ///
    /// Private keys and bootnodes are checked when the identities are built.
    pub fn validate(&self) -> Result<()> {
        tracing::debug!("Validating configuration");

        if !self.node.api_addr.is_empty() {
            self.node.api_addr.parse::<SocketAddr>().map_err(|e| {
                ConfigError::ValidationError(format!(
                    "Invalid API address '{}': {}",
                    self.node.api_addr, e
                ))
            })?;
        }

        self.listen_addr(ProtocolVersion::V50)?;
        self.enr_ip()?;

        for (name, value) in [("attnets", &self.record.attnets), ("eth2", &self.record.eth2)] {
            hex::decode(value).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid {} entry '{}': {}", name, value, e))
            })?;
        }

        self.fork_version()?;
        self.net_restrict()?;

        if self.discovery.resp_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Response timeout must be non-zero".to_string(),
            ));
        }
        if self.discovery.revalidate_interval_ms <= self.discovery.resp_timeout_ms {
            return Err(ConfigError::ValidationError(format!(
                "Revalidation interval ({} ms) must be greater than the response timeout ({} ms)",
                self.discovery.revalidate_interval_ms, self.discovery.resp_timeout_ms
            )));
        }

        self.log.level.parse::<LevelFilter>().map_err(|_| {
            ConfigError::ValidationError(format!("Unknown log level '{}'", self.log.level))
        })?;

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Apply environment variable overrides to configuration.
    ///
    /// Supported environment variables:
    /// - `CATDOG_API_ADDR` - Overrides node.api_addr (empty disables the API)
    /// - `CATDOG_LISTEN_IP` - Overrides node.listen_ip
    /// - `CATDOG_ENR_IP` - Overrides record.enr_ip
    /// - `CATDOG_PRIV_V50`, `CATDOG_PRIV_V51` - Override the private keys
    /// - `CATDOG_ENR_UDP_V50`, `CATDOG_ENR_UDP_V51` - Override the record ports
    /// - `CATDOG_LISTEN_UDP_V50`, `CATDOG_LISTEN_UDP_V51` - Override the listen ports
    /// - `CATDOG_BOOTNODES_V50`, `CATDOG_BOOTNODES_V51` - Comma-separated bootnode records
    /// - `CATDOG_NET_RESTRICT` - Overrides discovery.net_restrict
    /// - `CATDOG_LOG_LEVEL` - Overrides log.level
    ///
    /// Invalid port values are logged as warnings and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_var("CATDOG_API_ADDR") {
            self.node.api_addr = value;
        }
        if let Some(value) = env_var("CATDOG_LISTEN_IP") {
            self.node.listen_ip = value;
        }
        if let Some(value) = env_var("CATDOG_ENR_IP") {
            self.record.enr_ip = value;
        }

        for version in [ProtocolVersion::V50, ProtocolVersion::V51] {
            let suffix = match version {
                ProtocolVersion::V50 => "V50",
                ProtocolVersion::V51 => "V51",
            };
            let settings = self.protocol_mut(version);

            if let Some(value) = env_var(&format!("CATDOG_PRIV_{}", suffix)) {
                settings.priv_key = value;
            }
            if let Some(port) = env_port(&format!("CATDOG_ENR_UDP_{}", suffix)) {
                settings.enr_udp = port;
            }
            if let Some(port) = env_port(&format!("CATDOG_LISTEN_UDP_{}", suffix)) {
                settings.listen_udp = port;
            }
            if let Some(value) = env_var(&format!("CATDOG_BOOTNODES_{}", suffix)) {
                settings.bootnodes = split_list(&value);
            }
        }

        if let Some(value) = env_var("CATDOG_NET_RESTRICT") {
            self.discovery.net_restrict = value;
        }
        if let Some(value) = env_var("CATDOG_LOG_LEVEL") {
            self.log.level = value;
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    if name.starts_with("CATDOG_PRIV_") {
        tracing::debug!(env_var = name, "Applying environment override");
    } else {
        tracing::debug!(env_var = name, value = %value, "Applying environment override");
    }
    Some(value)
}

fn env_port(name: &str) -> Option<u16> {
    let value = std::env::var(name).ok()?;
    match value.parse::<u16>() {
        Ok(port) => {
            tracing::debug!(env_var = name, value = port, "Applying environment override");
            Some(port)
        }
        Err(e) => {
            tracing::warn!(
                env_var = name,
                value = %value,
                error = %e,
                "Invalid port number in environment variable, ignoring"
            );
            None
        }
    }
}

/// Split a comma-separated list, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Listen and API addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Address to bind the HTTP API to. The API is disabled if empty.
    ///
    /// Environment variable: `CATDOG_API_ADDR`
    pub api_addr: String,
    /// IP both UDP sockets bind to.
    ///
    /// Environment variable: `CATDOG_LISTEN_IP`
    pub listen_ip: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            api_addr: "0.0.0.0:8000".to_string(),
            listen_ip: "0.0.0.0".to_string(),
        }
    }
}

/// Entries advertised in both local records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSettings {
    /// IP to put in the records. Unset if empty.
    ///
    /// Environment variable: `CATDOG_ENR_IP`
    pub enr_ip: String,
    /// Attestation subnet bitfield, hex encoded.
    pub attnets: String,
    /// Fork version the `eth2` entry is built from, 4 bytes hex encoded.
    pub fork_version: String,
    /// Raw `eth2` entry, hex encoded. Replaces the one derived from
    /// `fork_version` if set.
    pub eth2: String,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            enr_ip: String::new(),
            attnets: "0000000000000000".to_string(),
            fork_version: "00000000".to_string(),
            eth2: String::new(),
        }
    }
}

/// Identity and sockets of one engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// secp256k1 private key, raw hex.
    pub priv_key: String,
    /// UDP port to put in the record. Unset if zero.
    pub enr_udp: u16,
    /// UDP port to listen on. Falls back to `enr_udp` if zero.
    pub listen_udp: u16,
    /// Bootnode records in `enr:` text form.
    pub bootnodes: Vec<String>,
}

/// Engine and bridge tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Comma-separated CIDR allow-list. No restriction if empty.
    ///
    /// Environment variable: `CATDOG_NET_RESTRICT`
    pub net_restrict: String,
    /// Where propagated peers land in the other engine's table.
    pub placement: Placement,
    pub resp_timeout_ms: u64,
    pub revalidate_interval_ms: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            net_restrict: String::new(),
            placement: Placement::Default,
            resp_timeout_ms: RESP_TIMEOUT.as_millis() as u64,
            revalidate_interval_ms: REVALIDATE_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Level filter used when `RUST_LOG` is unset.
    ///
    /// Environment variable: `CATDOG_LOG_LEVEL`
    pub level: String,
    /// Log with colors.
    pub color: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            color: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;

    const ENV_VARS: [&str; 14] = [
        "CATDOG_API_ADDR",
        "CATDOG_LISTEN_IP",
        "CATDOG_ENR_IP",
        "CATDOG_PRIV_V50",
        "CATDOG_PRIV_V51",
        "CATDOG_ENR_UDP_V50",
        "CATDOG_ENR_UDP_V51",
        "CATDOG_LISTEN_UDP_V50",
        "CATDOG_LISTEN_UDP_V51",
        "CATDOG_BOOTNODES_V50",
        "CATDOG_BOOTNODES_V51",
        "CATDOG_NET_RESTRICT",
        "CATDOG_LOG_LEVEL",
        "CATDOG_CONFIG",
    ];

    fn without_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars(ENV_VARS.map(|name| (name, None::<&str>)), f)
    }

    #[test]
    fn test_default_values() {
        let config = NodeConfig::default();

        assert_eq!(config.node.api_addr, "0.0.0.0:8000");
        assert_eq!(config.node.listen_ip, "0.0.0.0");
        assert_eq!(config.record.attnets, "0000000000000000");
        assert_eq!(config.record.fork_version, "00000000");
        assert_eq!(config.fork_version().unwrap(), [0u8; 4]);
        assert!(config.record.eth2.is_empty());
        assert_eq!(config.discovery.placement, Placement::Default);
        assert_eq!(config.resp_timeout(), RESP_TIMEOUT);
        assert_eq!(config.revalidate_interval(), REVALIDATE_INTERVAL);
        assert_eq!(config.log.level, "debug");
        assert!(config.log.color);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            [v50]
            enr_udp = 9000

            [discovery]
            placement = "front"
            "#,
        )
        .unwrap();

        assert_eq!(config.v50.enr_udp, 9000);
        assert_eq!(config.v51.enr_udp, 0);
        assert_eq!(config.discovery.placement, Placement::Front);
        assert_eq!(config.node.api_addr, "0.0.0.0:8000");
    }

    #[test]
    #[serial]
    fn test_load_or_create_missing_file() {
        without_env(|| {
            let temp_dir = tempfile::tempdir().unwrap();
            let config_path = temp_dir.path().join("nested").join("config.toml");
            assert!(!config_path.exists());

            let config = NodeConfig::load_or_create(&config_path).unwrap();

            assert!(config_path.exists());
            assert_eq!(config.node.api_addr, "0.0.0.0:8000");
        });
    }

    #[test]
    #[serial]
    fn test_created_file_excludes_env_keys() {
        temp_env::with_var("CATDOG_PRIV_V50", Some("ab".repeat(32)), || {
            let temp_dir = tempfile::tempdir().unwrap();
            let config_path = temp_dir.path().join("config.toml");

            let config = NodeConfig::load_or_create(&config_path).unwrap();
            assert_eq!(config.v50.priv_key, "ab".repeat(32));

            let saved = NodeConfig::load(&config_path).unwrap();
            assert!(saved.v50.priv_key.is_empty());
        });
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = NodeConfig::load(&temp_dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_load_malformed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[node\napi_addr = ").unwrap();

        assert!(matches!(
            NodeConfig::load(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = NodeConfig::default();
        config.v51.listen_udp = 9001;
        config.v51.bootnodes = vec!["enr:abc".to_string()];
        config.discovery.placement = Placement::Front;
        config.save(&config_path).unwrap();

        let loaded = NodeConfig::load(&config_path).unwrap();
        assert_eq!(loaded.v51.listen_udp, 9001);
        assert_eq!(loaded.v51.bootnodes, vec!["enr:abc".to_string()]);
        assert_eq!(loaded.discovery.placement, Placement::Front);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("CATDOG_API_ADDR", Some("127.0.0.1:9999")),
                ("CATDOG_ENR_IP", Some("10.0.0.1")),
                ("CATDOG_ENR_UDP_V50", Some("9000")),
                ("CATDOG_LISTEN_UDP_V51", Some("9101")),
                ("CATDOG_BOOTNODES_V51", Some("enr:a, enr:b,")),
                ("CATDOG_NET_RESTRICT", Some("10.0.0.0/8")),
                ("CATDOG_LOG_LEVEL", Some("info")),
            ],
            || {
                let config = NodeConfig::from_env().unwrap();

                assert_eq!(config.node.api_addr, "127.0.0.1:9999");
                assert_eq!(config.record.enr_ip, "10.0.0.1");
                assert_eq!(config.v50.enr_udp, 9000);
                assert_eq!(config.v51.listen_udp, 9101);
                assert_eq!(config.v51.bootnodes, vec!["enr:a", "enr:b"]);
                assert!(config.v50.bootnodes.is_empty());
                assert_eq!(config.net_restrict().unwrap().unwrap().len(), 1);
                assert_eq!(config.log.level, "info");
            },
        );
    }

    #[test]
    #[serial]
    fn test_invalid_env_port_is_ignored() {
        temp_env::with_var("CATDOG_ENR_UDP_V50", Some("not-a-port"), || {
            let config = NodeConfig::from_env().unwrap();
            assert_eq!(config.v50.enr_udp, 0);
        });
    }

    #[test]
    #[serial]
    fn test_empty_api_addr_disables_api() {
        temp_env::with_var("CATDOG_API_ADDR", Some(""), || {
            let config = NodeConfig::from_env().unwrap();
            assert!(config.api_addr().is_none());
        });
    }

    #[test]
    fn test_listen_port_falls_back_to_enr_port() {
        let mut config = NodeConfig::default();
        config.v50.enr_udp = 9000;
        config.v51.enr_udp = 9001;
        config.v51.listen_udp = 9101;

        assert_eq!(
            config.listen_addr(ProtocolVersion::V50).unwrap(),
            "0.0.0.0:9000".parse().unwrap()
        );
        assert_eq!(
            config.listen_addr(ProtocolVersion::V51).unwrap(),
            "0.0.0.0:9101".parse().unwrap()
        );
    }

    #[test]
    fn test_validation_invalid_api_addr() {
        let mut config = NodeConfig::default();
        config.node.api_addr = "localhost".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid API address"));
    }

    #[test]
    fn test_validation_invalid_ips() {
        let mut config = NodeConfig::default();
        config.node.listen_ip = "not-an-ip".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("listen IP"));

        let mut config = NodeConfig::default();
        config.record.enr_ip = "not-an-ip".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("ENR IP"));
    }

    #[test]
    fn test_validation_invalid_entries() {
        let mut config = NodeConfig::default();
        config.record.attnets = "zz".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("attnets"));

        let mut config = NodeConfig::default();
        config.record.eth2 = "abc".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("eth2"));

        let mut config = NodeConfig::default();
        config.record.fork_version = "0102".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("fork version"));
    }

    #[test]
    fn test_validation_invalid_net_restrict() {
        let mut config = NodeConfig::default();
        config.discovery.net_restrict = "10.0.0.0/99".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_timeouts() {
        let mut config = NodeConfig::default();
        config.discovery.resp_timeout_ms = 0;
        assert!(config.validate().unwrap_err().to_string().contains("non-zero"));

        let mut config = NodeConfig::default();
        config.discovery.revalidate_interval_ms = config.discovery.resp_timeout_ms;
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("must be greater than")
        );
    }

    #[rstest]
    #[case("trace", true)]
    #[case("debug", true)]
    #[case("info", true)]
    #[case("warn", true)]
    #[case("error", true)]
    #[case("off", true)]
    #[case("loud", false)]
    fn test_validation_log_level(#[case] level: &str, #[case] valid: bool) {
        let mut config = NodeConfig::default();
        config.log.level = level.to_string();

        match config.validate() {
            Ok(()) => assert!(valid, "level {} should be rejected", level),
            Err(e) => {
                assert!(!valid, "level {} should be accepted", level);
                assert!(e.to_string().contains("log level"));
            }
        }
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a ,b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
