//! Engine configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use catdog_identity::{NodeRecord, ValidSchemes};
use k256::ecdsa::SigningKey;

use crate::error::ConfigError;
use crate::{
    BUCKET_SIZE, EngineHooks, Netlist, REFRESH_INTERVAL, RESP_TIMEOUT, REVALIDATE_INTERVAL,
};

/// Everything a discovery engine needs to start.
///
/// Use [`EngineConfig::builder()`] to construct with validation.
#[derive(Clone)]
pub struct EngineConfig {
    private_key: SigningKey,
    bootnodes: Vec<NodeRecord>,
    net_restrict: Option<Netlist>,
    valid_schemes: ValidSchemes,
    log_label: String,
    hooks: Option<Arc<dyn EngineHooks>>,
    resp_timeout: Duration,
    revalidate_interval: Duration,
    refresh_interval: Duration,
    bucket_size: usize,
}

impl EngineConfig {
    /// Create a new configuration builder for an engine running under `private_key`.
    pub fn builder(private_key: SigningKey) -> EngineConfigBuilder {
        EngineConfigBuilder::new(private_key)
    }

    // --- Getters ---

    /// The engine's identity key.
    pub fn private_key(&self) -> &SigningKey {
        &self.private_key
    }

    /// Initial peers to contact on start.
    pub fn bootnodes(&self) -> &[NodeRecord] {
        &self.bootnodes
    }

    /// If set, peers outside these networks are ignored.
    pub fn net_restrict(&self) -> Option<&Netlist> {
        self.net_restrict.as_ref()
    }

    pub fn valid_schemes(&self) -> &ValidSchemes {
        &self.valid_schemes
    }

    /// Prefix for the engine's log lines, e.g. `v5.0`.
    pub fn log_label(&self) -> &str {
        &self.log_label
    }

    /// Callbacks installed by the bridge, if any.
    pub fn hooks(&self) -> Option<&Arc<dyn EngineHooks>> {
        self.hooks.as_ref()
    }

    pub fn resp_timeout(&self) -> Duration {
        self.resp_timeout
    }

    pub fn revalidate_interval(&self) -> Duration {
        self.revalidate_interval
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Replace the installed hooks.
    ///
    /// The bridge uses this to inject its own callbacks after the caller has
    /// built the rest of the configuration.
    pub fn with_hooks(mut self, hooks: Arc<dyn EngineHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub(crate) fn take_hooks(&mut self) -> Option<Arc<dyn EngineHooks>> {
        self.hooks.take()
    }

    /// Replace the log label.
    pub fn with_log_label(mut self, label: impl Into<String>) -> Self {
        self.log_label = label.into();
        self
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("bootnodes", &self.bootnodes.len())
            .field("net_restrict", &self.net_restrict)
            .field("valid_schemes", &self.valid_schemes)
            .field("log_label", &self.log_label)
            .field("hooks", &self.hooks.is_some())
            .field("resp_timeout", &self.resp_timeout)
            .field("revalidate_interval", &self.revalidate_interval)
            .field("refresh_interval", &self.refresh_interval)
            .field("bucket_size", &self.bucket_size)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EngineConfig`].
pub struct EngineConfigBuilder {
    private_key: SigningKey,
    bootnodes: Vec<NodeRecord>,
    net_restrict: Option<Netlist>,
    valid_schemes: ValidSchemes,
    log_label: String,
    hooks: Option<Arc<dyn EngineHooks>>,
    resp_timeout: Duration,
    revalidate_interval: Duration,
    refresh_interval: Duration,
    bucket_size: usize,
}

impl EngineConfigBuilder {
    pub fn new(private_key: SigningKey) -> Self {
        Self {
            private_key,
            bootnodes: Vec::new(),
            net_restrict: None,
            valid_schemes: ValidSchemes::default(),
            log_label: String::new(),
            hooks: None,
            resp_timeout: RESP_TIMEOUT,
            revalidate_interval: REVALIDATE_INTERVAL,
            refresh_interval: REFRESH_INTERVAL,
            bucket_size: BUCKET_SIZE,
        }
    }

    pub fn bootnodes(mut self, bootnodes: Vec<NodeRecord>) -> Self {
        self.bootnodes = bootnodes;
        self
    }

    pub fn net_restrict(mut self, netlist: Netlist) -> Self {
        self.net_restrict = Some(netlist);
        self
    }

    pub fn valid_schemes(mut self, schemes: ValidSchemes) -> Self {
        self.valid_schemes = schemes;
        self
    }

    pub fn log_label(mut self, label: impl Into<String>) -> Self {
        self.log_label = label.into();
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn EngineHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn resp_timeout(mut self, timeout: Duration) -> Self {
        self.resp_timeout = timeout;
        self
    }

    pub fn revalidate_interval(mut self, interval: Duration) -> Self {
        self.revalidate_interval = interval;
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn bucket_size(mut self, size: usize) -> Self {
        self.bucket_size = size;
        self
    }

    /// Build the configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `bucket_size` is zero
    /// - any interval or timeout is zero
    /// - `revalidate_interval` is not greater than `resp_timeout`
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        if self.bucket_size < 1 {
            return Err(ConfigError::BelowMinimum {
                field: "bucket_size",
                minimum: 1,
                provided: self.bucket_size,
            });
        }

        for (field, value) in [
            ("resp_timeout", self.resp_timeout),
            ("revalidate_interval", self.revalidate_interval),
            ("refresh_interval", self.refresh_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(field));
            }
        }

        // A revalidation round must be able to finish before the next starts.
        if self.revalidate_interval <= self.resp_timeout {
            return Err(ConfigError::InvalidRelation {
                field: "revalidate_interval",
                field_value: self.revalidate_interval,
                other_field: "resp_timeout",
                other_value: self.resp_timeout,
            });
        }

        Ok(EngineConfig {
            private_key: self.private_key,
            bootnodes: self.bootnodes,
            net_restrict: self.net_restrict,
            valid_schemes: self.valid_schemes,
            log_label: self.log_label,
            hooks: self.hooks,
            resp_timeout: self.resp_timeout,
            revalidate_interval: self.revalidate_interval,
            refresh_interval: self.refresh_interval,
            bucket_size: self.bucket_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catdog_identity::parse_private_key;

    fn key() -> SigningKey {
        parse_private_key("8a1f9a8f95be41cd7ccb6168179afb4504aefe388d1e14474d32c45c72ce7b7a")
            .unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::builder(key()).build().unwrap();
        assert_eq!(config.resp_timeout(), RESP_TIMEOUT);
        assert_eq!(config.bucket_size(), BUCKET_SIZE);
        assert!(config.hooks().is_none());
        assert!(config.net_restrict().is_none());
        assert!(config.valid_schemes().contains("v4"));
    }

    #[test]
    fn builder_validates_bucket_size() {
        let result = EngineConfig::builder(key()).bucket_size(0).build();
        assert!(matches!(
            result,
            Err(ConfigError::BelowMinimum {
                field: "bucket_size",
                ..
            })
        ));
    }

    #[test]
    fn builder_rejects_zero_durations() {
        let result = EngineConfig::builder(key())
            .refresh_interval(Duration::ZERO)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::ZeroDuration("refresh_interval"))
        ));
    }

    #[test]
    fn builder_validates_revalidate_vs_timeout() {
        let result = EngineConfig::builder(key())
            .resp_timeout(Duration::from_secs(2))
            .revalidate_interval(Duration::from_secs(1))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidRelation {
                field: "revalidate_interval",
                other_field: "resp_timeout",
                ..
            })
        ));
    }

    #[test]
    fn log_label_can_be_replaced() {
        let config = EngineConfig::builder(key())
            .log_label("old")
            .build()
            .unwrap()
            .with_log_label("v5.1");
        assert_eq!(config.log_label(), "v5.1");
    }

    #[test]
    fn debug_hides_private_key() {
        let config = EngineConfig::builder(key()).build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("8a1f9a8f"));
        assert!(debug.contains("bucket_size"));
    }
}
