//! Bridge construction and shutdown.

use std::sync::Arc;

use catdog_discovery::{EngineConfig, EngineHandle, EngineStarter, ProtocolVersion};
use tracing::{info, warn};

use crate::placement::{DefaultPlacement, PlacementPolicy};
use crate::{BridgeError, Coordinator, Result};

/// Two running discovery engines wired to one [`Coordinator`].
pub struct Bridge {
    coordinator: Arc<Coordinator>,
    v50: Arc<dyn EngineHandle>,
    v51: Arc<dyn EngineHandle>,
}

impl Bridge {
    /// Start both engines and open the bridge.
    ///
    /// Equivalent to [`Bridge::construct_with_placement`] with
    /// [`DefaultPlacement`].
    pub async fn construct<A, B>(
        v50_starter: A,
        v50_config: EngineConfig,
        v51_starter: B,
        v51_config: EngineConfig,
    ) -> Result<Self>
    where
        A: EngineStarter,
        B: EngineStarter,
    {
        Self::construct_with_placement(
            v50_starter,
            v50_config,
            v51_starter,
            v51_config,
            Arc::new(DefaultPlacement),
        )
        .await
    }

    /// Start both engines and open the bridge.
    ///
    /// The coordinator's hooks are installed into both configurations before
    /// either engine starts. The v5.0 engine starts first, then the v5.1
    /// engine, and only then does the gate open, so no hook has any effect
    /// until both engines are attached.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Start`] if either engine fails to start. When
    /// the v5.1 engine fails, the already running v5.0 engine is returned in
    /// the error and must be closed by the caller.
    pub async fn construct_with_placement<A, B>(
        v50_starter: A,
        v50_config: EngineConfig,
        v51_starter: B,
        v51_config: EngineConfig,
        placement: Arc<dyn PlacementPolicy>,
    ) -> Result<Self>
    where
        A: EngineStarter,
        B: EngineStarter,
    {
        check_version(&v50_starter, ProtocolVersion::V50)?;
        check_version(&v51_starter, ProtocolVersion::V51)?;

        let coordinator = Arc::new(Coordinator::with_placement(placement));

        let v50 = v50_starter
            .start(prepare(v50_config, &coordinator, ProtocolVersion::V50))
            .await
            .map_err(|source| BridgeError::Start {
                version: ProtocolVersion::V50,
                source,
                started: None,
            })?;
        info!(id = %v50.local_record().id().fmt_short(), "Started discv5.0");

        let v51 = v51_starter
            .start(prepare(v51_config, &coordinator, ProtocolVersion::V51))
            .await
            .map_err(|source| BridgeError::Start {
                version: ProtocolVersion::V51,
                source,
                started: Some(Arc::clone(&v50)),
            })?;
        info!(id = %v51.local_record().id().fmt_short(), "Started discv5.1");

        let attached = coordinator
            .attach(Arc::clone(&v50))
            .and_then(|()| coordinator.attach(Arc::clone(&v51)));
        if let Err(e) = attached {
            warn!("Engine reported an unexpected version, closing both: {}", e);
            v51.close().await;
            v50.close().await;
            return Err(e);
        }

        coordinator.gate().signal_ready();
        info!(placement = coordinator.placement().name(), "Bridge ready");

        Ok(Self {
            coordinator,
            v50,
            v51,
        })
    }

    pub fn v50(&self) -> &Arc<dyn EngineHandle> {
        &self.v50
    }

    pub fn v51(&self) -> &Arc<dyn EngineHandle> {
        &self.v51
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Close the v5.1 engine, then the v5.0 engine.
    pub async fn close(&self) {
        self.v51.close().await;
        self.v50.close().await;
        info!("Bridge closed");
    }
}

fn check_version<S: EngineStarter>(starter: &S, expected: ProtocolVersion) -> Result<()> {
    let actual = starter.version();
    if actual != expected {
        return Err(BridgeError::WrongVersion { expected, actual });
    }
    Ok(())
}

/// Install the coordinator's hooks and a default log label.
fn prepare(config: EngineConfig, coordinator: &Arc<Coordinator>, version: ProtocolVersion) -> EngineConfig {
    let config = config.with_hooks(coordinator.hooks(version));
    if config.log_label().is_empty() {
        config.with_log_label(version.label())
    } else {
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catdog_test_utils::{FakeEngine, FakeStarter, identity};

    fn config() -> EngineConfig {
        EngineConfig::builder(identity::random_key()).build().unwrap()
    }

    #[tokio::test]
    async fn construct_opens_gate_and_labels_engines() {
        let v50 = FakeStarter::new(FakeEngine::new(ProtocolVersion::V50));
        let v51 = FakeStarter::new(FakeEngine::new(ProtocolVersion::V51));
        let v50_config = v50.captured_config();
        let v51_config = v51.captured_config();

        let bridge = Bridge::construct(v50, config(), v51, config()).await.unwrap();

        assert!(bridge.coordinator().gate().is_ready());
        assert_eq!(bridge.v50().version(), ProtocolVersion::V50);
        assert_eq!(bridge.v51().version(), ProtocolVersion::V51);

        let v50_config = v50_config.lock().unwrap().take().unwrap();
        assert_eq!(v50_config.log_label(), "v5.0");
        assert!(v50_config.hooks().is_some());
        assert_eq!(v51_config.lock().unwrap().as_ref().unwrap().log_label(), "v5.1");
    }

    #[tokio::test]
    async fn custom_log_label_is_kept() {
        let v50 = FakeStarter::new(FakeEngine::new(ProtocolVersion::V50));
        let captured = v50.captured_config();
        let v51 = FakeStarter::new(FakeEngine::new(ProtocolVersion::V51));

        let labelled = EngineConfig::builder(identity::random_key())
            .log_label("old")
            .build()
            .unwrap();
        Bridge::construct(v50, labelled, v51, config()).await.unwrap();

        assert_eq!(captured.lock().unwrap().as_ref().unwrap().log_label(), "old");
    }

    #[tokio::test]
    async fn swapped_starters_are_rejected() {
        let v50 = FakeStarter::new(FakeEngine::new(ProtocolVersion::V50));
        let v51 = FakeStarter::new(FakeEngine::new(ProtocolVersion::V51));

        let result = Bridge::construct(v51, config(), v50, config()).await;
        assert!(matches!(
            result,
            Err(BridgeError::WrongVersion {
                expected: ProtocolVersion::V50,
                actual: ProtocolVersion::V51,
            })
        ));
    }
}
