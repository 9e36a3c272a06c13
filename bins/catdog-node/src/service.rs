//! Node service running both discovery engines and the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use catdog_bridge::Bridge;
use catdog_discovery::{EngineConfig, EngineHandle, ProtocolVersion, UdpStarter};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::NodeConfig;
use crate::api::{AppState, create_router};
use crate::identity::{EngineIdentity, NodeIdentities};

/// How often table sizes are logged while running.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// A running bootnode: two bridged engines plus the optional API.
pub struct NodeService {
    config: NodeConfig,
    bridge: Bridge,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeService {
    /// Bind both sockets and start the bridge.
    ///
    /// If the v5.1 engine fails to start, the already running v5.0 engine is
    /// closed before the error is returned.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        info!("Creating node service");
        config.validate()?;

        let identities = NodeIdentities::from_config(&config)?;

        let v50_starter = bind(&config, &identities.v50).await?;
        let v51_starter = bind(&config, &identities.v51).await?;
        let v50_config = engine_config(&config, &identities.v50)?;
        let v51_config = engine_config(&config, &identities.v51)?;

        let bridge = match Bridge::construct_with_placement(
            v50_starter,
            v50_config,
            v51_starter,
            v51_config,
            config.discovery.placement.policy(),
        )
        .await
        {
            Ok(bridge) => bridge,
            Err(mut e) => {
                if let Some(started) = e.take_started() {
                    started.close().await;
                }
                return Err(e.into());
            }
        };

        for engine in [bridge.v50(), bridge.v51()] {
            info!(
                version = engine.version().label(),
                enr = %engine.local_record(),
                "Local record"
            );
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            bridge,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Get a shutdown trigger that can be used to signal shutdown.
    ///
    /// This should be called before moving the service into a spawn.
    pub fn shutdown_trigger(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Serve the API and log status until shutdown is triggered, then close
    /// the bridge and stop the API.
    pub async fn run(self) -> Result<()> {
        let api = match self.config.api_addr() {
            Some(addr) => match self.spawn_api(addr).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    self.bridge.close().await;
                    return Err(e);
                }
            },
            None => {
                info!("API server disabled");
                None
            }
        };

        info!("Node service running");
        let mut shutdown = self.shutdown_rx.clone();
        let mut status = tokio::time::interval(STATUS_LOG_INTERVAL);
        status.set_missed_tick_behavior(MissedTickBehavior::Skip);
        status.tick().await;

        loop {
            tokio::select! {
                _ = status.tick() => self.log_status().await,
                _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.bridge.close().await;

        if let Some(api) = api {
            match api.await {
                Ok(Ok(())) => info!("API server stopped"),
                Ok(Err(e)) => error!("API server error: {}", e),
                Err(e) => error!("API server task panicked: {}", e),
            }
        }

        info!("Node service shutdown complete");
        Ok(())
    }

    async fn spawn_api(&self, addr: SocketAddr) -> Result<JoinHandle<std::io::Result<()>>> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind API server to {}", addr))?;
        let local = listener.local_addr()?;
        info!("Starting API server, ENR reachable on: http://{}/enr", local);

        let router = create_router(AppState::from_bridge(&self.bridge));
        let mut shutdown = self.shutdown_rx.clone();
        Ok(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await
        }))
    }

    async fn log_status(&self) {
        let v50 = self.bridge.v50().peer_count().await;
        let v51 = self.bridge.v51().peer_count().await;
        info!(v50_peers = v50, v51_peers = v51, "Status");
    }
}

async fn bind(config: &NodeConfig, identity: &EngineIdentity) -> Result<UdpStarter> {
    let addr = config.listen_addr(identity.version)?;
    debug!(version = identity.version.label(), %addr, "Binding UDP socket");
    UdpStarter::bind(identity.version, addr, Arc::clone(&identity.local))
        .await
        .with_context(|| format!("failed to listen for {} on {}", identity.version.label(), addr))
}

fn engine_config(config: &NodeConfig, identity: &EngineIdentity) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder(identity.key.clone())
        .bootnodes(identity.bootnodes.clone())
        .resp_timeout(config.resp_timeout())
        .revalidate_interval(config.revalidate_interval())
        .log_label(identity.version.label());
    if let Some(netlist) = config.net_restrict()? {
        builder = builder.net_restrict(netlist);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catdog_test_utils::identity;

    fn loopback_config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.node.listen_ip = "127.0.0.1".to_string();
        config.node.api_addr = String::new();
        config.v50.priv_key = identity::key_hex(&identity::random_key());
        config.v51.priv_key = identity::key_hex(&identity::random_key());
        config
    }

    #[tokio::test]
    async fn test_service_creation() {
        let service = NodeService::new(loopback_config()).await.unwrap();

        let v50 = service.bridge().v50();
        let v51 = service.bridge().v51();
        assert_eq!(v50.version(), ProtocolVersion::V50);
        assert_eq!(v51.version(), ProtocolVersion::V51);
        assert!(v50.local_record().udp().is_some(), "bound port advertised");
        assert_ne!(v50.local_record().id(), v51.local_record().id());
        assert!(service.bridge().coordinator().gate().is_ready());

        service.bridge().close().await;
    }

    #[tokio::test]
    async fn test_missing_key_fails() {
        let mut config = loopback_config();
        config.v51.priv_key.clear();

        let err = NodeService::new(config).await.err().unwrap();
        assert_eq!(err.to_string(), "need p2p priv key for v5.1");
    }

    #[tokio::test]
    async fn test_port_in_use_fails() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut config = loopback_config();
        config.v51.listen_udp = taken.local_addr().unwrap().port();

        let err = NodeService::new(config).await.err().unwrap();
        assert!(err.to_string().contains("failed to listen for v5.1"));
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let mut config = loopback_config();
        config.node.api_addr = "127.0.0.1:0".to_string();
        let service = NodeService::new(config).await.unwrap();
        let shutdown_trigger = service.shutdown_trigger();

        let handle = tokio::spawn(async move { service.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());

        shutdown_trigger.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Shutdown should complete within timeout");
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_before_run() {
        let service = NodeService::new(loopback_config()).await.unwrap();
        service.shutdown_trigger().send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), service.run())
            .await
            .expect("run returns immediately")
            .unwrap();
    }
}
