//! Shared test utilities for catdog-node tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use catdog_discovery::ProtocolVersion;
use catdog_node::NodeConfig;
use catdog_node::api::AppState;
use catdog_test_utils::{FakeEngine, identity};
use http_body_util::BodyExt;

/// API state over two fake engines.
pub fn fake_state() -> (AppState, Arc<FakeEngine>, Arc<FakeEngine>) {
    let v50 = FakeEngine::new(ProtocolVersion::V50);
    let v51 = FakeEngine::new(ProtocolVersion::V51);
    let state = AppState {
        v50: v50.clone(),
        v51: v51.clone(),
        placement: "default",
    };
    (state, v50, v51)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Node configuration on loopback with fresh keys, ephemeral ports and no API.
pub fn loopback_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node.listen_ip = "127.0.0.1".to_string();
    config.node.api_addr = String::new();
    config.v50.priv_key = identity::key_hex(&identity::random_key());
    config.v51.priv_key = identity::key_hex(&identity::random_key());
    config.discovery.resp_timeout_ms = 250;
    config
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
