//! netbroker integration test harness.
//!
//! Every test starts its own broker in-process with persistence off, so
//! tests never share state. API tests also bind the HTTP surface on an
//! ephemeral localhost port.
//!
//!   cargo test --test integration

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::net::TcpListener;

use netbroker_api::{ApiState, INTERFACE_HEADER, UID_HEADER};
use netbroker_core::config::BrokerConfig;
use netbroker_services::{Broker, BrokerHandle, LoggingConfigurator};

mod api;
mod persistence;
mod scenarios;

// ── Harness ───────────────────────────────────────────────────────────────────

/// UID allowed to mutate suppliers and policy in the default config.
pub const SYSTEM_UID: u32 = 0;
pub const APP_UID: u32 = 1000;

/// Config with persistence off.
pub fn test_config() -> BrokerConfig {
    let mut config = BrokerConfig::default();
    config.policy.persist = false;
    config
}

/// Spawn a broker and wait until it accepts calls.
pub async fn start_broker(config: &BrokerConfig) -> Result<BrokerHandle> {
    let (handle, _task) = Broker::spawn(config, Arc::new(LoggingConfigurator));
    for _ in 0..200 {
        if handle.is_ready() {
            return Ok(handle);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    bail!("broker did not become ready")
}

/// A broker with its HTTP surface on an ephemeral port.
pub struct TestServer {
    pub base: String,
    pub broker: BrokerHandle,
    pub token: String,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let config = test_config();
        let broker = start_broker(&config).await?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = ApiState::new(broker.clone(), &config);
        tokio::spawn(netbroker_api::serve_on(state, listener));
        Ok(Self {
            base: format!("http://{addr}/api"),
            broker,
            token: config.api.interface_token,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Request builder carrying the interface token and caller uid.
    pub fn call(&self, method: reqwest::Method, path: &str, uid: u32) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(INTERFACE_HEADER, &self.token)
            .header(UID_HEADER, uid.to_string())
    }

    /// Send and return (http status, envelope).
    pub async fn send(&self, req: reqwest::RequestBuilder) -> Result<(u16, Value)> {
        let resp = req.send().await.context("request failed")?;
        let status = resp.status().as_u16();
        let body: Value = resp.json().await.context("response was not JSON")?;
        Ok((status, body))
    }
}

/// Minimal reader for a `text/event-stream` response.
pub struct EventReader {
    resp: reqwest::Response,
    buf: String,
}

impl EventReader {
    pub fn new(resp: reqwest::Response) -> Self {
        Self {
            resp,
            buf: String::new(),
        }
    }

    /// Next event as (name, data). Keep-alive comments are skipped.
    pub async fn next(&mut self) -> Result<(String, Value)> {
        loop {
            if let Some(end) = self.buf.find("\n\n") {
                let block: String = self.buf.drain(..end + 2).collect();
                let mut name = String::from("message");
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(v) = line.strip_prefix("event:") {
                        name = v.trim().to_string();
                    } else if let Some(v) = line.strip_prefix("data:") {
                        data.push_str(v.trim());
                    }
                }
                if data.is_empty() {
                    continue;
                }
                return Ok((name, serde_json::from_str(&data)?));
            }
            let chunk = tokio::time::timeout(Duration::from_secs(2), self.resp.chunk())
                .await
                .context("timed out waiting for event")??;
            match chunk {
                Some(bytes) => self.buf.push_str(&String::from_utf8_lossy(&bytes)),
                None => bail!("event stream ended"),
            }
        }
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
