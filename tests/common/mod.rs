//! Shared fixtures: a scripted upstream and a gateway wired to in-memory storage.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use newsgate::cache::{CacheStorage, HeaderStamp, MemoryStorage, StoredResponse};
use newsgate::gateway::{
    FetchError, Fetcher, Gateway, GatewayConfig, GatewayContext, GatewayRequest, ManualClock,
};
use time::OffsetDateTime;
use time::macros::datetime;
use url::Url;

pub const ORIGIN: &str = "https://news.example.com/";
pub const START: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);
pub const ROOT_HTML: &str = "<!DOCTYPE html><title>terminal</title>";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN)
        .and_then(|origin| origin.join(path))
        .expect("test url")
}

enum Script {
    Respond(StoredResponse),
    Delayed(Duration, StoredResponse),
    Fail,
    Hang,
}

/// Upstream double. Unscripted URLs answer 404; every call is recorded.
#[derive(Default)]
pub struct ScriptedUpstream {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl ScriptedUpstream {
    pub fn respond(&self, path: &str, status: u16, content_type: &str, body: &str) {
        let response = StoredResponse::new(
            status,
            vec![("content-type".to_string(), content_type.to_string())],
            body.to_string(),
        );
        self.script(path, Script::Respond(response));
    }

    pub fn respond_with_headers(
        &self,
        path: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
    ) {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let response = StoredResponse::new(status, headers, body.to_string());
        self.script(path, Script::Respond(response));
    }

    /// Answer only after `delay`, for checking which deadline applies.
    pub fn respond_after(&self, path: &str, delay: Duration, status: u16, body: &str) {
        let response = StoredResponse::new(status, Vec::new(), body.to_string());
        self.script(path, Script::Delayed(delay, response));
    }

    pub fn fail(&self, path: &str) {
        self.script(path, Script::Fail);
    }

    pub fn hang(&self, path: &str) {
        self.script(path, Script::Hang);
    }

    /// Every fetch fails with a connection error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls().iter().filter(|call| **call == target).count()
    }

    fn script(&self, path: &str, script: Script) {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(url(path).to_string(), script);
    }
}

#[async_trait]
impl Fetcher for ScriptedUpstream {
    async fn fetch(&self, request: &GatewayRequest) -> Result<StoredResponse, FetchError> {
        let target = request.url.to_string();
        self.calls.lock().expect("calls lock").push(target.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Connect("network unreachable".to_string()));
        }

        let (delay, outcome) = {
            let scripts = self.scripts.lock().expect("scripts lock");
            match scripts.get(&target) {
                Some(Script::Respond(response)) => (None, Ok(response.clone())),
                Some(Script::Delayed(delay, response)) => (Some(*delay), Ok(response.clone())),
                Some(Script::Fail) => (None, Err(FetchError::Connect("refused".to_string()))),
                Some(Script::Hang) => (Some(Duration::from_secs(30)), Err(FetchError::Timeout)),
                None => (None, Ok(StoredResponse::new(404, Vec::new(), "not found"))),
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub upstream: Arc<ScriptedUpstream>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Gateway in its initial state over fresh storage.
    pub fn new(configure: impl FnOnce(&mut GatewayConfig)) -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()), configure)
    }

    pub fn with_storage(
        storage: Arc<MemoryStorage>,
        configure: impl FnOnce(&mut GatewayConfig),
    ) -> Self {
        let mut config = GatewayConfig::for_origin(Url::parse(ORIGIN).expect("origin"));
        config.static_timeout = Duration::from_millis(200);
        config.api_timeout = Duration::from_millis(200);
        config.navigation_timeout = Duration::from_millis(200);
        configure(&mut config);

        let upstream = Arc::new(ScriptedUpstream::default());
        upstream.respond("/", 200, "text/html; charset=utf-8", ROOT_HTML);
        let clock = Arc::new(ManualClock::new(START));

        let storage_dyn: Arc<dyn CacheStorage> = storage.clone();
        let context = GatewayContext::new(
            config,
            storage_dyn,
            upstream.clone(),
            Arc::new(HeaderStamp),
            clock.clone(),
        );

        Self {
            gateway: Arc::new(Gateway::new(context)),
            upstream,
            storage,
            clock,
        }
    }

    /// Installed and activated gateway.
    pub async fn active(configure: impl FnOnce(&mut GatewayConfig)) -> Self {
        let harness = Self::new(configure);
        harness.gateway.install().await.expect("install");
        harness.gateway.activate().await.expect("activate");
        harness
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(time::Duration::minutes(minutes));
    }

    pub fn namespace_name(&self, partition: newsgate::cache::Partition) -> String {
        self.gateway.context().namespaces.get(partition).name.clone()
    }
}

/// Poll until `check` holds, for background tasks spawned by the gateway.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn body_json(response: &StoredResponse) -> serde_json::Value {
    serde_json::from_slice(&response.body).expect("json body")
}
