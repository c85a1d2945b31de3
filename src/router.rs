use crate::coordinator::membership::epoch_secs;
use crate::models::round_ms;
use dashmap::DashMap;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const HEALTH_INTERVAL: Duration = Duration::from_secs(1);
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const PROBE_READ_TIMEOUT: Duration = Duration::from_millis(700);
const FORWARD_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const FORWARD_READ_TIMEOUT: Duration = Duration::from_millis(2000);
const RETRY_NEXT_COORDINATOR_ONCE: bool = true;

/// Why a search could not be forwarded.
#[derive(Debug)]
pub enum ForwardError {
    NoCoordinators,
    AllAttemptsFailed(String),
}

/// Routing state of one coordinator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorState {
    pub ready: bool,
    pub last_seen_ts: Option<f64>,
    pub last_rtt_ms: Option<f64>,
    pub consecutive_failures: u32,
    pub inflight: u32,
    pub total_routed: u64,
}

/// Round-robin load balancer over coordinators, with its own readiness
/// probing.
pub struct Router {
    coordinator_urls: Vec<String>,
    states: DashMap<String, CoordinatorState>,
    rr_index: AtomicUsize,
    forward_client: Client,
    health_token: CancellationToken,
    health_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Router {
    pub fn new(coordinator_urls: Vec<String>) -> anyhow::Result<Arc<Self>> {
        let states = DashMap::new();
        for url in &coordinator_urls {
            states.insert(url.clone(), CoordinatorState::default());
        }

        let forward_client = Client::builder()
            .connect_timeout(FORWARD_CONNECT_TIMEOUT)
            .timeout(FORWARD_READ_TIMEOUT)
            .build()?;

        Ok(Arc::new(Router {
            coordinator_urls,
            states,
            rr_index: AtomicUsize::new(0),
            forward_client,
            health_token: CancellationToken::new(),
            health_handle: Mutex::new(None),
        }))
    }

    pub async fn spawn_health_loop(self: &Arc<Self>) {
        let router = Arc::clone(self);
        let token = self.health_token.clone();
        let handle = tokio::spawn(async move { router.health_loop(token).await });
        *self.health_handle.lock().await = Some(handle);
    }

    pub async fn shutdown(&self) {
        self.health_token.cancel();
        if let Some(handle) = self.health_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    async fn health_loop(&self, token: CancellationToken) {
        let client = match Client::builder()
            .connect_timeout(PROBE_CONNECT_TIMEOUT)
            .timeout(PROBE_READ_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                error!(error = %err, "failed to build router probe client");
                return;
            }
        };

        info!(coordinators = self.coordinator_urls.len(), "router health loop started");

        loop {
            let probes = self
                .coordinator_urls
                .iter()
                .map(|base| probe_coordinator(&client, base));
            let results = join_all(probes).await;
            let now = epoch_secs();

            for (base, result) in self.coordinator_urls.iter().zip(results) {
                let mut state = self.states.entry(base.clone()).or_default();
                match result {
                    Ok((true, rtt_ms)) => {
                        state.ready = true;
                        state.last_seen_ts = Some(now);
                        state.last_rtt_ms = Some(rtt_ms);
                        state.consecutive_failures = 0;
                    }
                    Ok((false, rtt_ms)) => {
                        state.ready = false;
                        state.last_rtt_ms = Some(rtt_ms);
                        state.consecutive_failures += 1;
                    }
                    Err(_) => {
                        state.ready = false;
                        state.consecutive_failures += 1;
                    }
                }
            }

            tokio::select! {
                _ = token.cancelled() => {
                    info!("router health loop stopping");
                    return;
                }
                _ = tokio::time::sleep(HEALTH_INTERVAL) => {}
            }
        }
    }

    /// Round-robin pick among coordinators currently marked ready.
    pub fn pick_ready(&self) -> Option<String> {
        let ready: Vec<&String> = self
            .coordinator_urls
            .iter()
            .filter(|url| self.is_ready(url))
            .collect();
        if ready.is_empty() {
            return None;
        }
        let idx = self.rr_index.fetch_add(1, Ordering::Relaxed) % ready.len();
        Some(ready[idx].clone())
    }

    /// Another ready coordinator to fall back to, if one exists.
    fn fallback_for(&self, first: &str) -> Option<String> {
        self.coordinator_urls
            .iter()
            .find(|url| url.as_str() != first && self.is_ready(url))
            .cloned()
    }

    fn is_ready(&self, url: &str) -> bool {
        self.states.get(url).map(|s| s.ready).unwrap_or(false)
    }

    pub fn any_ready(&self) -> bool {
        self.coordinator_urls.iter().any(|url| self.is_ready(url))
    }

    /// Marks a coordinator failed immediately after a forwarding error,
    /// without waiting for the next probe tick.
    fn mark_forward_failure(&self, url: &str) {
        if let Some(mut state) = self.states.get_mut(url) {
            state.ready = false;
            state.consecutive_failures += 1;
        }
    }

    /// Forwards a search to the first ready coordinator, falling back to one
    /// other ready coordinator on transport failure. Returns the upstream
    /// status, body and the coordinator that served the request.
    pub async fn forward_search(
        &self,
        q: &str,
        page: usize,
        page_size: usize,
        debug: bool,
        request_id: &str,
    ) -> Result<(u16, serde_json::Value, String), ForwardError> {
        let Some(first) = self.pick_ready() else {
            return Err(ForwardError::NoCoordinators);
        };

        let mut candidates = vec![first.clone()];
        if RETRY_NEXT_COORDINATOR_ONCE {
            if let Some(fallback) = self.fallback_for(&first) {
                candidates.push(fallback);
            }
        }

        let mut last_err = String::new();

        for base in candidates {
            if let Some(mut state) = self.states.get_mut(&base) {
                state.inflight += 1;
                state.total_routed += 1;
            }

            let result = self
                .forward_client
                .get(format!("{base}/search"))
                .query(&[
                    ("q", q.to_string()),
                    ("page", page.to_string()),
                    ("page_size", page_size.to_string()),
                    ("debug", debug.to_string()),
                ])
                .header("x-request-id", request_id)
                .send()
                .await;

            let outcome = match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    // a reachable coordinator's error responses are passed
                    // through untouched
                    match response.json::<serde_json::Value>().await {
                        Ok(body) => Some((status, body)),
                        Err(err) => {
                            last_err = format!("DecodeError: {err}");
                            None
                        }
                    }
                }
                Err(err) => {
                    last_err = if err.is_timeout() {
                        "Timeout".to_string()
                    } else if err.is_connect() {
                        "ConnectError".to_string()
                    } else {
                        format!("RequestError: {err}")
                    };
                    None
                }
            };

            if let Some(mut state) = self.states.get_mut(&base) {
                state.inflight = state.inflight.saturating_sub(1);
            }

            match outcome {
                Some((status, body)) => return Ok((status, body, base)),
                None => {
                    warn!(coordinator = %base, error = %last_err, "forward attempt failed");
                    self.mark_forward_failure(&base);
                }
            }
        }

        Err(ForwardError::AllAttemptsFailed(last_err))
    }

    /// Per-coordinator routing state for the diagnostics endpoint.
    pub fn state_dump(&self) -> serde_json::Value {
        let coordinators: Vec<serde_json::Value> = self
            .coordinator_urls
            .iter()
            .map(|url| {
                let state = self
                    .states
                    .get(url)
                    .map(|s| s.value().clone())
                    .unwrap_or_default();
                serde_json::json!({
                    "base_url": url,
                    "ready": state.ready,
                    "last_seen_ts": state.last_seen_ts,
                    "last_rtt_ms": state.last_rtt_ms,
                    "consecutive_failures": state.consecutive_failures,
                    "inflight": state.inflight,
                    "total_routed": state.total_routed,
                })
            })
            .collect();
        serde_json::json!({ "coordinators": coordinators })
    }

    #[cfg(test)]
    fn set_ready(&self, url: &str, ready: bool) {
        if let Some(mut state) = self.states.get_mut(url) {
            state.ready = ready;
        }
    }
}

async fn probe_coordinator(client: &Client, base_url: &str) -> reqwest::Result<(bool, f64)> {
    let t0 = Instant::now();
    let response = client.get(format!("{base_url}/ready")).send().await?;
    let rtt_ms = round_ms(t0.elapsed().as_secs_f64() * 1000.0);
    Ok((response.status().as_u16() == 200, rtt_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_with(urls: &[&str]) -> Arc<Router> {
        Router::new(urls.iter().map(|u| u.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_pick_ready_none_when_all_unready() {
        let router = router_with(&["http://c1:9000", "http://c2:9000"]);
        assert!(router.pick_ready().is_none());
        assert!(!router.any_ready());
    }

    #[test]
    fn test_pick_ready_round_robins() {
        let router = router_with(&["http://c1:9000", "http://c2:9000"]);
        router.set_ready("http://c1:9000", true);
        router.set_ready("http://c2:9000", true);

        let first = router.pick_ready().unwrap();
        let second = router.pick_ready().unwrap();
        let third = router.pick_ready().unwrap();
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_pick_ready_skips_unready() {
        let router = router_with(&["http://c1:9000", "http://c2:9000"]);
        router.set_ready("http://c2:9000", true);
        for _ in 0..4 {
            assert_eq!(router.pick_ready().unwrap(), "http://c2:9000");
        }
    }

    #[test]
    fn test_fallback_for_excludes_first() {
        let router = router_with(&["http://c1:9000", "http://c2:9000"]);
        router.set_ready("http://c1:9000", true);
        router.set_ready("http://c2:9000", true);
        assert_eq!(
            router.fallback_for("http://c1:9000").unwrap(),
            "http://c2:9000"
        );

        router.set_ready("http://c2:9000", false);
        assert!(router.fallback_for("http://c1:9000").is_none());
    }

    #[test]
    fn test_state_dump_shape() {
        let router = router_with(&["http://c1:9000"]);
        let dump = router.state_dump();
        let coordinators = dump["coordinators"].as_array().unwrap();
        assert_eq!(coordinators.len(), 1);
        assert_eq!(coordinators[0]["base_url"], "http://c1:9000");
        assert_eq!(coordinators[0]["ready"], false);
        assert_eq!(coordinators[0]["total_routed"], 0);
    }
}
