use crate::config::ShardGroups;
use crate::coordinator::membership::{epoch_secs, Membership};
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_millis(200);
const PROBE_READ_TIMEOUT: Duration = Duration::from_millis(600);

/// HTTP client used for readiness probes; tighter timeouts than the search
/// path so a dead replica cannot stall a heartbeat tick.
pub fn probe_client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(PROBE_CONNECT_TIMEOUT)
        .timeout(PROBE_READ_TIMEOUT)
        .build()
}

/// Probes one replica's readiness endpoint. Returns whether it answered 200
/// and the round-trip time in milliseconds; transport errors bubble up
/// without an RTT.
async fn probe_replica(client: &Client, base_url: &str) -> reqwest::Result<(bool, f64)> {
    let t0 = Instant::now();
    let response = client
        .get(format!("{base_url}/internal/ready"))
        .send()
        .await?;
    let rtt_ms = t0.elapsed().as_secs_f64() * 1000.0;
    Ok((response.status().as_u16() == 200, rtt_ms))
}

/// Heartbeat loop: probes every known replica once per interval and feeds
/// the membership table. Probes within one tick run concurrently; state
/// updates apply serially as results come back.
///
/// Cancellation-safe: the loop exits at the next suspension point after the
/// token fires.
pub async fn run_heartbeat(
    shard_groups: Arc<ShardGroups>,
    membership: Arc<Membership>,
    token: CancellationToken,
) {
    let client = match probe_client() {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to build heartbeat client");
            return;
        }
    };

    info!(
        replicas = shard_groups.values().map(Vec::len).sum::<usize>(),
        "heartbeat loop started"
    );

    loop {
        for replicas in shard_groups.values() {
            for base in replicas {
                membership.ensure(base);
            }
        }

        let bases = membership.base_urls();
        let probes = bases.iter().map(|base| probe_replica(&client, base));
        let results = join_all(probes).await;
        let now = epoch_secs();

        for (base, result) in bases.iter().zip(results) {
            let before = membership.status_of(base);
            let after = match result {
                Ok((true, rtt_ms)) => membership.apply_success(base, now, rtt_ms),
                Ok((false, rtt_ms)) => membership.apply_failure(base, Some(rtt_ms)),
                Err(_) => membership.apply_failure(base, None),
            };
            if before != after {
                info!(
                    replica = %base,
                    from = before.as_str(),
                    to = after.as_str(),
                    "replica status changed"
                );
            } else {
                debug!(replica = %base, status = after.as_str(), "probed");
            }
        }

        tokio::select! {
            _ = token.cancelled() => {
                info!("heartbeat loop stopping");
                return;
            }
            _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {}
        }
    }
}
