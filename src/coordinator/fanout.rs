use crate::coordinator::membership::Membership;
use crate::models::{round_ms, AttemptMeta, InternalSearchRequest, SearchItem, SearchResponse};
use reqwest::Client;
use std::cmp::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
pub const READ_TIMEOUT: Duration = Duration::from_millis(1500);
const RETRY_ONCE: bool = true;

/// Shared HTTP client for shard fan-out; its pool bounds concurrent
/// replica connections.
pub fn search_client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .build()
}

/// Transport-level failures worth one retry: connect/read timeouts,
/// connection errors and broken responses. HTTP status codes are real
/// answers and are never retried.
fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

fn classify_error(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "Timeout"
    } else if err.is_connect() {
        "ConnectError"
    } else if err.is_body() || err.is_decode() {
        "ProtocolError"
    } else {
        "RequestError"
    }
}

async fn post_with_retry(
    client: &Client,
    url: &str,
    payload: &InternalSearchRequest,
) -> reqwest::Result<reqwest::Response> {
    match client.post(url).json(payload).send().await {
        Ok(response) => Ok(response),
        Err(err) if RETRY_ONCE && is_retryable(&err) => {
            debug!(url, error = %err, "retrying shard request once");
            client.post(url).json(payload).send().await
        }
        Err(err) => Err(err),
    }
}

/// Result of querying one shard group across its replicas.
#[derive(Debug)]
pub struct ShardCallResult {
    pub shard_id: u32,
    pub ok: bool,
    pub chosen_replica: Option<String>,
    pub attempts: Vec<AttemptMeta>,
    pub response: Option<SearchResponse>,
}

/// Replicas reordered for failover: up first, then suspect, then down,
/// keeping the configured order within each tier.
pub fn order_replicas(replicas: &[String], membership: &Membership) -> Vec<String> {
    let mut ordered: Vec<String> = replicas.to_vec();
    ordered.sort_by_key(|replica| membership.status_of(replica).priority());
    ordered
}

/// Tries a shard group's replicas sequentially until one returns 200.
/// Every attempt is recorded for response metadata; replicas that answer
/// with an error status fail this request only (membership is untouched).
pub async fn query_shard_group(
    client: &Client,
    shard_id: u32,
    replicas: &[String],
    membership: &Membership,
    payload: &InternalSearchRequest,
) -> ShardCallResult {
    let mut attempts: Vec<AttemptMeta> = Vec::new();

    for replica in order_replicas(replicas, membership) {
        let url = format!("{replica}/internal/search");
        let replica_status = membership.status_of(&replica).as_str().to_string();
        let t0 = Instant::now();

        match post_with_retry(client, &url, payload).await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let took_ms = round_ms(t0.elapsed().as_secs_f64() * 1000.0);

                if status_code == 200 {
                    match response.json::<SearchResponse>().await {
                        Ok(body) => {
                            attempts.push(AttemptMeta {
                                replica: replica.clone(),
                                ok: true,
                                status_code: Some(status_code),
                                error: None,
                                took_ms,
                                replica_status,
                            });
                            return ShardCallResult {
                                shard_id,
                                ok: true,
                                chosen_replica: Some(replica),
                                attempts,
                                response: Some(body),
                            };
                        }
                        Err(err) => {
                            warn!(replica = %replica, error = %err, "undecodable shard response");
                            attempts.push(AttemptMeta {
                                replica: replica.clone(),
                                ok: false,
                                status_code: Some(status_code),
                                error: Some(classify_error(&err).to_string()),
                                took_ms,
                                replica_status,
                            });
                        }
                    }
                } else {
                    attempts.push(AttemptMeta {
                        replica: replica.clone(),
                        ok: false,
                        status_code: Some(status_code),
                        error: None,
                        took_ms,
                        replica_status,
                    });
                }
            }
            Err(err) => {
                let took_ms = round_ms(t0.elapsed().as_secs_f64() * 1000.0);
                attempts.push(AttemptMeta {
                    replica: replica.clone(),
                    ok: false,
                    status_code: None,
                    error: Some(classify_error(&err).to_string()),
                    took_ms,
                    replica_status,
                });
            }
        }
    }

    ShardCallResult {
        shard_id,
        ok: false,
        chosen_replica: None,
        attempts,
        response: None,
    }
}

/// Merges successful shard pages into one globally sorted page.
///
/// `total_hits` is the sum over shard totals; items sort by
/// `(-score, doc_id)` independently of shard response order, then the
/// requested page is sliced out.
pub fn merge_shard_pages(
    responses: &[SearchResponse],
    page: usize,
    page_size: usize,
) -> (usize, Vec<SearchItem>) {
    let total_hits = responses.iter().map(|r| r.total_hits).sum();

    let mut merged: Vec<(f64, u64, SearchItem)> = responses
        .iter()
        .flat_map(|r| r.results.iter().cloned())
        .map(|item| (item.score.unwrap_or(0.0), item.doc_id, item))
        .collect();

    merged.sort_by(|a, b| match b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal) {
        Ordering::Equal => a.1.cmp(&b.1),
        other => other,
    });

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(merged.len());
    let items = merged
        .get(start..end)
        .unwrap_or(&[])
        .iter()
        .map(|(_, _, item)| item.clone())
        .collect();

    (total_hits, items)
}
