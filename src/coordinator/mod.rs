pub mod fanout;
pub mod heartbeat;
pub mod membership;

use crate::config::ShardGroups;
use crate::models::{
    round_ms, ApiResponse, InternalSearchRequest, Meta, SearchResponse, ShardMeta,
};
use futures::future::join_all;
use membership::{Membership, ReplicaStatus};
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Fans queries out to every shard group, merges the partial pages and
/// tracks replica health through a background heartbeat.
pub struct Coordinator {
    shard_groups: Arc<ShardGroups>,
    membership: Arc<Membership>,
    client: Client,
    heartbeat_token: CancellationToken,
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(shard_groups: ShardGroups) -> anyhow::Result<Arc<Self>> {
        let membership = Arc::new(Membership::new());
        for replicas in shard_groups.values() {
            for base in replicas {
                membership.ensure(base);
            }
        }

        Ok(Arc::new(Coordinator {
            shard_groups: Arc::new(shard_groups),
            membership,
            client: fanout::search_client()?,
            heartbeat_token: CancellationToken::new(),
            heartbeat_handle: Mutex::new(None),
        }))
    }

    pub fn shard_groups(&self) -> &ShardGroups {
        &self.shard_groups
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Starts the background heartbeat task.
    pub async fn spawn_heartbeat(self: &Arc<Self>) {
        let handle = tokio::spawn(heartbeat::run_heartbeat(
            Arc::clone(&self.shard_groups),
            Arc::clone(&self.membership),
            self.heartbeat_token.clone(),
        ));
        *self.heartbeat_handle.lock().await = Some(handle);
    }

    /// Asks the heartbeat task to stop and waits for it.
    pub async fn shutdown(&self) {
        self.heartbeat_token.cancel();
        if let Some(handle) = self.heartbeat_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Fans the query out to all shard groups and merges the results into
    /// one globally sorted page.
    pub async fn search(
        &self,
        q: &str,
        page: usize,
        page_size: usize,
        debug: bool,
    ) -> ApiResponse<SearchResponse> {
        let start_time = Instant::now();
        let request_id = new_request_id();

        // each shard is asked for k = page * page_size items; debug is
        // forced so shard items carry the scores the merge needs
        let k = page * page_size;
        let payload = InternalSearchRequest {
            q: q.to_string(),
            page,
            page_size: k,
            debug: true,
        };

        let calls = self.shard_groups.iter().map(|(shard_id, replicas)| {
            fanout::query_shard_group(&self.client, *shard_id, replicas, &self.membership, &payload)
        });
        let call_results = join_all(calls).await;

        let mut shard_meta: Vec<ShardMeta> = Vec::with_capacity(call_results.len());
        let mut shard_responses: Vec<SearchResponse> = Vec::new();
        let mut failed_groups = 0usize;

        for result in call_results {
            shard_meta.push(ShardMeta {
                shard_id: result.shard_id,
                ok: result.ok,
                chosen_replica: result.chosen_replica.clone(),
                attempts: result.attempts,
            });

            match result.response {
                Some(response) => shard_responses.push(response),
                None => {
                    failed_groups += 1;
                    warn!(shard_id = result.shard_id, "all replicas failed for shard group");
                }
            }
        }

        let (total_hits, mut items) = fanout::merge_shard_pages(&shard_responses, page, page_size);

        if !debug {
            for item in &mut items {
                item.score = None;
                item.explanations = None;
            }
        }

        let took_ms = round_ms(start_time.elapsed().as_secs_f64() * 1000.0);
        let status = if failed_groups == 0 { "ok" } else { "partial" };

        ApiResponse {
            status: status.to_string(),
            data: Some(SearchResponse {
                query: q.to_string(),
                total_hits,
                page,
                page_size,
                results: items,
            }),
            meta: Some(Meta {
                page: Some(page),
                page_size: Some(page_size),
                total_hits: Some(total_hits),
                took_ms: Some(took_ms),
                shards: Some(shard_meta),
                request_id: Some(request_id),
            }),
            error: None,
        }
    }

    /// Readiness rule: every shard group needs at least one replica that is
    /// ready and not down. Returns the offending groups otherwise.
    pub fn readiness(&self) -> Result<(), Vec<String>> {
        let mut not_ready_groups: Vec<String> = Vec::new();

        for (shard_id, replicas) in self.shard_groups.iter() {
            let mut any_ready = false;
            let mut details: Vec<String> = Vec::new();

            for replica in replicas {
                match self.membership.snapshot(replica) {
                    Some(state) => {
                        details.push(format!(
                            "{replica} status={} ready={} failures={}",
                            state.status.as_str(),
                            state.ready,
                            state.consecutive_failures
                        ));
                        if state.ready && state.status != ReplicaStatus::Down {
                            any_ready = true;
                        }
                    }
                    None => details.push(format!("{replica} status=unknown ready=false")),
                }
            }

            if !any_ready {
                not_ready_groups.push(format!(
                    "shard {shard_id} has no ready replicas: {}",
                    details.join("; ")
                ));
            }
        }

        if not_ready_groups.is_empty() {
            Ok(())
        } else {
            Err(not_ready_groups)
        }
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> ShardGroups {
        let mut groups = ShardGroups::new();
        groups.insert(0, vec!["http://a:18001".to_string()]);
        groups.insert(
            1,
            vec!["http://b:18002".to_string(), "http://b:18003".to_string()],
        );
        groups
    }

    #[test]
    fn test_new_registers_all_replicas() {
        let coordinator = Coordinator::new(groups()).unwrap();
        assert_eq!(coordinator.membership().len(), 3);
    }

    #[test]
    fn test_readiness_requires_every_group() {
        let coordinator = Coordinator::new(groups()).unwrap();
        // fresh replicas are suspect and not ready
        assert!(coordinator.readiness().is_err());

        coordinator.membership().apply_success("http://a:18001", 1.0, 1.0);
        let err = coordinator.readiness().unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err[0].contains("shard 1"));

        coordinator.membership().apply_success("http://b:18003", 1.0, 1.0);
        assert!(coordinator.readiness().is_ok());
    }

    #[test]
    fn test_readiness_ignores_down_replicas() {
        let coordinator = Coordinator::new(groups()).unwrap();
        coordinator.membership().apply_success("http://a:18001", 1.0, 1.0);
        coordinator.membership().apply_success("http://b:18002", 1.0, 1.0);
        for _ in 0..5 {
            coordinator.membership().apply_failure("http://b:18002", None);
        }
        assert!(coordinator.readiness().is_err());
    }

    #[test]
    fn test_request_id_length() {
        let id = new_request_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
