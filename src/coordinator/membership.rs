use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Consecutive probe failures before a replica is considered suspect
pub const SUSPECT_AFTER_FAILURES: u32 = 2;
/// Consecutive probe failures before a replica is considered down
pub const DOWN_AFTER_FAILURES: u32 = 5;

/// Health classification of one replica, derived from its consecutive
/// failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaStatus {
    Up,
    Suspect,
    Down,
}

impl ReplicaStatus {
    /// Failover preference: lower probes first.
    pub fn priority(self) -> u8 {
        match self {
            ReplicaStatus::Up => 0,
            ReplicaStatus::Suspect => 1,
            ReplicaStatus::Down => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReplicaStatus::Up => "up",
            ReplicaStatus::Suspect => "suspect",
            ReplicaStatus::Down => "down",
        }
    }
}

/// Last known probe state of one replica.
///
/// A replica that has never been probed starts suspect and not ready; the
/// first heartbeat outcome settles it.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaState {
    pub status: ReplicaStatus,
    pub consecutive_failures: u32,
    pub last_seen_ts: Option<f64>,
    pub last_rtt_ms: Option<f64>,
    pub ready: bool,
}

impl Default for ReplicaState {
    fn default() -> Self {
        ReplicaState {
            status: ReplicaStatus::Suspect,
            consecutive_failures: 0,
            last_seen_ts: None,
            last_rtt_ms: None,
            ready: false,
        }
    }
}

impl ReplicaState {
    /// Applies a 200 probe: the failure streak resets and the replica is
    /// ready.
    pub fn record_success(&mut self, now_ts: f64, rtt_ms: f64) {
        self.consecutive_failures = 0;
        self.last_seen_ts = Some(now_ts);
        self.last_rtt_ms = Some(rtt_ms);
        self.ready = true;
        self.update_status();
    }

    /// Applies a failed probe. A non-200 response still carries an RTT; a
    /// transport error does not.
    pub fn record_failure(&mut self, rtt_ms: Option<f64>) {
        self.consecutive_failures += 1;
        self.ready = false;
        if let Some(rtt) = rtt_ms {
            self.last_rtt_ms = Some(rtt);
        }
        self.update_status();
    }

    fn update_status(&mut self) {
        self.status = if self.consecutive_failures >= DOWN_AFTER_FAILURES {
            ReplicaStatus::Down
        } else if self.consecutive_failures >= SUSPECT_AFTER_FAILURES {
            ReplicaStatus::Suspect
        } else {
            ReplicaStatus::Up
        };
    }
}

/// Seconds since the Unix epoch, the timestamp unit of `last_seen_ts`.
pub fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Replica membership table.
///
/// Written only by the heartbeat task; request handlers read momentary
/// per-replica snapshots and tolerate slight staleness.
#[derive(Debug, Default)]
pub struct Membership {
    replicas: DashMap<String, ReplicaState>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a replica with the starting state if it is not yet known.
    pub fn ensure(&self, base_url: &str) {
        self.replicas
            .entry(base_url.to_string())
            .or_default();
    }

    /// Momentary copy of one replica's state.
    pub fn snapshot(&self, base_url: &str) -> Option<ReplicaState> {
        self.replicas.get(base_url).map(|s| s.value().clone())
    }

    /// Current status; unknown replicas read as suspect.
    pub fn status_of(&self, base_url: &str) -> ReplicaStatus {
        self.replicas
            .get(base_url)
            .map(|s| s.status)
            .unwrap_or(ReplicaStatus::Suspect)
    }

    pub fn apply_success(&self, base_url: &str, now_ts: f64, rtt_ms: f64) -> ReplicaStatus {
        let mut state = self.replicas.entry(base_url.to_string()).or_default();
        state.record_success(now_ts, rtt_ms);
        state.status
    }

    pub fn apply_failure(&self, base_url: &str, rtt_ms: Option<f64>) -> ReplicaStatus {
        let mut state = self.replicas.entry(base_url.to_string()).or_default();
        state.record_failure(rtt_ms);
        state.status
    }

    /// Known replica base URLs in sorted order, so one heartbeat tick
    /// probes in a stable sequence.
    pub fn base_urls(&self) -> Vec<String> {
        let mut bases: Vec<String> = self.replicas.iter().map(|e| e.key().clone()).collect();
        bases.sort();
        bases
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_replica_starts_suspect_not_ready() {
        let membership = Membership::new();
        membership.ensure("http://a:8001");
        let state = membership.snapshot("http://a:8001").unwrap();
        assert_eq!(state.status, ReplicaStatus::Suspect);
        assert_eq!(state.consecutive_failures, 0);
        assert!(!state.ready);
    }

    #[test]
    fn test_success_marks_up_and_ready() {
        let membership = Membership::new();
        let status = membership.apply_success("http://a:8001", 1000.0, 3.5);
        assert_eq!(status, ReplicaStatus::Up);
        let state = membership.snapshot("http://a:8001").unwrap();
        assert!(state.ready);
        assert_eq!(state.last_seen_ts, Some(1000.0));
        assert_eq!(state.last_rtt_ms, Some(3.5));
    }

    #[test]
    fn test_failure_thresholds() {
        let membership = Membership::new();
        let base = "http://a:8001";
        assert_eq!(membership.apply_failure(base, None), ReplicaStatus::Up);
        assert_eq!(membership.apply_failure(base, None), ReplicaStatus::Suspect);
        assert_eq!(membership.apply_failure(base, None), ReplicaStatus::Suspect);
        assert_eq!(membership.apply_failure(base, None), ReplicaStatus::Suspect);
        assert_eq!(membership.apply_failure(base, None), ReplicaStatus::Down);
        assert!(!membership.snapshot(base).unwrap().ready);
    }

    #[test]
    fn test_recovery_resets_counter() {
        let membership = Membership::new();
        let base = "http://a:8001";
        for _ in 0..6 {
            membership.apply_failure(base, None);
        }
        assert_eq!(membership.status_of(base), ReplicaStatus::Down);

        let status = membership.apply_success(base, 2000.0, 1.2);
        assert_eq!(status, ReplicaStatus::Up);
        assert_eq!(membership.snapshot(base).unwrap().consecutive_failures, 0);
    }

    #[test]
    fn test_non_200_failure_still_records_rtt() {
        let membership = Membership::new();
        membership.apply_failure("http://a:8001", Some(7.0));
        let state = membership.snapshot("http://a:8001").unwrap();
        assert_eq!(state.last_rtt_ms, Some(7.0));
        assert!(state.last_seen_ts.is_none());
    }

    #[test]
    fn test_status_priority_order() {
        assert!(ReplicaStatus::Up.priority() < ReplicaStatus::Suspect.priority());
        assert!(ReplicaStatus::Suspect.priority() < ReplicaStatus::Down.priority());
    }

    #[test]
    fn test_base_urls_sorted() {
        let membership = Membership::new();
        membership.ensure("http://b:8002");
        membership.ensure("http://a:8001");
        assert_eq!(
            membership.base_urls(),
            vec!["http://a:8001".to_string(), "http://b:8002".to_string()]
        );
    }
}
