use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_SHARD_PORT: u16 = 8001;
pub const DEFAULT_COORDINATOR_PORT: u16 = 9000;
pub const DEFAULT_ROUTER_PORT: u16 = 9500;

const DEFAULT_SHARD_URLS: &str = "http://127.0.0.1:8001,http://127.0.0.1:8002";
const DEFAULT_COORDINATOR_URLS: &str = "http://127.0.0.1:9000";

/// Shard id to ordered replica base URLs. A BTreeMap keeps shard iteration
/// in id order for readiness reporting.
pub type ShardGroups = BTreeMap<u32, Vec<String>>;

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_port(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// Splits a comma-separated URL list, trimming whitespace and trailing
/// slashes.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

/// Parses a topology string of the form
/// `"0=http://a:8001,http://a:8003;1=http://b:8002"` into shard groups.
pub fn parse_shard_groups(raw: &str) -> Result<ShardGroups> {
    let mut groups = ShardGroups::new();
    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (left, right) = part
            .split_once('=')
            .with_context(|| format!("shard group entry without '=': {part:?}"))?;
        let shard_id: u32 = left
            .trim()
            .parse()
            .with_context(|| format!("invalid shard id in {part:?}"))?;
        let urls = parse_url_list(right);
        if urls.is_empty() {
            bail!("shard group {shard_id} has no replica urls");
        }
        groups.insert(shard_id, urls);
    }
    if groups.is_empty() {
        bail!("no shard groups configured");
    }
    Ok(groups)
}

/// Resolves the shard topology: `SHARD_GROUPS` is authoritative, with
/// `SHARD_URLS` (one replica per shard, shard id = list position) as the
/// fallback.
pub fn shard_groups_from_env() -> Result<ShardGroups> {
    if let Ok(raw) = env::var("SHARD_GROUPS") {
        if !raw.trim().is_empty() {
            return parse_shard_groups(&raw);
        }
    }

    let urls = parse_url_list(&env_string("SHARD_URLS", DEFAULT_SHARD_URLS));
    if urls.is_empty() {
        bail!("SHARD_URLS resolved to an empty list");
    }
    Ok(urls
        .into_iter()
        .enumerate()
        .map(|(i, url)| (i as u32, vec![url]))
        .collect())
}

/// Environment of one shard replica process.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    pub shard_id: u32,
    pub num_shards: u32,
    pub replica_id: u32,
    pub port: u16,
    pub corpus_path: PathBuf,
    pub synonyms_path: Option<PathBuf>,
}

impl ShardConfig {
    pub fn from_env() -> Self {
        ShardConfig {
            shard_id: env_u32("SHARD_ID", 0),
            num_shards: env_u32("NUM_SHARDS", 1),
            replica_id: env_u32("REPLICA_ID", 0),
            port: env_port("PORT", DEFAULT_SHARD_PORT),
            corpus_path: PathBuf::from(env_string("CORPUS_PATH", "data/movies.json")),
            synonyms_path: env::var("SYNONYMS_PATH").ok().map(PathBuf::from),
        }
    }
}

/// Environment of one coordinator process.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub port: u16,
    pub shard_groups: ShardGroups,
}

impl CoordinatorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(CoordinatorConfig {
            port: env_port("PORT", DEFAULT_COORDINATOR_PORT),
            shard_groups: shard_groups_from_env()?,
        })
    }
}

/// Environment of one router process.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub port: u16,
    pub coordinator_urls: Vec<String>,
}

impl RouterConfig {
    pub fn from_env() -> Result<Self> {
        let urls = parse_url_list(&env_string("COORDINATOR_URLS", DEFAULT_COORDINATOR_URLS));
        if urls.is_empty() {
            bail!("COORDINATOR_URLS resolved to an empty list");
        }
        Ok(RouterConfig {
            port: env_port("PORT", DEFAULT_ROUTER_PORT),
            coordinator_urls: urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_list_trims_and_strips_slashes() {
        assert_eq!(
            parse_url_list(" http://a:8001/ , http://b:8002 ,, "),
            vec!["http://a:8001", "http://b:8002"]
        );
    }

    #[test]
    fn test_parse_shard_groups_two_groups() {
        let groups =
            parse_shard_groups("0=http://a:8001,http://a:8003;1=http://b:8002/").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&0], vec!["http://a:8001", "http://a:8003"]);
        assert_eq!(groups[&1], vec!["http://b:8002"]);
    }

    #[test]
    fn test_parse_shard_groups_rejects_malformed() {
        assert!(parse_shard_groups("nonsense").is_err());
        assert!(parse_shard_groups("x=http://a:8001").is_err());
        assert!(parse_shard_groups("0=").is_err());
        assert!(parse_shard_groups("").is_err());
    }

    #[test]
    fn test_parse_shard_groups_ignores_empty_segments() {
        let groups = parse_shard_groups("0=http://a:8001;;").unwrap();
        assert_eq!(groups.len(), 1);
    }
}
