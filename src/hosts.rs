//! The hosts table: a static-file-backed (optionally redis-augmented)
//! name to address map, consulted before the cache and the resolver.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use hickory_proto::rr::RecordType;
use tokio::sync::RwLock;

use crate::error::ConfigError;

/// Address family a hosts lookup is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn from_qtype(qtype: RecordType) -> Option<Family> {
        match qtype {
            RecordType::A => Some(Family::V4),
            RecordType::AAAA => Some(Family::V6),
            _ => None,
        }
    }

    fn matches(self, addr: &IpAddr) -> bool {
        match (self, addr) {
            (Family::V4, IpAddr::V4(_)) => true,
            (Family::V6, IpAddr::V6(_)) => true,
            _ => false,
        }
    }
}

/// An immutable snapshot of the hosts table. Rebuilt wholesale on refresh and
/// swapped into the shared `RwLock`, never mutated in place.
#[derive(Debug, Default, Clone)]
pub struct HostsTable {
    exact: HashMap<String, Vec<IpAddr>>,
    /// Keyed by the suffix following a single `*.` leading label.
    wildcard: HashMap<String, Vec<IpAddr>>,
}

impl HostsTable {
    /// Merge `remote` entries underneath `self`'s (static) entries: a name
    /// present in both keeps its static addresses.
    pub fn merge_under(mut self, remote: HostsTable) -> Self {
        for (name, addrs) in remote.exact {
            self.exact.entry(name).or_insert(addrs);
        }
        for (name, addrs) in remote.wildcard {
            self.wildcard.entry(name).or_insert(addrs);
        }
        self
    }

    pub fn get(&self, name: &str, family: Family) -> Vec<IpAddr> {
        let name = crate::question::unfqdn(name).to_lowercase();
        if let Some(addrs) = self.exact.get(&name) {
            let matched: Vec<IpAddr> = addrs.iter().filter(|a| family.matches(a)).cloned().collect();
            if !matched.is_empty() {
                return matched;
            }
        }
        if let Some((_, rest)) = name.split_once('.') {
            if let Some(addrs) = self.wildcard.get(rest) {
                return addrs.iter().filter(|a| family.matches(a)).cloned().collect();
            }
        }
        Vec::new()
    }

    fn insert(&mut self, name: &str, addr: IpAddr) {
        let name = name.to_lowercase();
        if let Some(suffix) = name.strip_prefix("*.") {
            self.wildcard.entry(suffix.to_string()).or_default().push(addr);
        } else {
            self.exact.entry(name).or_default().push(addr);
        }
    }
}

/// Parse a conventional hosts file: `<address> <name> [name...]` per line,
/// `#` comments and blank lines ignored.
pub fn parse_hosts_text(text: &str) -> HostsTable {
    let mut table = HostsTable::default();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(addr_field) = fields.next() else {
            continue;
        };
        let Ok(addr) = addr_field.parse::<IpAddr>() else {
            continue;
        };
        for name in fields {
            table.insert(name, addr);
        }
    }
    table
}

pub async fn load_hosts_file(path: &Path) -> Result<HostsTable, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::io(path.display().to_string(), e.to_string()))?;
    Ok(parse_hosts_text(&text))
}

/// Load a name→address map from a redis hash, where each field is a
/// hostname and each value is a comma-separated list of addresses.
pub async fn load_hosts_redis(
    conn: &mut redis::aio::ConnectionManager,
    hash_key: &str,
) -> Result<HostsTable, redis::RedisError> {
    use redis::AsyncCommands;
    let raw: HashMap<String, String> = conn.hgetall(hash_key).await?;
    let mut table = HostsTable::default();
    for (name, value) in raw {
        for addr_str in value.split(',') {
            if let Ok(addr) = addr_str.trim().parse::<IpAddr>() {
                table.insert(&name, addr);
            }
        }
    }
    Ok(table)
}

/// Owns the live hosts snapshot and periodically refreshes it.
pub struct HostsManager {
    table: RwLock<Arc<HostsTable>>,
}

impl HostsManager {
    pub fn new(initial: HostsTable) -> Self {
        HostsManager {
            table: RwLock::new(Arc::new(initial)),
        }
    }

    pub async fn current(&self) -> Arc<HostsTable> {
        self.table.read().await.clone()
    }

    pub async fn swap(&self, table: HostsTable) {
        *self.table.write().await = Arc::new(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_hosts_lines() {
        let table = parse_hosts_text("127.0.0.1 localhost\n::1 localhost\n# comment\n\n10.0.0.5 svc.internal\n");
        assert_eq!(table.get("localhost", Family::V4), vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(table.get("localhost", Family::V6), vec!["::1".parse::<IpAddr>().unwrap()]);
        assert_eq!(table.get("svc.internal", Family::V4), vec!["10.0.0.5".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn wildcard_matches_single_leading_label() {
        let table = parse_hosts_text("10.0.0.9 *.internal.example\n");
        assert_eq!(
            table.get("foo.internal.example", Family::V4),
            vec!["10.0.0.9".parse::<IpAddr>().unwrap()]
        );
        assert!(table.get("internal.example", Family::V4).is_empty());
        assert!(table.get("bar.foo.internal.example", Family::V4).is_empty());
    }

    #[test]
    fn unknown_name_misses() {
        let table = parse_hosts_text("127.0.0.1 localhost\n");
        assert!(table.get("example.com", Family::V4).is_empty());
    }

    #[test]
    fn static_entries_win_over_remote_on_merge() {
        let mut static_table = HostsTable::default();
        static_table.insert("svc.internal", "10.0.0.1".parse().unwrap());
        let mut remote_table = HostsTable::default();
        remote_table.insert("svc.internal", "10.0.0.2".parse().unwrap());
        remote_table.insert("other.internal", "10.0.0.3".parse().unwrap());

        let merged = static_table.merge_under(remote_table);
        assert_eq!(merged.get("svc.internal", Family::V4), vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(merged.get("other.internal", Family::V4), vec!["10.0.0.3".parse::<IpAddr>().unwrap()]);
    }
}
