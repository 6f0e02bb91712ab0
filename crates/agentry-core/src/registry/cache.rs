//! In-process agent record cache.
//!
//! A concurrency-safe map shared across all request-handling workers,
//! injected into handlers rather than reached as ambient global state.
//! Hydrated from the durable store at startup; disposable (no teardown);
//! never authoritative on its own -- the store wins on any disagreement.

use dashmap::DashMap;

use agentry_types::agent::AgentRecord;
use agentry_types::domain::DomainKey;

/// Concurrency-safe cache of agent records keyed by domain key.
///
/// Writers publish fully-formed records only; readers never observe a
/// partially-initialized entry.
#[derive(Default)]
pub struct AgentCache {
    entries: DashMap<DomainKey, AgentRecord>,
}

impl AgentCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// O(1) lookup, no I/O.
    pub fn get(&self, key: &DomainKey) -> Option<AgentRecord> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Publish a complete record, replacing any previous entry for its key.
    pub fn publish(&self, record: AgentRecord) {
        self.entries.insert(record.domain_key.clone(), record);
    }

    /// Drop the entry for a key (e.g. after a detected store mismatch when
    /// the store no longer has the record).
    pub fn evict(&self, key: &DomainKey) {
        self.entries.remove(key);
    }

    /// Replace the cache contents with records loaded from the store.
    pub fn hydrate(&self, records: Vec<AgentRecord>) {
        self.entries.clear();
        for record in records {
            self.publish(record);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_types::agent::DeploymentStatus;

    fn record(domain: &str) -> AgentRecord {
        AgentRecord::provisioning(DomainKey::derive(domain), format!("agent-{domain}"))
    }

    #[test]
    fn test_get_miss_then_hit() {
        let cache = AgentCache::new();
        let key = DomainKey::derive("example.com");
        assert!(cache.get(&key).is_none());

        cache.publish(record("example.com"));
        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.agent_id, "agent-example.com");
    }

    #[test]
    fn test_publish_replaces() {
        let cache = AgentCache::new();
        let key = DomainKey::derive("example.com");
        cache.publish(record("example.com"));

        let mut updated = record("example.com");
        updated.status = DeploymentStatus::Running;
        cache.publish(updated);

        assert_eq!(cache.get(&key).unwrap().status, DeploymentStatus::Running);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hydrate_replaces_contents() {
        let cache = AgentCache::new();
        cache.publish(record("stale.com"));

        cache.hydrate(vec![record("a.com"), record("b.com")]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&DomainKey::derive("stale.com")).is_none());
    }

    #[test]
    fn test_evict() {
        let cache = AgentCache::new();
        let key = DomainKey::derive("example.com");
        cache.publish(record("example.com"));
        cache.evict(&key);
        assert!(cache.get(&key).is_none());
    }
}
