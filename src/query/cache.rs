use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::agents::AgentId;
use crate::query::synthesis::QueryResponse;

struct CacheEntry {
    response: QueryResponse,
    stored_at: Instant,
}

/// Memoizes identical (message, agent-set) queries within a TTL window.
///
/// Entries are evicted lazily on lookup; there is no capacity bound. Only
/// responses with confidence above the configured threshold are stored.
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    min_confidence: f64,
}

impl ResponseCache {
    pub fn new(ttl: Duration, min_confidence: f64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            min_confidence,
        }
    }

    /// Key is the digest of the lowercase-trimmed message joined with the
    /// sorted agent-id list, so agent order and message casing don't split
    /// the cache.
    pub fn cache_key(message: &str, agent_ids: &[AgentId]) -> String {
        let mut ids: Vec<&str> = agent_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        let raw = format!("{}|{}", message.trim().to_lowercase(), ids.join(","));
        format!("{:x}", md5::compute(raw))
    }

    pub fn lookup(&mut self, key: &str) -> Option<QueryResponse> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() >= self.ttl,
            None => return None,
        };

        if expired {
            debug!("Response cache entry expired for key {}", key);
            self.entries.remove(key);
            return None;
        }

        debug!("Response cache hit for key {}", key);
        self.entries.get(key).map(|entry| entry.response.clone())
    }

    /// Store a response if it qualifies. Returns whether it was stored.
    pub fn store(&mut self, key: String, response: &QueryResponse) -> bool {
        if response.confidence <= self.min_confidence {
            debug!(
                "Not caching response with confidence {:.2} (threshold {:.2})",
                response.confidence, self.min_confidence
            );
            return false;
        }

        self.entries.insert(
            key,
            CacheEntry {
                response: response.clone(),
                stored_at: Instant::now(),
            },
        );
        true
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

    fn response(confidence: f64) -> QueryResponse {
        QueryResponse {
            content: "answer".to_string(),
            sources: vec![],
            contributing_agents: vec!["workday".to_string()],
            confidence,
            synthesized: false,
            from_cache: false,
        }
    }

    #[test]
    fn test_hit_within_ttl() {
        let mut cache = ResponseCache::new(Duration::from_secs(300), 0.7);
        let key = ResponseCache::cache_key("How many vacation days?", &["workday".to_string()]);

        assert!(cache.store(key.clone(), &response(0.9)));
        let hit = cache.lookup(&key).expect("expected cache hit");
        assert_eq!(hit.content, "answer");
    }

    #[test]
    fn test_expired_entry_is_evicted_on_lookup() {
        let mut cache = ResponseCache::new(Duration::from_millis(10), 0.7);
        let key = ResponseCache::cache_key("msg", &["workday".to_string()]);

        cache.store(key.clone(), &response(0.9));
        std::thread::sleep(Duration::from_millis(25));

        assert!(cache.lookup(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_low_confidence_is_not_cached() {
        let mut cache = ResponseCache::new(Duration::from_secs(300), 0.7);
        let key = ResponseCache::cache_key("msg", &["workday".to_string()]);

        assert!(!cache.store(key.clone(), &response(0.7)));
        assert!(cache.lookup(&key).is_none());
    }

    #[test]
    fn test_key_normalizes_case_whitespace_and_agent_order() {
        let a = ResponseCache::cache_key(
            "  Vacation Days?  ",
            &["workday".to_string(), "docs".to_string()],
        );
        let b = ResponseCache::cache_key(
            "vacation days?",
            &["docs".to_string(), "workday".to_string()],
        );
        assert_eq!(a, b);

        let c = ResponseCache::cache_key("vacation days?", &["workday".to_string()]);
        assert_ne!(a, c);
    }
}
