use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::AgentId;

/// Smoothing factor for new latency samples.
const EMA_ALPHA: f64 = 0.2;
/// Response-time penalty scale for the reliability score, in milliseconds.
const RESPONSE_PENALTY_MS: f64 = 1000.0;

/// Rolling per-agent query counters. In-memory only; reset by restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentQueryMetrics {
    pub agent_id: AgentId,
    pub total_queries: u64,
    pub successes: u64,
    /// Exponential moving average of response latency.
    pub avg_response_ms: f64,
    pub error_rate: f64,
    /// Inverted error rate scaled down by a response-time penalty.
    pub reliability: f64,
    pub last_query_time: Option<DateTime<Utc>>,
}

impl AgentQueryMetrics {
    fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            total_queries: 0,
            successes: 0,
            avg_response_ms: 0.0,
            error_rate: 0.0,
            reliability: 1.0,
            last_query_time: None,
        }
    }

    fn recompute_derived(&mut self) {
        self.error_rate = if self.total_queries > 0 {
            1.0 - self.successes as f64 / self.total_queries as f64
        } else {
            0.0
        };
        let time_penalty = 1.0 / (1.0 + self.avg_response_ms / RESPONSE_PENALTY_MS);
        self.reliability = (1.0 - self.error_rate) * time_penalty;
    }
}

/// Bookkeeping for query outcomes across all agents.
pub struct MetricsTracker {
    metrics: HashMap<AgentId, AgentQueryMetrics>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            metrics: HashMap::new(),
        }
    }

    pub fn record_success(&mut self, agent_id: &str, latency: Duration) {
        let entry = self
            .metrics
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentQueryMetrics::new(agent_id.to_string()));

        entry.total_queries += 1;
        entry.successes += 1;
        entry.last_query_time = Some(Utc::now());

        let sample_ms = latency.as_secs_f64() * 1000.0;
        if entry.successes == 1 {
            entry.avg_response_ms = sample_ms;
        } else {
            entry.avg_response_ms =
                EMA_ALPHA * sample_ms + (1.0 - EMA_ALPHA) * entry.avg_response_ms;
        }

        entry.recompute_derived();
    }

    pub fn record_failure(&mut self, agent_id: &str) {
        let entry = self
            .metrics
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentQueryMetrics::new(agent_id.to_string()));

        entry.total_queries += 1;
        entry.last_query_time = Some(Utc::now());
        entry.recompute_derived();
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentQueryMetrics> {
        self.metrics.get(agent_id)
    }

    pub fn snapshot(&self) -> Vec<AgentQueryMetrics> {
        let mut all: Vec<AgentQueryMetrics> = self.metrics.values().cloned().collect();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        all
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}
