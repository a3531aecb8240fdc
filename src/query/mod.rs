pub mod cache;
pub mod metrics;
pub mod routing;
pub mod synthesis;

pub use cache::ResponseCache;
pub use metrics::{AgentQueryMetrics, MetricsTracker};
pub use routing::{ExecutionStrategy, RoutingEngine, RoutingPlan};
pub use synthesis::{synthesize, AgentReply, Contribution, QueryResponse, Source};

use serde::{Deserialize, Serialize};

use crate::agents::AgentId;

/// A user-submitted query. Lives only for one routing/dispatch/synthesis
/// cycle and is discarded after delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub message: String,
    pub widget_id: String,
    /// Explicit agent subset; bypasses keyword routing when present.
    pub agents: Option<Vec<AgentId>>,
    pub context: Option<serde_json::Value>,
}

impl Query {
    pub fn new(message: impl Into<String>, widget_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            widget_id: widget_id.into(),
            agents: None,
            context: None,
        }
    }

    pub fn with_agents(mut self, agents: Vec<AgentId>) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}
