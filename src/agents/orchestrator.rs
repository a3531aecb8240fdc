use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::agent::{AgentId, Availability};
use crate::agents::registry::AgentRegistry;
use crate::config::Config;
use crate::error::{CanvasError, ErrorSurface, Result};
use crate::events::{CanvasEvent, EventBus, NotificationLevel};
use crate::query::cache::ResponseCache;
use crate::query::metrics::{AgentQueryMetrics, MetricsTracker};
use crate::query::routing::{RoutingEngine, RoutingPlan};
use crate::query::synthesis::{synthesize, Contribution, QueryResponse};
use crate::query::Query;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Orchestrator statistics for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub registered_agents: usize,
    pub eligible_agents: usize,
    pub queries_processed: u64,
    pub queries_failed: u64,
    pub cache_entries: usize,
    #[serde(with = "humantime_serde")]
    pub uptime: Duration,
}

/// Runs the full query pipeline: validation, routing, dispatch, synthesis,
/// caching, and metrics. Holds no global state; everything it touches is
/// passed in at construction.
pub struct QueryOrchestrator {
    registry: Arc<AgentRegistry>,
    routing: RwLock<RoutingEngine>,
    cache: Mutex<ResponseCache>,
    metrics: Mutex<MetricsTracker>,
    events: EventBus,
    query_timeout: Duration,
    queries_processed: RwLock<u64>,
    queries_failed: RwLock<u64>,
    start_time: Instant,
}

impl QueryOrchestrator {
    /// Build an orchestrator over an already-populated registry.
    pub async fn new(registry: Arc<AgentRegistry>, config: &Config, events: EventBus) -> Self {
        let mut routing = RoutingEngine::with_builtin_topics(
            config.routing.default_agents.clone(),
            config.routing.max_agents,
        );
        for profile in registry.profiles().await {
            routing.register_agent(profile.id, profile.capabilities);
        }

        Self {
            registry,
            routing: RwLock::new(routing),
            cache: Mutex::new(ResponseCache::new(
                Duration::from_secs(config.cache.ttl_secs),
                config.cache.min_confidence,
            )),
            metrics: Mutex::new(MetricsTracker::new()),
            events,
            query_timeout: Duration::from_secs(config.query.timeout_secs),
            queries_processed: RwLock::new(0),
            queries_failed: RwLock::new(0),
            start_time: Instant::now(),
        }
    }

    /// Process one query end to end.
    pub async fn process_query(&self, query: &Query) -> Result<QueryResponse> {
        let query_id = Uuid::new_v4();

        if query.message.trim().is_empty() {
            return Err(self
                .fail(
                    query_id,
                    &query.widget_id,
                    CanvasError::InvalidQuery("message cannot be empty".to_string()).into(),
                )
                .await);
        }
        if query.widget_id.trim().is_empty() {
            return Err(self
                .fail(
                    query_id,
                    &query.widget_id,
                    CanvasError::InvalidQuery("widget id is required".to_string()).into(),
                )
                .await);
        }

        self.events.publish(CanvasEvent::QueryStarted {
            query_id,
            widget_id: query.widget_id.clone(),
        });

        // candidate selection: explicit subset or keyword routing
        let candidates = match &query.agents {
            Some(explicit) => {
                for id in explicit {
                    if !self.registry.contains(id).await {
                        return Err(self
                            .fail(
                                query_id,
                                &query.widget_id,
                                CanvasError::AgentNotFound(id.clone()).into(),
                            )
                            .await);
                    }
                }
                explicit.clone()
            }
            None => self
                .routing
                .read()
                .await
                .rank(&query.message, &HashSet::new()),
        };

        // offline and disabled agents are never dispatched
        let eligible = self.registry.filter_eligible(&candidates).await;
        if eligible.is_empty() {
            return Err(self
                .fail(
                    query_id,
                    &query.widget_id,
                    CanvasError::NoAgentsAvailable(
                        "no eligible agents for this query".to_string(),
                    )
                    .into(),
                )
                .await);
        }

        let cache_key = ResponseCache::cache_key(&query.message, &eligible);
        if let Some(mut cached) = self.cache.lock().await.lookup(&cache_key) {
            cached.from_cache = true;
            *self.queries_processed.write().await += 1;
            self.events.publish(CanvasEvent::QueryCompleted {
                query_id,
                widget_id: query.widget_id.clone(),
                from_cache: true,
                synthesized: cached.synthesized,
            });
            return Ok(cached);
        }

        let plan = RoutingPlan::new(eligible, self.query_timeout);
        info!(
            "Dispatching query {} to {:?} ({:?})",
            query_id, plan.agents, plan.strategy
        );

        let (mut contributions, failures) = self.dispatch(&plan, &query.message).await;

        if contributions.is_empty() {
            match self.reroute(&plan, &query.message, &failures).await {
                Some(rerouted) => contributions = rerouted,
                None => {
                    // single-agent plans propagate the agent's own error;
                    // multi-agent plans collapse into the aggregate failure
                    let error: BoxedError = if plan.agents.len() == 1 {
                        failures
                            .into_iter()
                            .next()
                            .map(|(_, e)| e)
                            .unwrap_or_else(|| CanvasError::AllAgentsFailed.into())
                    } else {
                        CanvasError::AllAgentsFailed.into()
                    };
                    return Err(self.fail(query_id, &query.widget_id, error).await);
                }
            }
        }

        let response = synthesize(contributions);

        self.cache.lock().await.store(cache_key, &response);
        *self.queries_processed.write().await += 1;
        self.events.publish(CanvasEvent::QueryCompleted {
            query_id,
            widget_id: query.widget_id.clone(),
            from_cache: false,
            synthesized: response.synthesized,
        });

        Ok(response)
    }

    /// Fan out over the plan's agents. Each branch settles independently;
    /// a failing agent never aborts its siblings.
    async fn dispatch(
        &self,
        plan: &RoutingPlan,
        message: &str,
    ) -> (Vec<Contribution>, Vec<(AgentId, BoxedError)>) {
        let calls = plan
            .agents
            .iter()
            .map(|id| self.call_agent(id.clone(), message));
        let outcomes = futures::future::join_all(calls).await;

        let mut contributions = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(contribution) => contributions.push(contribution),
                Err((agent_id, error)) => {
                    warn!("Agent {} failed to respond: {}", agent_id, error);
                    failures.push((agent_id, error));
                }
            }
        }
        (contributions, failures)
    }

    async fn call_agent(
        &self,
        agent_id: AgentId,
        message: &str,
    ) -> std::result::Result<Contribution, (AgentId, BoxedError)> {
        let handle = match self.registry.get(&agent_id).await {
            Some(handle) => handle,
            None => {
                return Err((
                    agent_id.clone(),
                    CanvasError::AgentNotFound(agent_id).into(),
                ))
            }
        };
        let agent_name = handle.profile.read().await.name.clone();

        let start = Instant::now();
        let result = handle.responder.respond(message).await;
        let latency = start.elapsed();

        let mut metrics = self.metrics.lock().await;
        match result {
            Ok(reply) => {
                metrics.record_success(&agent_id, latency);
                Ok(Contribution {
                    agent_id,
                    agent_name,
                    reply,
                })
            }
            Err(error) => {
                metrics.record_failure(&agent_id);
                Err((agent_id, error))
            }
        }
    }

    /// One-shot reroute for queries whose agents dropped offline while the
    /// call was in flight. Returns the alternative contributions, or None
    /// when the query has to be abandoned.
    async fn reroute(
        &self,
        plan: &RoutingPlan,
        message: &str,
        failures: &[(AgentId, BoxedError)],
    ) -> Option<Vec<Contribution>> {
        let mut any_offline = false;
        for (agent_id, _) in failures {
            if let Some(handle) = self.registry.get(agent_id).await {
                if handle.profile.read().await.availability == Availability::Offline {
                    any_offline = true;
                    break;
                }
            }
        }
        if !any_offline {
            return None;
        }

        let exclude: HashSet<AgentId> = plan.agents.iter().cloned().collect();
        let alternatives = self.routing.read().await.rank(message, &exclude);
        let eligible = self.registry.filter_eligible(&alternatives).await;
        if eligible.is_empty() {
            warn!("No alternative agents available, abandoning query");
            return None;
        }

        info!("Rerouting query to {:?}", eligible);
        let retry_plan = RoutingPlan::new(eligible, plan.timeout);
        let (contributions, _) = self.dispatch(&retry_plan, message).await;
        if contributions.is_empty() {
            None
        } else {
            Some(contributions)
        }
    }

    async fn fail(&self, query_id: Uuid, widget_id: &str, error: BoxedError) -> BoxedError {
        *self.queries_failed.write().await += 1;
        self.events.publish(CanvasEvent::QueryFailed {
            query_id,
            widget_id: widget_id.to_string(),
            error: error.to_string(),
        });

        // toast-surfaced failures also raise a notification
        if let Some(canvas_error) = error.downcast_ref::<CanvasError>() {
            if canvas_error.surface() == ErrorSurface::Toast {
                self.events.publish(CanvasEvent::Notification {
                    level: NotificationLevel::Error,
                    message: error.to_string(),
                });
            }
        }
        error
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let profiles = self.registry.profiles().await;
        let eligible = profiles.iter().filter(|p| p.is_eligible()).count();

        OrchestratorStatus {
            registered_agents: profiles.len(),
            eligible_agents: eligible,
            queries_processed: *self.queries_processed.read().await,
            queries_failed: *self.queries_failed.read().await,
            cache_entries: self.cache.lock().await.len(),
            uptime: self.start_time.elapsed(),
        }
    }

    pub async fn metrics_snapshot(&self) -> Vec<AgentQueryMetrics> {
        self.metrics.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CanvasEvent> {
        self.events.subscribe()
    }
}
