use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agents::AgentId;

/// How the dispatcher executes a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel,
}

/// Agent subset and execution strategy chosen for one query. Ephemeral,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingPlan {
    pub agents: Vec<AgentId>,
    pub strategy: ExecutionStrategy,
    /// Carried as configuration for reporting; individual agent calls are
    /// not cancelled against it.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl RoutingPlan {
    pub fn new(agents: Vec<AgentId>, timeout: Duration) -> Self {
        let strategy = if agents.len() > 1 {
            ExecutionStrategy::Parallel
        } else {
            ExecutionStrategy::Sequential
        };
        Self {
            agents,
            strategy,
            timeout,
        }
    }
}

/// Maps free-text queries to ranked candidate agents by keyword scoring.
///
/// Both tables are ordered: ties in the final ranking are broken by the
/// registration order of the agent-capability table.
pub struct RoutingEngine {
    category_keywords: Vec<(String, Vec<String>)>,
    agent_capabilities: Vec<(AgentId, Vec<String>)>,
    default_agents: Vec<AgentId>,
    max_agents: usize,
}

impl RoutingEngine {
    pub fn new(
        category_keywords: Vec<(String, Vec<String>)>,
        default_agents: Vec<AgentId>,
        max_agents: usize,
    ) -> Self {
        Self {
            category_keywords,
            agent_capabilities: Vec::new(),
            default_agents,
            max_agents,
        }
    }

    /// The built-in topic table used when no custom one is supplied.
    pub fn with_builtin_topics(default_agents: Vec<AgentId>, max_agents: usize) -> Self {
        Self::new(builtin_category_keywords(), default_agents, max_agents)
    }

    /// Register the categories an agent serves. Registration order is the
    /// ranking tie-break.
    pub fn register_agent(&mut self, agent_id: AgentId, categories: Vec<String>) {
        if let Some(entry) = self
            .agent_capabilities
            .iter_mut()
            .find(|(id, _)| *id == agent_id)
        {
            entry.1 = categories;
        } else {
            self.agent_capabilities.push((agent_id, categories));
        }
    }

    pub fn unregister_agent(&mut self, agent_id: &str) {
        self.agent_capabilities.retain(|(id, _)| id != agent_id);
    }

    /// Rank candidate agents for a query. Case-insensitive substring
    /// matching; every keyword hit in a category scores every agent
    /// serving that category. Returns at most `max_agents` agents, or the
    /// default pair (minus exclusions) when no category matched at all.
    pub fn rank(&self, query_text: &str, exclude: &HashSet<AgentId>) -> Vec<AgentId> {
        let text = query_text.to_lowercase();

        let mut scores = vec![0u32; self.agent_capabilities.len()];
        let mut any_category_hit = false;

        for (category, keywords) in &self.category_keywords {
            let hits = keywords
                .iter()
                .filter(|keyword| text.contains(keyword.as_str()))
                .count() as u32;
            if hits == 0 {
                continue;
            }
            any_category_hit = true;

            for (index, (_, capabilities)) in self.agent_capabilities.iter().enumerate() {
                if capabilities.iter().any(|c| c == category) {
                    scores[index] += hits;
                }
            }
        }

        if !any_category_hit {
            let fallback: Vec<AgentId> = self
                .default_agents
                .iter()
                .filter(|id| !exclude.contains(*id))
                .cloned()
                .collect();
            debug!("No topic keywords matched, falling back to default agents");
            return fallback;
        }

        let mut ranked: Vec<(usize, u32)> = scores
            .iter()
            .enumerate()
            .filter(|(index, score)| {
                **score > 0 && !exclude.contains(&self.agent_capabilities[*index].0)
            })
            .map(|(index, score)| (index, *score))
            .collect();

        // stable sort keeps registration order on equal scores
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(self.max_agents);

        ranked
            .into_iter()
            .map(|(index, _)| self.agent_capabilities[index].0.clone())
            .collect()
    }
}

fn builtin_category_keywords() -> Vec<(String, Vec<String>)> {
    let table: [(&str, &[&str]); 3] = [
        (
            "hr",
            &["vacation", "pto", "leave", "benefits", "payroll", "holiday"],
        ),
        (
            "knowledge",
            &["policy", "document", "handbook", "wiki", "guide"],
        ),
        (
            "finance",
            &["expense", "invoice", "budget", "reimburse", "cost"],
        ),
    ];

    table
        .iter()
        .map(|(category, keywords)| {
            (
                category.to_string(),
                keywords.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect()
}
