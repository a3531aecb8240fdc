use serde::{Deserialize, Serialize};

use crate::agents::AgentId;

/// A cited source attached to an agent reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub name: String,
    pub description: String,
}

/// One agent's successful answer before synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentReply {
    pub content: String,
    pub sources: Vec<Source>,
    pub confidence: f64,
}

/// An agent reply paired with its attribution.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub reply: AgentReply,
}

/// The final answer delivered to a widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub content: String,
    pub sources: Vec<Source>,
    pub contributing_agents: Vec<AgentId>,
    pub confidence: f64,
    pub synthesized: bool,
    pub from_cache: bool,
}

/// Merge one or more per-agent results into a single response.
///
/// A single contribution passes through unchanged. Multiple contributions
/// are concatenated under attribution labels; sources are de-duplicated by
/// name (first occurrence wins) and confidence is the arithmetic mean.
pub fn synthesize(contributions: Vec<Contribution>) -> QueryResponse {
    if contributions.len() == 1 {
        let contribution = contributions.into_iter().next().expect("checked length");
        return QueryResponse {
            content: contribution.reply.content,
            sources: contribution.reply.sources,
            contributing_agents: vec![contribution.agent_id],
            confidence: contribution.reply.confidence,
            synthesized: false,
            from_cache: false,
        };
    }

    let mut sections = Vec::with_capacity(contributions.len());
    let mut sources: Vec<Source> = Vec::new();
    let mut contributing_agents = Vec::with_capacity(contributions.len());
    let mut confidence_sum = 0.0;
    let count = contributions.len();

    for contribution in contributions {
        sections.push(format!(
            "**{}**\n{}",
            contribution.agent_name, contribution.reply.content
        ));
        confidence_sum += contribution.reply.confidence;
        contributing_agents.push(contribution.agent_id);

        for source in contribution.reply.sources {
            if !sources.iter().any(|s| s.name == source.name) {
                sources.push(source);
            }
        }
    }

    QueryResponse {
        content: sections.join("\n\n"),
        sources,
        contributing_agents,
        confidence: confidence_sum / count as f64,
        synthesized: true,
        from_cache: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str) -> Source {
        Source {
            name: name.to_string(),
            description: format!("{} description", name),
        }
    }

    fn contribution(id: &str, content: &str, sources: Vec<Source>, confidence: f64) -> Contribution {
        Contribution {
            agent_id: id.to_string(),
            agent_name: id.to_uppercase(),
            reply: AgentReply {
                content: content.to_string(),
                sources,
                confidence,
            },
        }
    }

    #[test]
    fn test_single_result_passes_through() {
        let response = synthesize(vec![contribution(
            "workday",
            "You have 12 vacation days left.",
            vec![source("Workday")],
            0.9,
        )]);

        assert_eq!(response.content, "You have 12 vacation days left.");
        assert_eq!(response.contributing_agents, vec!["workday".to_string()]);
        assert_eq!(response.confidence, 0.9);
        assert!(!response.synthesized);
    }

    #[test]
    fn test_sources_deduplicated_first_occurrence_wins() {
        let mut first = source("A");
        first.description = "first".to_string();
        let mut duplicate = source("A");
        duplicate.description = "second".to_string();

        let response = synthesize(vec![
            contribution("one", "x", vec![first, duplicate], 0.8),
            contribution("two", "y", vec![source("A"), source("B")], 0.8),
        ]);

        let names: Vec<&str> = response.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(response.sources[0].description, "first");
    }

    #[test]
    fn test_confidence_is_arithmetic_mean() {
        let response = synthesize(vec![
            contribution("one", "x", vec![], 0.6),
            contribution("two", "y", vec![], 1.0),
        ]);

        assert!((response.confidence - 0.8).abs() < 1e-9);
        assert!(response.synthesized);
    }

    #[test]
    fn test_multi_result_content_carries_attribution() {
        let response = synthesize(vec![
            contribution("one", "first answer", vec![], 0.7),
            contribution("two", "second answer", vec![], 0.7),
        ]);

        assert!(response.content.contains("**ONE**"));
        assert!(response.content.contains("first answer"));
        assert!(response.content.contains("**TWO**"));
        assert!(response.content.contains("second answer"));
        assert_eq!(
            response.contributing_agents,
            vec!["one".to_string(), "two".to_string()]
        );
    }
}
