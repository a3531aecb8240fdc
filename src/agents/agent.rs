use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{CanvasError, Result};
use crate::query::synthesis::{AgentReply, Source};

pub type AgentId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentCategory {
    Hr,
    Knowledge,
    Finance,
    Generic,
}

/// Simulated health of an agent. An offline agent is never eligible for
/// routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Online,
    Warning,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    pub category: AgentCategory,
    /// Topic categories this agent serves; consumed by the routing engine.
    pub capabilities: Vec<String>,
    pub availability: Availability,
    pub enabled: bool,
}

impl AgentProfile {
    pub fn new(
        id: impl Into<AgentId>,
        name: impl Into<String>,
        category: AgentCategory,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            capabilities,
            availability: Availability::Online,
            enabled: true,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.enabled && self.availability != Availability::Offline
    }
}

/// Artificial latency and fault injection applied to every mock call.
#[derive(Debug, Clone, Copy)]
pub struct SimulationSettings {
    pub delay_range: (u64, u64), // milliseconds
    pub failure_rate: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            delay_range: (200, 1200),
            failure_rate: 0.05,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentResponder: Send + Sync {
    async fn respond(&self, message: &str) -> Result<AgentReply>;
}

struct CannedReply {
    keywords: &'static [&'static str],
    content: &'static str,
    sources: &'static [(&'static str, &'static str)],
    confidence: f64,
}

/// A mock domain assistant. Picks a canned reply by keyword, sleeps for a
/// fixed-plus-random delay, and fails with the configured probability. No
/// real network I/O happens anywhere in here.
pub struct MockResponder {
    profile: Arc<RwLock<AgentProfile>>,
    settings: SimulationSettings,
    replies: Vec<CannedReply>,
    default_reply: CannedReply,
}

impl MockResponder {
    pub fn new(
        profile: Arc<RwLock<AgentProfile>>,
        category: AgentCategory,
        settings: SimulationSettings,
    ) -> Self {
        let (replies, default_reply) = canned_replies(category);
        Self {
            profile,
            settings,
            replies,
            default_reply,
        }
    }

    fn pick_reply(&self, message: &str) -> &CannedReply {
        let text = message.to_lowercase();
        self.replies
            .iter()
            .find(|reply| reply.keywords.iter().any(|k| text.contains(k)))
            .unwrap_or(&self.default_reply)
    }
}

#[async_trait]
impl AgentResponder for MockResponder {
    async fn respond(&self, message: &str) -> Result<AgentReply> {
        let delay =
            rand::thread_rng().gen_range(self.settings.delay_range.0..=self.settings.delay_range.1);
        sleep(Duration::from_millis(delay)).await;

        // availability is re-read after the delay so a mid-flight status
        // change is observed
        let (agent_id, availability) = {
            let profile = self.profile.read().await;
            (profile.id.clone(), profile.availability)
        };

        if availability == Availability::Offline {
            return Err(CanvasError::AgentOffline(agent_id).into());
        }

        let fault_roll: f64 = rand::thread_rng().gen();
        if fault_roll < self.settings.failure_rate {
            debug!("Agent {} simulating a fault", agent_id);
            return Err(
                CanvasError::AgentFault(format!("{} failed to produce a reply", agent_id)).into(),
            );
        }

        let reply = self.pick_reply(message);
        let mut confidence = reply.confidence;
        if availability == Availability::Warning {
            confidence = (confidence - 0.15).max(0.0);
        }

        Ok(AgentReply {
            content: reply.content.to_string(),
            sources: reply
                .sources
                .iter()
                .map(|(name, description)| Source {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .collect(),
            confidence,
        })
    }
}

fn canned_replies(category: AgentCategory) -> (Vec<CannedReply>, CannedReply) {
    match category {
        AgentCategory::Hr => (
            vec![
                CannedReply {
                    keywords: &["vacation", "pto", "leave", "holiday"],
                    content: "You have 12 vacation days remaining this year. Requests need \
                              manager approval at least two weeks in advance.",
                    sources: &[
                        ("Workday", "Time-off balances and requests"),
                        ("HR Policy Manual", "Leave policy, section 4.2"),
                    ],
                    confidence: 0.92,
                },
                CannedReply {
                    keywords: &["benefits", "insurance", "401k"],
                    content: "Open enrollment runs each November. Current elections are \
                              visible under Benefits in your profile.",
                    sources: &[("Workday", "Benefits enrollment")],
                    confidence: 0.88,
                },
                CannedReply {
                    keywords: &["payroll", "salary", "paycheck"],
                    content: "Payroll runs on the 15th and the last business day of each \
                              month. Payslips are published the day before.",
                    sources: &[("Workday", "Payroll calendar")],
                    confidence: 0.9,
                },
            ],
            CannedReply {
                keywords: &[],
                content: "I can help with vacation, benefits, and payroll questions.",
                sources: &[("Workday", "HR self-service portal")],
                confidence: 0.6,
            },
        ),
        AgentCategory::Knowledge => (
            vec![
                CannedReply {
                    keywords: &["policy", "handbook", "guideline"],
                    content: "The employee handbook covers conduct, travel, and expense \
                              policy. The travel policy was last revised in March.",
                    sources: &[
                        ("Employee Handbook", "Company policies"),
                        ("Policy Wiki", "Revision history"),
                    ],
                    confidence: 0.85,
                },
                CannedReply {
                    keywords: &["document", "wiki", "guide"],
                    content: "Team documentation lives in the shared wiki; search there \
                              first, then ask the owning team's channel.",
                    sources: &[("Policy Wiki", "Team spaces index")],
                    confidence: 0.8,
                },
            ],
            CannedReply {
                keywords: &[],
                content: "I can search company documentation and policies for you.",
                sources: &[("Policy Wiki", "Knowledge base")],
                confidence: 0.55,
            },
        ),
        AgentCategory::Finance => (
            vec![
                CannedReply {
                    keywords: &["expense", "reimburse", "receipt"],
                    content: "Submit expenses within 30 days with receipts attached. \
                              Reimbursement lands with the next payroll run.",
                    sources: &[
                        ("Expense Portal", "Expense submission"),
                        ("Finance FAQ", "Reimbursement timelines"),
                    ],
                    confidence: 0.9,
                },
                CannedReply {
                    keywords: &["budget", "invoice", "cost"],
                    content: "Budget owners approve invoices in the finance portal; \
                              anything over the team threshold is escalated automatically.",
                    sources: &[("Expense Portal", "Approvals queue")],
                    confidence: 0.82,
                },
            ],
            CannedReply {
                keywords: &[],
                content: "I can answer questions about expenses, budgets, and invoices.",
                sources: &[("Finance FAQ", "General finance questions")],
                confidence: 0.58,
            },
        ),
        AgentCategory::Generic => (
            Vec::new(),
            CannedReply {
                keywords: &[],
                content: "I couldn't match that to a specialist, but here is what I \
                          found in the general knowledge base.",
                sources: &[("Search Index", "General workspace search")],
                confidence: 0.5,
            },
        ),
    }
}
