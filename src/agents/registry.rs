use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::agents::agent::{
    AgentCategory, AgentId, AgentProfile, AgentResponder, Availability, MockResponder,
    SimulationSettings,
};
use crate::error::{CanvasError, Result};
use crate::events::{CanvasEvent, EventBus};

/// Shape of the remote agent-configuration document.
#[derive(Debug, Deserialize)]
struct RemoteAgentDocument {
    agents: Vec<RemoteAgentEntry>,
}

#[derive(Debug, Deserialize)]
struct RemoteAgentEntry {
    id: String,
    name: String,
    #[serde(rename = "type")]
    category: AgentCategory,
    #[serde(default)]
    capabilities: Vec<String>,
}

/// A registered agent: shared profile plus its responder.
#[derive(Clone)]
pub struct AgentHandle {
    pub profile: Arc<RwLock<AgentProfile>>,
    pub responder: Arc<dyn AgentResponder>,
}

/// In-memory agent map. Registration order is preserved because the
/// routing engine's tie-break depends on it.
pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<AgentId, AgentHandle>>>,
    order: Arc<RwLock<Vec<AgentId>>>,
    presets: RwLock<HashMap<String, Vec<AgentId>>>,
    active_preset: RwLock<Option<String>>,
    settings: SimulationSettings,
    events: EventBus,
    health_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    shutdown_signal: Mutex<Option<broadcast::Sender<()>>>,
}

impl AgentRegistry {
    pub fn new(settings: SimulationSettings, events: EventBus) -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
            order: Arc::new(RwLock::new(Vec::new())),
            presets: RwLock::new(HashMap::new()),
            active_preset: RwLock::new(None),
            settings,
            events,
            health_task: Mutex::new(None),
            shutdown_signal: Mutex::new(None),
        }
    }

    /// Register an agent backed by the built-in mock responder.
    pub async fn register(&self, profile: AgentProfile) -> AgentHandle {
        let category = profile.category;
        let shared = Arc::new(RwLock::new(profile));
        let responder = Arc::new(MockResponder::new(shared.clone(), category, self.settings));
        self.insert(shared, responder).await
    }

    /// Register an agent with a custom responder.
    pub async fn register_with_responder(
        &self,
        profile: AgentProfile,
        responder: Arc<dyn AgentResponder>,
    ) -> AgentHandle {
        let shared = Arc::new(RwLock::new(profile));
        self.insert(shared, responder).await
    }

    async fn insert(
        &self,
        profile: Arc<RwLock<AgentProfile>>,
        responder: Arc<dyn AgentResponder>,
    ) -> AgentHandle {
        let id = profile.read().await.id.clone();
        let handle = AgentHandle { profile, responder };

        let mut agents = self.agents.write().await;
        if agents.insert(id.clone(), handle.clone()).is_none() {
            self.order.write().await.push(id.clone());
        }
        info!("Registered agent {}", id);
        handle
    }

    /// Build the registry from a remote JSON document, falling back to the
    /// embedded default fleet on any fetch or parse failure.
    pub async fn load_or_default(&self, source_url: Option<&str>) -> Result<()> {
        let profiles = match source_url {
            Some(url) => match Self::fetch_remote_agents(url).await {
                Ok(profiles) => {
                    info!("Loaded {} agents from {}", profiles.len(), url);
                    profiles
                }
                Err(e) => {
                    warn!(
                        "Failed to load agent configuration from {}: {}, using defaults",
                        url, e
                    );
                    Self::default_fleet()
                }
            },
            None => Self::default_fleet(),
        };

        for profile in profiles {
            self.register(profile).await;
        }
        Ok(())
    }

    async fn fetch_remote_agents(url: &str) -> Result<Vec<AgentProfile>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CanvasError::NetworkError(e.to_string()))?;

        let document: RemoteAgentDocument = client
            .get(url)
            .send()
            .await
            .map_err(CanvasError::from)?
            .json()
            .await
            .map_err(CanvasError::from)?;

        if document.agents.is_empty() {
            return Err(
                CanvasError::NetworkError("remote agent document is empty".to_string()).into(),
            );
        }

        Ok(document
            .agents
            .into_iter()
            .map(|entry| {
                AgentProfile::new(entry.id, entry.name, entry.category, entry.capabilities)
            })
            .collect())
    }

    /// The embedded fallback fleet.
    pub fn default_fleet() -> Vec<AgentProfile> {
        vec![
            AgentProfile::new(
                "workday",
                "HR Assistant",
                AgentCategory::Hr,
                vec!["hr".to_string()],
            ),
            AgentProfile::new(
                "docs",
                "Knowledge Base",
                AgentCategory::Knowledge,
                vec!["knowledge".to_string()],
            ),
            AgentProfile::new(
                "ledger",
                "Finance Assistant",
                AgentCategory::Finance,
                vec!["finance".to_string()],
            ),
            AgentProfile::new("concierge", "Concierge", AgentCategory::Generic, vec![]),
        ]
    }

    pub async fn get(&self, agent_id: &str) -> Option<AgentHandle> {
        self.agents.read().await.get(agent_id).cloned()
    }

    pub async fn contains(&self, agent_id: &str) -> bool {
        self.agents.read().await.contains_key(agent_id)
    }

    /// All profiles in registration order.
    pub async fn profiles(&self) -> Vec<AgentProfile> {
        let agents = self.agents.read().await;
        let order = self.order.read().await;

        let mut profiles = Vec::with_capacity(order.len());
        for id in order.iter() {
            if let Some(handle) = agents.get(id) {
                profiles.push(handle.profile.read().await.clone());
            }
        }
        profiles
    }

    pub async fn set_enabled(&self, agent_id: &str, enabled: bool) -> Result<()> {
        let handle = self
            .get(agent_id)
            .await
            .ok_or_else(|| CanvasError::AgentNotFound(agent_id.to_string()))?;
        handle.profile.write().await.enabled = enabled;
        Ok(())
    }

    pub async fn set_availability(&self, agent_id: &str, availability: Availability) -> Result<()> {
        let handle = self
            .get(agent_id)
            .await
            .ok_or_else(|| CanvasError::AgentNotFound(agent_id.to_string()))?;

        let changed = {
            let mut profile = handle.profile.write().await;
            let changed = profile.availability != availability;
            profile.availability = availability;
            changed
        };

        if changed {
            self.events.publish(CanvasEvent::AgentStatusChanged {
                agent_id: agent_id.to_string(),
                availability,
            });
        }
        Ok(())
    }

    /// Keep only agents that are enabled and not offline.
    pub async fn filter_eligible(&self, candidates: &[AgentId]) -> Vec<AgentId> {
        let agents = self.agents.read().await;
        let mut eligible = Vec::with_capacity(candidates.len());
        for id in candidates {
            if let Some(handle) = agents.get(id) {
                if handle.profile.read().await.is_eligible() {
                    eligible.push(id.clone());
                }
            }
        }
        eligible
    }

    pub async fn define_preset(&self, name: impl Into<String>, agent_ids: Vec<AgentId>) -> Result<()> {
        let agents = self.agents.read().await;
        for id in &agent_ids {
            if !agents.contains_key(id) {
                return Err(CanvasError::AgentNotFound(id.clone()).into());
            }
        }
        drop(agents);

        self.presets.write().await.insert(name.into(), agent_ids);
        Ok(())
    }

    /// Enable exactly the preset's members and record it as active.
    pub async fn apply_preset(&self, name: &str) -> Result<()> {
        let members = self
            .presets
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CanvasError::ConfigError(format!("Unknown preset '{}'", name)))?;

        let agents = self.agents.read().await;
        for (id, handle) in agents.iter() {
            handle.profile.write().await.enabled = members.contains(id);
        }
        drop(agents);

        *self.active_preset.write().await = Some(name.to_string());
        info!("Applied preset '{}' with {} agents", name, members.len());
        Ok(())
    }

    pub async fn active_preset(&self) -> Option<String> {
        self.active_preset.read().await.clone()
    }

    /// Start the simulated health-check task. Availability drifts randomly
    /// each tick and every change is published as an event.
    pub async fn start_health_simulation(&self, check_interval: Duration) {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        *self.shutdown_signal.lock().await = Some(shutdown_tx);

        let agents = self.agents.clone();
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(check_interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Health simulation task received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let handles: Vec<(AgentId, AgentHandle)> = {
                            let agents_guard = agents.read().await;
                            agents_guard.iter().map(|(id, h)| (id.clone(), h.clone())).collect()
                        };

                        for (agent_id, handle) in handles {
                            let roll: f64 = rand::thread_rng().gen();
                            let mut profile = handle.profile.write().await;
                            let next = next_availability(profile.availability, roll);
                            if next != profile.availability {
                                debug!(
                                    "Agent {} availability {:?} -> {:?}",
                                    agent_id, profile.availability, next
                                );
                                profile.availability = next;
                                drop(profile);
                                events.publish(CanvasEvent::AgentStatusChanged {
                                    agent_id,
                                    availability: next,
                                });
                            }
                        }
                    }
                }
            }
        });

        *self.health_task.lock().await = Some(task);
    }

    pub async fn stop_health_simulation(&self) {
        if let Some(shutdown_tx) = self.shutdown_signal.lock().await.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.health_task.lock().await.take() {
            let _ = task.await;
        }
    }
}

fn next_availability(current: Availability, roll: f64) -> Availability {
    match current {
        Availability::Online => {
            if roll < 0.03 {
                Availability::Offline
            } else if roll < 0.13 {
                Availability::Warning
            } else {
                Availability::Online
            }
        }
        Availability::Warning => {
            if roll < 0.5 {
                Availability::Online
            } else if roll < 0.6 {
                Availability::Offline
            } else {
                Availability::Warning
            }
        }
        Availability::Offline => {
            if roll < 0.6 {
                Availability::Online
            } else {
                Availability::Offline
            }
        }
    }
}
