pub mod agent;
pub mod orchestrator;
pub mod registry;

mod orchestrator_test;

pub use agent::{
    AgentCategory, AgentId, AgentProfile, AgentResponder, Availability, MockResponder,
    SimulationSettings,
};
pub use orchestrator::{OrchestratorStatus, QueryOrchestrator};
pub use registry::{AgentHandle, AgentRegistry};
