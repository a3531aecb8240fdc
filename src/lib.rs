pub mod agents;
pub mod canvas;
pub mod config;
pub mod error;
pub mod events;
pub mod query;
pub mod storage;

pub use agents::{AgentProfile, AgentRegistry, Availability, QueryOrchestrator};
pub use canvas::WidgetManager;
pub use config::Config;
pub use error::{CanvasError, Result};
pub use events::{CanvasEvent, EventBus};
pub use query::{Query, QueryResponse};
pub use storage::{FileSnapshotStore, Snapshot, SnapshotStore};
