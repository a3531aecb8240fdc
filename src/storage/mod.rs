use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agents::AgentProfile;
use crate::canvas::Widget;
use crate::error::{CanvasError, Result};

/// Fixed key the workspace snapshot is stored under.
const SNAPSHOT_FILE: &str = "workspace_snapshot.json";

/// Point-in-time copy of the workspace, also the export/import format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub widgets: Vec<Widget>,
    pub agents: Vec<AgentProfile>,
    pub active_preset: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        widgets: Vec<Widget>,
        agents: Vec<AgentProfile>,
        active_preset: Option<String>,
    ) -> Self {
        Self {
            widgets,
            agents,
            active_preset,
            saved_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait SnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
    async fn load(&self) -> Result<Option<Snapshot>>;
    async fn export_to(&self, snapshot: &Snapshot, path: &Path) -> Result<()>;
    async fn import_from(&self, path: &Path) -> Result<Snapshot>;
}

/// Snapshot persistence under a fixed key in a local directory, standing
/// in for the original browser key-value storage.
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            CanvasError::StorageError(format!("Failed to create snapshot directory: {}", e))
        })?;
        Ok(())
    }

    fn parse_snapshot(content: &str) -> Result<Snapshot> {
        let snapshot: Snapshot = serde_json::from_str(content)
            .map_err(|e| CanvasError::StorageError(format!("Invalid snapshot JSON: {}", e)))?;

        // imported documents are validated before they replace state
        for agent in &snapshot.agents {
            if agent.id.trim().is_empty() {
                return Err(CanvasError::StorageError(
                    "snapshot contains an agent with an empty id".to_string(),
                )
                .into());
            }
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        self.ensure_root()?;

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| CanvasError::StorageError(format!("Snapshot serialization failed: {}", e)))?;

        fs::write(self.snapshot_path(), json)
            .map_err(|e| CanvasError::StorageError(format!("Failed to write snapshot: {}", e)))?;

        debug!(
            "Saved workspace snapshot ({} widgets, {} agents)",
            snapshot.widgets.len(),
            snapshot.agents.len()
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| CanvasError::StorageError(format!("Failed to read snapshot: {}", e)))?;
        let snapshot = Self::parse_snapshot(&content)?;

        info!("Loaded workspace snapshot from {:?}", path);
        Ok(Some(snapshot))
    }

    async fn export_to(&self, snapshot: &Snapshot, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| CanvasError::StorageError(format!("Snapshot serialization failed: {}", e)))?;

        fs::write(path, json)
            .map_err(|e| CanvasError::StorageError(format!("Failed to export snapshot: {}", e)))?;

        info!("Exported workspace snapshot to {:?}", path);
        Ok(())
    }

    async fn import_from(&self, path: &Path) -> Result<Snapshot> {
        let content = fs::read_to_string(path)
            .map_err(|e| CanvasError::StorageError(format!("Failed to read import file: {}", e)))?;
        let snapshot = Self::parse_snapshot(&content)?;

        // an import becomes the new persisted workspace
        self.save(&snapshot).await?;

        info!("Imported workspace snapshot from {:?}", path);
        Ok(snapshot)
    }
}
