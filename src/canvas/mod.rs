use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{CanvasError, Result};
use crate::events::{CanvasEvent, EventBus};

const MIN_WIDTH: u32 = 200;
const MIN_HEIGHT: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Chat,
    DocumentUpload,
    Workflow,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// A panel on the canvas. Pure state; rendering happens elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Widget {
    pub id: Uuid,
    pub kind: WidgetKind,
    pub title: String,
    pub position: Position,
    pub size: Size,
    /// Arbitrary per-widget configuration blob.
    pub config: serde_json::Value,
    pub pinned: bool,
    pub minimized: bool,
    pub created_at: DateTime<Utc>,
}

/// Owns all widgets on the canvas. The only cross-widget invariant is id
/// uniqueness.
pub struct WidgetManager {
    widgets: HashMap<Uuid, Widget>,
    events: EventBus,
}

impl WidgetManager {
    pub fn new(events: EventBus) -> Self {
        Self {
            widgets: HashMap::new(),
            events,
        }
    }

    pub fn create(
        &mut self,
        kind: WidgetKind,
        title: impl Into<String>,
        position: Position,
        size: Size,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let widget = Widget {
            id,
            kind,
            title: title.into(),
            position,
            size: clamp_size(size),
            config: serde_json::Value::Null,
            pinned: false,
            minimized: false,
            created_at: Utc::now(),
        };
        info!("Created {:?} widget {}", kind, id);
        self.widgets.insert(id, widget);
        self.events.publish(CanvasEvent::WidgetCreated {
            widget_id: id,
            kind,
        });
        id
    }

    pub fn move_widget(&mut self, id: Uuid, position: Position) -> Result<()> {
        let widget = self.get_mut(id)?;
        widget.position = position;
        Ok(())
    }

    pub fn resize(&mut self, id: Uuid, size: Size) -> Result<()> {
        let widget = self.get_mut(id)?;
        widget.size = clamp_size(size);
        Ok(())
    }

    pub fn configure(&mut self, id: Uuid, config: serde_json::Value) -> Result<()> {
        let widget = self.get_mut(id)?;
        widget.config = config;
        Ok(())
    }

    pub fn set_pinned(&mut self, id: Uuid, pinned: bool) -> Result<()> {
        let widget = self.get_mut(id)?;
        widget.pinned = pinned;
        Ok(())
    }

    pub fn toggle_minimized(&mut self, id: Uuid) -> Result<bool> {
        let widget = self.get_mut(id)?;
        widget.minimized = !widget.minimized;
        Ok(widget.minimized)
    }

    pub fn close(&mut self, id: Uuid) -> Result<()> {
        if self.widgets.remove(&id).is_none() {
            return Err(CanvasError::WidgetError(format!("Widget {} not found", id)).into());
        }
        info!("Closed widget {}", id);
        self.events.publish(CanvasEvent::WidgetClosed { widget_id: id });
        Ok(())
    }

    pub fn widget(&self, id: Uuid) -> Option<&Widget> {
        self.widgets.get(&id)
    }

    pub fn widgets(&self) -> Vec<&Widget> {
        self.widgets.values().collect()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Replace all widgets, used when restoring a snapshot.
    pub fn restore(&mut self, widgets: Vec<Widget>) {
        self.widgets = widgets.into_iter().map(|w| (w.id, w)).collect();
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut Widget> {
        self.widgets
            .get_mut(&id)
            .ok_or_else(|| CanvasError::WidgetError(format!("Widget {} not found", id)).into())
    }
}

fn clamp_size(size: Size) -> Size {
    Size {
        width: size.width.max(MIN_WIDTH),
        height: size.height.max(MIN_HEIGHT),
    }
}
