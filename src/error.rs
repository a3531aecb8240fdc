use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No agents available: {0}")]
    NoAgentsAvailable(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent {0} is not online")]
    AgentOffline(String),

    #[error("All agents failed to respond")]
    AllAgentsFailed,

    #[error("Agent fault: {0}")]
    AgentFault(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Widget error: {0}")]
    WidgetError(String),
}

/// Where a failure is surfaced to the user. Nothing here is fatal and
/// nothing is retried automatically; the user resubmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSurface {
    /// Rendered as an entry in the originating widget's transcript.
    ChatInline,
    /// Raised as a notification toast.
    Toast,
    /// Logged only, no user-visible message.
    LogOnly,
}

impl CanvasError {
    pub fn surface(&self) -> ErrorSurface {
        match self {
            CanvasError::InvalidQuery(_) => ErrorSurface::ChatInline,
            CanvasError::NoAgentsAvailable(_) => ErrorSurface::ChatInline,
            CanvasError::AgentNotFound(_) => ErrorSurface::ChatInline,
            CanvasError::AgentOffline(_) => ErrorSurface::ChatInline,
            CanvasError::AllAgentsFailed => ErrorSurface::ChatInline,
            CanvasError::AgentFault(_) => ErrorSurface::ChatInline,
            CanvasError::NetworkError(_) => ErrorSurface::Toast,
            CanvasError::StorageError(_) => ErrorSurface::Toast,
            CanvasError::ConfigError(_) => ErrorSurface::Toast,
            CanvasError::WidgetError(_) => ErrorSurface::LogOnly,
        }
    }
}

// Conversion implementations for common error types
impl From<std::io::Error> for CanvasError {
    fn from(err: std::io::Error) -> Self {
        CanvasError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for CanvasError {
    fn from(err: serde_json::Error) -> Self {
        CanvasError::StorageError(err.to_string())
    }
}

impl From<toml::de::Error> for CanvasError {
    fn from(err: toml::de::Error) -> Self {
        CanvasError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for CanvasError {
    fn from(err: reqwest::Error) -> Self {
        CanvasError::NetworkError(err.to_string())
    }
}
