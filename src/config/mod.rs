use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{CanvasError, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub agents: AgentSettings,
    pub routing: RoutingSettings,
    pub cache: CacheSettings,
    pub query: QuerySettings,
    pub workspace: WorkspaceSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSettings {
    /// Optional URL of a remote JSON agent-configuration document. On any
    /// fetch or parse failure the embedded default list is used instead.
    pub source_url: Option<String>,
    pub health_check_interval_secs: u64,
    pub delay_range: (u64, u64), // milliseconds
    /// Probability in [0, 1] that a simulated agent call faults.
    pub failure_rate: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingSettings {
    /// Upper bound on agents in a routing plan.
    pub max_agents: usize,
    /// Fallback pair returned when no topic keyword matches.
    pub default_agents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    /// Responses at or below this confidence are never cached.
    pub min_confidence: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuerySettings {
    /// Carried in routing plans as configuration; not enforced as a hard
    /// deadline on individual agent calls.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceSettings {
    pub snapshot_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agents: AgentSettings {
                source_url: None,
                health_check_interval_secs: 15,
                delay_range: (200, 1200),
                failure_rate: 0.05,
            },
            routing: RoutingSettings {
                max_agents: 3,
                default_agents: vec!["concierge".to_string(), "docs".to_string()],
            },
            cache: CacheSettings {
                ttl_secs: 300,
                min_confidence: 0.7,
            },
            query: QuerySettings { timeout_secs: 10 },
            workspace: WorkspaceSettings {
                snapshot_dir: PathBuf::from("./workspace_data"),
            },
        }
    }
}

#[async_trait::async_trait]
pub trait ConfigManager {
    async fn load_config(&self) -> Result<Config>;
    async fn save_config(&self, config: &Config) -> Result<()>;
    fn validate_config(&self, config: &Config) -> Result<()>;
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait::async_trait]
impl ConfigManager for FileConfigManager {
    async fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        // check if config file exists, create default if not
        if !self.config_path.exists() {
            warn!(
                "Configuration file not found, creating default config at {:?}",
                self.config_path
            );
            self.create_default_config().await?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| CanvasError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&config_content)
            .map_err(|e| CanvasError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;

        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| CanvasError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| CanvasError::ConfigError(format!("Failed to write config file: {}", e)))?;

        info!("Configuration saved successfully");
        Ok(())
    }

    fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        // checking routing config
        if config.routing.max_agents == 0 {
            return Err(
                CanvasError::ConfigError("max_agents must be greater than 0".to_string()).into(),
            );
        }
        if config.routing.max_agents > 10 {
            return Err(CanvasError::ConfigError(
                "max_agents cannot exceed 10".to_string(),
            )
            .into());
        }
        if config.routing.default_agents.is_empty() {
            return Err(CanvasError::ConfigError(
                "default_agents list cannot be empty".to_string(),
            )
            .into());
        }
        for agent_id in &config.routing.default_agents {
            if agent_id.trim().is_empty() {
                return Err(CanvasError::ConfigError(
                    "default agent id cannot be empty".to_string(),
                )
                .into());
            }
            if agent_id.contains(' ') {
                return Err(CanvasError::ConfigError(format!(
                    "agent id '{}' cannot contain spaces",
                    agent_id
                ))
                .into());
            }
        }

        // checking agent simulation config
        if config.agents.delay_range.0 >= config.agents.delay_range.1 {
            return Err(CanvasError::ConfigError(
                "delay_range minimum must be less than maximum".to_string(),
            )
            .into());
        }
        if config.agents.delay_range.1 > 30000 {
            return Err(CanvasError::ConfigError(
                "delay_range maximum cannot exceed 30 seconds".to_string(),
            )
            .into());
        }
        if !(0.0..=1.0).contains(&config.agents.failure_rate) {
            return Err(CanvasError::ConfigError(
                "failure_rate must be between 0.0 and 1.0".to_string(),
            )
            .into());
        }
        if config.agents.health_check_interval_secs == 0 {
            return Err(CanvasError::ConfigError(
                "health_check_interval_secs must be greater than 0".to_string(),
            )
            .into());
        }

        // checking cache config
        if config.cache.ttl_secs == 0 {
            return Err(
                CanvasError::ConfigError("cache ttl_secs must be greater than 0".to_string())
                    .into(),
            );
        }
        if !(0.0..=1.0).contains(&config.cache.min_confidence) {
            return Err(CanvasError::ConfigError(
                "min_confidence must be between 0.0 and 1.0".to_string(),
            )
            .into());
        }

        // checking query config
        if config.query.timeout_secs == 0 {
            return Err(
                CanvasError::ConfigError("timeout_secs must be greater than 0".to_string()).into(),
            );
        }

        // checking source url if provided
        if let Some(ref url) = config.agents.source_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CanvasError::ConfigError(
                    "source_url must start with http:// or https://".to_string(),
                )
                .into());
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}

impl FileConfigManager {
    /// Create a default configuration file
    async fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config).map_err(|e| {
            CanvasError::ConfigError(format!("Failed to serialize default config: {}", e))
        })?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CanvasError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(&self.config_path, toml_content).map_err(|e| {
            CanvasError::ConfigError(format!("Failed to write default config: {}", e))
        })?;

        info!(
            "Default configuration file created at {:?}",
            self.config_path
        );
        Ok(())
    }
}
