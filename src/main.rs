use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agent_canvas::agents::{AgentRegistry, QueryOrchestrator, SimulationSettings};
use agent_canvas::canvas::{Position, Size, WidgetKind, WidgetManager};
use agent_canvas::config::{ConfigManager, FileConfigManager};
use agent_canvas::events::EventBus;
use agent_canvas::query::Query;
use agent_canvas::storage::{FileSnapshotStore, Snapshot, SnapshotStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_manager = FileConfigManager::new(PathBuf::from("config.toml"));
    let config = config_manager
        .load_config()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!("Starting agent canvas workspace");

    let events = EventBus::default();
    let registry = Arc::new(AgentRegistry::new(
        SimulationSettings {
            delay_range: config.agents.delay_range,
            failure_rate: config.agents.failure_rate,
        },
        events.clone(),
    ));
    registry
        .load_or_default(config.agents.source_url.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    registry
        .start_health_simulation(Duration::from_secs(config.agents.health_check_interval_secs))
        .await;

    let orchestrator = QueryOrchestrator::new(registry.clone(), &config, events.clone()).await;

    let mut widgets = WidgetManager::new(events.clone());
    let chat_widget = widgets.create(
        WidgetKind::Chat,
        "Assistant",
        Position { x: 40, y: 40 },
        Size {
            width: 420,
            height: 560,
        },
    );

    let demo_queries = [
        "How many vacation days do I have?",
        "Where can I find the travel policy?",
        "How do I submit an expense report?",
    ];

    for message in demo_queries {
        println!("\n> {}", message);
        match orchestrator
            .process_query(&Query::new(message, chat_widget.to_string()))
            .await
        {
            Ok(response) => {
                println!("{}", response.content);
                for source in &response.sources {
                    println!("  [{}] {}", source.name, source.description);
                }
                println!(
                    "  agents: {:?}, confidence {:.2}{}",
                    response.contributing_agents,
                    response.confidence,
                    if response.from_cache { ", cached" } else { "" }
                );
            }
            Err(e) => println!("  error: {}", e),
        }
    }

    println!("\nAgent metrics:");
    for metrics in orchestrator.metrics_snapshot().await {
        println!(
            "  {}: {} queries, avg {:.0}ms, reliability {:.2}",
            metrics.agent_id, metrics.total_queries, metrics.avg_response_ms, metrics.reliability
        );
    }

    // persist the workspace before shutting down
    let store = FileSnapshotStore::new(config.workspace.snapshot_dir.clone());
    let snapshot = Snapshot::new(
        widgets.widgets().into_iter().cloned().collect(),
        registry.profiles().await,
        registry.active_preset().await,
    );
    if let Err(e) = store.save(&snapshot).await {
        tracing::warn!("Failed to save workspace snapshot: {}", e);
    }

    registry.stop_health_simulation().await;
    tracing::info!("Agent canvas workspace stopped.");
    Ok(())
}
