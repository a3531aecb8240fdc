#[cfg(test)]
mod tests {
    use crate::agents::agent::{
        AgentCategory, AgentProfile, AgentResponder, Availability, MockAgentResponder,
        SimulationSettings,
    };
    use crate::agents::orchestrator::QueryOrchestrator;
    use crate::agents::registry::AgentRegistry;
    use crate::config::Config;
    use crate::error::{CanvasError, Result};
    use crate::events::EventBus;
    use crate::query::synthesis::AgentReply;
    use crate::query::Query;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn fast_settings() -> SimulationSettings {
        SimulationSettings {
            delay_range: (1, 2),
            failure_rate: 0.0,
        }
    }

    async fn setup() -> (Arc<AgentRegistry>, QueryOrchestrator) {
        let events = EventBus::default();
        let registry = Arc::new(AgentRegistry::new(fast_settings(), events.clone()));
        registry.load_or_default(None).await.unwrap();
        let orchestrator = QueryOrchestrator::new(registry.clone(), &Config::default(), events).await;
        (registry, orchestrator)
    }

    fn failing_responder() -> MockAgentResponder {
        let mut mock = MockAgentResponder::new();
        mock.expect_respond()
            .returning(|_| Err(CanvasError::AgentFault("boom".to_string()).into()));
        mock
    }

    fn downcast(error: &Box<dyn std::error::Error + Send + Sync>) -> &CanvasError {
        error
            .downcast_ref::<CanvasError>()
            .expect("expected a CanvasError")
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (_registry, orchestrator) = setup().await;

        let error = orchestrator
            .process_query(&Query::new("   ", "widget-1"))
            .await
            .unwrap_err();
        assert!(matches!(downcast(&error), CanvasError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_missing_widget_id_is_rejected() {
        let (_registry, orchestrator) = setup().await;

        let error = orchestrator
            .process_query(&Query::new("hello", ""))
            .await
            .unwrap_err();
        assert!(matches!(downcast(&error), CanvasError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_vacation_query_is_answered_by_hr_agent() {
        let (_registry, orchestrator) = setup().await;

        let response = orchestrator
            .process_query(&Query::new("How many vacation days do I have?", "widget-1"))
            .await
            .unwrap();

        assert_eq!(response.contributing_agents, vec!["workday".to_string()]);
        assert!(!response.synthesized);
        assert!(!response.from_cache);
        assert!(response.content.contains("vacation days"));
    }

    #[tokio::test]
    async fn test_unknown_explicit_agent_is_rejected() {
        let (_registry, orchestrator) = setup().await;

        let query =
            Query::new("hello", "widget-1").with_agents(vec!["ghost".to_string()]);
        let error = orchestrator.process_query(&query).await.unwrap_err();
        assert!(matches!(downcast(&error), CanvasError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn test_offline_agents_never_reach_dispatch() {
        let (registry, orchestrator) = setup().await;

        registry
            .set_availability("workday", Availability::Offline)
            .await
            .unwrap();

        let query = Query::new("How many vacation days do I have?", "widget-1")
            .with_agents(vec!["workday".to_string()]);
        let error = orchestrator.process_query(&query).await.unwrap_err();
        assert!(matches!(downcast(&error), CanvasError::NoAgentsAvailable(_)));

        // the offline agent never recorded a query
        assert!(orchestrator
            .metrics_snapshot()
            .await
            .iter()
            .all(|m| m.total_queries == 0));
    }

    #[tokio::test]
    async fn test_identical_query_is_served_from_cache() {
        let (_registry, orchestrator) = setup().await;
        let query = Query::new("How many vacation days do I have?", "widget-1");

        let first = orchestrator.process_query(&query).await.unwrap();
        assert!(!first.from_cache);

        let second = orchestrator.process_query(&query).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.content, first.content);
    }

    #[tokio::test]
    async fn test_multi_agent_query_is_synthesized() {
        let (_registry, orchestrator) = setup().await;

        let query = Query::new("What is the vacation policy?", "widget-1")
            .with_agents(vec!["workday".to_string(), "docs".to_string()])
            .with_context(serde_json::json!({ "locale": "en" }));
        let response = orchestrator.process_query(&query).await.unwrap();

        assert!(response.synthesized);
        assert_eq!(response.contributing_agents.len(), 2);
        assert!(response.content.contains("HR Assistant"));
        assert!(response.content.contains("Knowledge Base"));
    }

    #[tokio::test]
    async fn test_all_agents_failing_is_an_aggregate_failure() {
        let events = EventBus::default();
        let registry = Arc::new(AgentRegistry::new(fast_settings(), events.clone()));
        registry
            .register_with_responder(
                AgentProfile::new("a", "A", AgentCategory::Generic, vec![]),
                Arc::new(failing_responder()),
            )
            .await;
        registry
            .register_with_responder(
                AgentProfile::new("b", "B", AgentCategory::Generic, vec![]),
                Arc::new(failing_responder()),
            )
            .await;
        let orchestrator = QueryOrchestrator::new(registry, &Config::default(), events).await;

        let query =
            Query::new("hello", "widget-1").with_agents(vec!["a".to_string(), "b".to_string()]);
        let error = orchestrator.process_query(&query).await.unwrap_err();
        assert!(matches!(downcast(&error), CanvasError::AllAgentsFailed));
    }

    #[tokio::test]
    async fn test_single_agent_failure_propagates_verbatim() {
        let events = EventBus::default();
        let registry = Arc::new(AgentRegistry::new(fast_settings(), events.clone()));
        registry
            .register_with_responder(
                AgentProfile::new("a", "A", AgentCategory::Generic, vec![]),
                Arc::new(failing_responder()),
            )
            .await;
        let orchestrator = QueryOrchestrator::new(registry, &Config::default(), events).await;

        let query = Query::new("hello", "widget-1").with_agents(vec!["a".to_string()]);
        let error = orchestrator.process_query(&query).await.unwrap_err();
        assert!(matches!(downcast(&error), CanvasError::AgentFault(_)));
    }

    #[tokio::test]
    async fn test_partial_failure_still_synthesizes() {
        let events = EventBus::default();
        let registry = Arc::new(AgentRegistry::new(fast_settings(), events.clone()));
        registry
            .register(AgentProfile::new(
                "workday",
                "HR Assistant",
                AgentCategory::Hr,
                vec!["hr".to_string()],
            ))
            .await;
        registry
            .register_with_responder(
                AgentProfile::new("b", "B", AgentCategory::Generic, vec![]),
                Arc::new(failing_responder()),
            )
            .await;
        let orchestrator = QueryOrchestrator::new(registry, &Config::default(), events).await;

        let query = Query::new("vacation?", "widget-1")
            .with_agents(vec!["workday".to_string(), "b".to_string()]);
        let response = orchestrator.process_query(&query).await.unwrap();

        // the failing sibling is excluded, not fatal
        assert_eq!(response.contributing_agents, vec!["workday".to_string()]);
        assert!(!response.synthesized);
    }

    /// Marks its own profile offline and fails, reproducing an agent that
    /// drops out while a call is in flight.
    #[derive(Default)]
    struct OfflineFlip {
        profile: std::sync::Mutex<Option<Arc<RwLock<AgentProfile>>>>,
    }

    #[async_trait]
    impl AgentResponder for OfflineFlip {
        async fn respond(&self, _message: &str) -> Result<AgentReply> {
            let profile = {
                self.profile
                    .lock()
                    .unwrap()
                    .clone()
                    .expect("profile wired up")
            };
            let agent_id = {
                let mut guard = profile.write().await;
                guard.availability = Availability::Offline;
                guard.id.clone()
            };
            Err(CanvasError::AgentOffline(agent_id).into())
        }
    }

    #[tokio::test]
    async fn test_midflight_offline_agent_triggers_one_shot_reroute() {
        let events = EventBus::default();
        let registry = Arc::new(AgentRegistry::new(fast_settings(), events.clone()));

        let flip = Arc::new(OfflineFlip::default());
        let handle = registry
            .register_with_responder(
                AgentProfile::new(
                    "workday",
                    "HR Assistant",
                    AgentCategory::Hr,
                    vec!["hr".to_string()],
                ),
                flip.clone(),
            )
            .await;
        *flip.profile.lock().unwrap() = Some(handle.profile.clone());

        registry
            .register(AgentProfile::new(
                "backup",
                "HR Backup",
                AgentCategory::Hr,
                vec!["hr".to_string()],
            ))
            .await;

        let orchestrator = QueryOrchestrator::new(registry, &Config::default(), events).await;

        let query = Query::new("How many vacation days do I have?", "widget-1")
            .with_agents(vec!["workday".to_string()]);
        let response = orchestrator.process_query(&query).await.unwrap();

        assert_eq!(response.contributing_agents, vec!["backup".to_string()]);
    }

    #[tokio::test]
    async fn test_abandoned_when_no_reroute_alternative_exists() {
        let events = EventBus::default();
        let registry = Arc::new(AgentRegistry::new(fast_settings(), events.clone()));

        let flip = Arc::new(OfflineFlip::default());
        let handle = registry
            .register_with_responder(
                AgentProfile::new(
                    "workday",
                    "HR Assistant",
                    AgentCategory::Hr,
                    vec!["hr".to_string()],
                ),
                flip.clone(),
            )
            .await;
        *flip.profile.lock().unwrap() = Some(handle.profile.clone());

        let orchestrator = QueryOrchestrator::new(registry, &Config::default(), events).await;

        let query = Query::new("How many vacation days do I have?", "widget-1")
            .with_agents(vec!["workday".to_string()]);
        let error = orchestrator.process_query(&query).await.unwrap_err();
        assert!(matches!(downcast(&error), CanvasError::AgentOffline(_)));
    }

    #[tokio::test]
    async fn test_status_counts_processed_and_failed_queries() {
        let (_registry, orchestrator) = setup().await;

        orchestrator
            .process_query(&Query::new("vacation?", "widget-1"))
            .await
            .unwrap();
        let _ = orchestrator.process_query(&Query::new("", "widget-1")).await;

        let status = orchestrator.status().await;
        assert_eq!(status.queries_processed, 1);
        assert_eq!(status.queries_failed, 1);
        assert_eq!(status.registered_agents, 4);
    }
}
