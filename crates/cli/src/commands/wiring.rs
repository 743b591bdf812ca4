//! Assembles the orchestrator from configuration.

use secretary_agent::{AssistantCache, DefaultRuntimeBuilder, Orchestrator, OrchestratorSettings};
use secretary_backend::NotificationClient;
use secretary_config::{AppConfig, ConfigError};
use secretary_core::event::EventBus;
use secretary_core::history::ThreadStore;
use secretary_memory::{InMemoryThreadStore, SqliteThreadStore};
use secretary_tools::ToolResolver;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load from `path` if given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}

/// Everything a command needs to run turns.
pub struct Wired {
    pub orchestrator: Arc<Orchestrator>,
    pub notifications: Arc<NotificationClient>,
}

pub async fn build(config: &AppConfig) -> Result<Wired, Box<dyn std::error::Error>> {
    let provider = secretary_providers::build_from_config(config)?;
    let (rest, calendar, notifications) = secretary_backend::build_from_config(&config.backend)?;
    let rest = Arc::new(rest);
    let notifications = Arc::new(notifications);
    let history = history_store(config).await?;

    let event_bus = Arc::new(EventBus::default());
    let settings = OrchestratorSettings::from_config(config);
    let revalidate_after = settings.revalidate_after;

    let resolver = ToolResolver::new(Arc::new(calendar), notifications.clone(), rest.clone());
    let builder = DefaultRuntimeBuilder::new(
        provider,
        resolver,
        rest.clone(),
        history,
        settings,
        event_bus.clone(),
    );
    let cache = AssistantCache::new(rest.clone(), Arc::new(builder), event_bus.clone())
        .with_revalidate_after(revalidate_after);
    let orchestrator = Orchestrator::new(rest, Arc::new(cache), event_bus);

    info!(
        provider = %config.provider.name,
        model = %config.provider.default_model,
        history = %config.history.backend,
        "Orchestrator ready"
    );

    Ok(Wired {
        orchestrator: Arc::new(orchestrator),
        notifications,
    })
}

async fn history_store(config: &AppConfig) -> Result<Arc<dyn ThreadStore>, Box<dyn std::error::Error>> {
    if config.history.backend == "memory" {
        return Ok(Arc::new(InMemoryThreadStore::new()));
    }

    let path = config.history_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteThreadStore::new(&format!("sqlite://{}", path.display())).await?;
    Ok(Arc::new(store))
}
