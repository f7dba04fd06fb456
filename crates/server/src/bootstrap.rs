//! Startup wiring: config, database, engine client, capability providers.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use parley_agent::capabilities::{HttpCalendarProvider, HttpMailProvider, HttpSearchProvider};
use parley_agent::{CapabilityRegistry, PollPolicy, ProviderError, RunOrchestrator};
use parley_core::config::{AppConfig, ConfigError, LoadOptions};
use parley_db::repositories::SqlConversationRepository;
use parley_db::{connect_with_settings, migrations, DbPool, SqlTurnStore};
use parley_engine::{EngineError, HttpReasoningEngine};

use crate::chat::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub chat_state: AppState,
    pub capability_names: Vec<&'static str>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("engine client setup failed: {0}")]
    Engine(#[source] EngineError),
    #[error("capability provider setup failed: {0}")]
    Provider(#[source] ProviderError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let engine = HttpReasoningEngine::from_config(&config.engine).map_err(BootstrapError::Engine)?;

    let timeout = config.engine.timeout_secs;
    let calendar = HttpCalendarProvider::from_endpoint(&config.providers.calendar, timeout)
        .map_err(BootstrapError::Provider)?;
    let search = HttpSearchProvider::from_endpoint(&config.providers.search, timeout)
        .map_err(BootstrapError::Provider)?;
    let mail = HttpMailProvider::from_endpoint(&config.providers.mail, timeout)
        .map_err(BootstrapError::Provider)?;

    let registry =
        CapabilityRegistry::builtin(Arc::new(calendar), Arc::new(search), Arc::new(mail));
    let capability_names = registry.names();
    info!(
        event_name = "system.bootstrap.capabilities_registered",
        capabilities = ?capability_names,
        "capability registry built"
    );

    let orchestrator = RunOrchestrator::new(
        engine,
        registry,
        Arc::new(SqlTurnStore::new(db_pool.clone())),
        PollPolicy::from_config(&config.engine),
    );

    let chat_state = AppState {
        driver: Arc::new(orchestrator),
        conversations: Arc::new(SqlConversationRepository::new(db_pool.clone())),
    };

    Ok(Application { config, db_pool, chat_state, capability_names })
}

#[cfg(test)]
mod tests {
    use parley_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn in_memory_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_registers_builtin_capabilities() {
        let app = bootstrap(in_memory_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed against an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('conversation', 'message')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema tables should exist after bootstrap");
        assert_eq!(table_count, 2);

        assert_eq!(
            app.capability_names,
            vec!["create_event", "list_events", "send_email", "web_search"]
        );

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_a_non_sqlite_database_url() {
        let result = bootstrap(in_memory_options("postgres://localhost/parley")).await;
        assert!(result.is_err());
    }
}
