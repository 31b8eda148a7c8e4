use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::domain::ports::DocumentStore;
use crate::domain::services::event_service::EventService;
use crate::domain::services::invitation_service::InvitationService;
use crate::domain::services::user_service::UserService;
use crate::infra::identity::LocalIdentity;
use crate::infra::stores::memory_store::MemoryStore;
use crate::infra::stores::sqlite_store::SqliteStore;
use crate::state::AppState;

pub async fn bootstrap_state(config: &Config) -> AppState {
    let database_url = &config.database_url;

    let store: Arc<dyn DocumentStore> = if database_url.starts_with("memory://") {
        info!("Initializing in-memory document store...");
        Arc::new(MemoryStore::new())
    } else {
        info!("Initializing SQLite document store with WAL mode...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .expect("Invalid SQLite connection string")
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .expect("Failed to connect to SQLite");

        run_sqlite_migrations(&pool).await;

        Arc::new(SqliteStore::new(pool))
    };

    let identity = Arc::new(LocalIdentity::new());

    AppState {
        config: config.clone(),
        store: store.clone(),
        identity,
        event_service: Arc::new(EventService::new(store.clone())),
        invitation_service: Arc::new(InvitationService::new(store.clone())),
        user_service: Arc::new(UserService::new(store)),
    }
}

async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}
