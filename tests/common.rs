use secret_santa::{
    config::Config, domain::models::user::AuthUser, infra::factory::bootstrap_state,
    state::AppState,
};
use uuid::Uuid;

#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    db_filename: Option<String>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let config = Config {
            database_url: "memory://".to_string(),
        };
        let state = bootstrap_state(&config).await;
        Self {
            state,
            db_filename: None,
        }
    }

    pub async fn new_sqlite() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let config = Config {
            database_url: format!("sqlite://{}?mode=rwc", db_filename),
        };
        let state = bootstrap_state(&config).await;
        Self {
            state,
            db_filename: Some(db_filename),
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(name) = &self.db_filename {
            let _ = std::fs::remove_file(name);
            let _ = std::fs::remove_file(format!("{name}-wal"));
            let _ = std::fs::remove_file(format!("{name}-shm"));
        }
    }
}

#[allow(dead_code)]
pub fn auth_user(id: &str, name: &str) -> AuthUser {
    AuthUser {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        display_name: name.to_string(),
    }
}
