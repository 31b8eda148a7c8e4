use std::env;

#[derive(Clone)]
pub struct Config {
    // memory:// keeps everything in-process; sqlite: URLs open a file-backed store.
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "memory://".to_string()),
        }
    }
}
