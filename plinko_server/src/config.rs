/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub api_key: String,
    pub bind: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://plinko.db".to_string()),
            api_key: std::env::var("API_KEY").unwrap_or_else(|_| "dev-key".into()),
            bind: std::env::var("BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
        }
    }
}
