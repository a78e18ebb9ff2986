use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Endpoint of the backing relational store service.
    #[serde(default = "default_store_url")]
    pub store_url: String,
    /// Anonymous API key for the backing store.
    #[serde(default = "default_store_key")]
    pub store_key: String,
    /// Capacity of the change-event broadcast bus.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// How long a just-sent message id is remembered for echo deduplication.
    #[serde(default = "default_echo_ttl_secs")]
    pub echo_ttl_secs: u64,
    /// Session lifetime written to `session_expires_at` on login.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

fn default_store_url() -> String { "http://localhost:54321".into() }
fn default_store_key() -> String { "anon-dev-key".into() }
fn default_event_capacity() -> usize { 4096 }
fn default_echo_ttl_secs() -> u64 { 30 }
fn default_session_ttl_hours() -> i64 { 24 }

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("LUMO").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_else(|_| Self::default()))
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn echo_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.echo_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            store_key: default_store_key(),
            event_capacity: default_event_capacity(),
            echo_ttl_secs: default_echo_ttl_secs(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}
