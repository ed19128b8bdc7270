use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub nats_url: String,
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
}

fn default_reconnect_cap_ms() -> u64 {
    30_000
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("REINDEX_SERVICE_").from_env::<Self>()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8084,
            database_url: String::new(),
            nats_url: "nats://127.0.0.1:4222".to_string(),
            reconnect_cap_ms: default_reconnect_cap_ms(),
        }
    }
}
