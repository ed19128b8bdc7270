use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub nats_url: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: u32,
    #[serde(default = "default_policy_sync_interval_secs")]
    pub policy_sync_interval_secs: u64,
    #[serde(default = "default_event_prefix")]
    pub event_prefix: String,
    #[serde(default = "default_audit_subject")]
    pub audit_subject: String,
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
}

fn default_worker_count() -> u32 {
    4
}

fn default_policy_sync_interval_secs() -> u64 {
    10
}

fn default_event_prefix() -> String {
    "k8s.event".to_string()
}

fn default_audit_subject() -> String {
    "k8s.audit.>".to_string()
}

fn default_reconnect_cap_ms() -> u64 {
    30_000
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("TRANSLATOR_WORKER_").from_env::<Self>()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            nats_url: "nats://127.0.0.1:4222".to_string(),
            worker_count: default_worker_count(),
            policy_sync_interval_secs: default_policy_sync_interval_secs(),
            event_prefix: default_event_prefix(),
            audit_subject: default_audit_subject(),
            reconnect_cap_ms: default_reconnect_cap_ms(),
        }
    }
}
