use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    #[serde(default)]
    pub max_query_window_hours: i64,
    #[serde(default)]
    pub max_page_size: i64,
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
}

fn default_page_size() -> i64 {
    100
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("QUERY_SERVICE_").from_env::<Self>()
    }

    pub fn query_config(&self) -> activity_query::QueryConfig {
        activity_query::QueryConfig {
            max_query_window: chrono::Duration::hours(self.max_query_window_hours),
            max_page_size: self.max_page_size,
            default_page_size: self.default_page_size,
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8083,
            database_url: String::new(),
            max_query_window_hours: 0,
            max_page_size: 0,
            default_page_size: 100,
        }
    }
}
