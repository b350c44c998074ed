use crate::config::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Sidecar state. Only configuration survives between requests; row data never does.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}
