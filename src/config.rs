use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::is_websocket_url;

pub const DEFAULT_GATEWAY_URL: &str = "ws://localhost:8765";

const GATEWAY_URL_ENV: &str = "HELM_GATEWAY_URL";
const LOG_FILE_ENV: &str = "HELM_LOG_FILE";
const LOG_LEVEL_ENV: &str = "HELM_LOG_LEVEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway_url: String,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let gateway_url = non_empty_env(GATEWAY_URL_ENV)
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        let log_file = non_empty_env(LOG_FILE_ENV).map(PathBuf::from);
        let log_level = non_empty_env(LOG_LEVEL_ENV).unwrap_or_else(|| "info".to_string());

        Ok(Self {
            gateway_url,
            log_file,
            log_level,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !is_websocket_url(&self.gateway_url) {
            bail!(
                "Invalid {GATEWAY_URL_ENV} '{}': expected a ws:// or wss:// URL",
                self.gateway_url
            );
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
