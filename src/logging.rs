use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const DEFAULT_LOG_PATH: &str = "/tmp/helm-debug.log";

/// Routes tracing output to an append-only file. Stdout and stderr belong
/// to the TUI, so without a usable file target nothing is emitted.
pub fn init(config: &Config) -> Result<()> {
    let Some(path) = resolve_log_path(config) else {
        return Ok(());
    };
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init()
        .ok();
    Ok(())
}

fn resolve_log_path(config: &Config) -> Option<PathBuf> {
    config.log_file.clone().or_else(|| {
        if std::io::stderr().is_terminal() {
            Some(PathBuf::from(DEFAULT_LOG_PATH))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_log_file_wins() {
        let config = Config {
            gateway_url: "ws://localhost:8765".to_string(),
            log_file: Some(PathBuf::from("/tmp/helm-test.log")),
            log_level: "debug".to_string(),
        };
        assert_eq!(
            resolve_log_path(&config),
            Some(PathBuf::from("/tmp/helm-test.log"))
        );
    }
}
