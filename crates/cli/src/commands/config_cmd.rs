//! `secretary config` — Configuration commands.

use secretary_config::AppConfig;
use std::path::{Path, PathBuf};
use super::wiring;

const REDACTED: &str = "[REDACTED]";

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = wiring::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", toml::to_string_pretty(&redacted(config))?);
    Ok(())
}

pub fn default() {
    println!("{}", AppConfig::default_toml());
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", resolve_path(config_path).display());
}

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

fn redacted(mut config: AppConfig) -> AppConfig {
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    if config.backend.api_token.is_some() {
        config.backend.api_token = Some(REDACTED.into());
    }
    config
}
