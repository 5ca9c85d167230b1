use crate::constants;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_file: PathBuf,
    pub header_row: usize,
    pub extension: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_file: PathBuf::from("data/output.csv"),
            header_row: constants::HEADER_ROW,
            extension: constants::SPREADSHEET_EXTENSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    pub testing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            environment: "dev".to_string(),
            testing: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://ships.db".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Filesystem path (or `:memory:`) behind a `sqlite://` connection string
    pub fn sqlite_path(&self) -> &str {
        self.url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))
            .unwrap_or(&self.url)
    }
}

impl Config {
    /// Load the TOML file if present, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            info!("Loading config from {}", path.display());
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&content)?
        } else {
            info!("No config file at {}, using defaults", path.display());
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SHIP_DATA_DIR") {
            self.pipeline.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SHIP_OUTPUT_FILE") {
            self.pipeline.output_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = lookup("ENVIRONMENT") {
            self.server.environment = v;
        }
        if let Some(v) = lookup("TESTING") {
            self.server.testing = parse_flag(&v).ok_or(ConfigError::Env {
                key: "TESTING",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v.parse().map_err(|_| ConfigError::Env {
                key: "PORT",
                value: v.clone(),
            })?;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
