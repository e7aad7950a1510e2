//! Runtime configuration, read once from the environment at startup.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::api::{self, ApiConfig};

pub const DATA_DIR_ENV: &str = "PDM_DATA_DIR";
pub const API_HOST_ENV: &str = "PDM_API_HOST";
pub const API_PORT_ENV: &str = "PDM_API_PORT";
pub const API_TOKEN_ENV: &str = "PDM_API_TOKEN";

pub const DEFAULT_PORT: u16 = 7480;
const TOKEN_FILE: &str = "api_token";
const DB_FILE: &str = "pdm-tickets.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub api: ApiConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = match var(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .context("Could not determine a data directory; set PDM_DATA_DIR")?
                .join("pdm-tickets"),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let host: IpAddr = match var(API_HOST_ENV) {
            Some(host) => host
                .parse()
                .with_context(|| format!("Invalid {}: {}", API_HOST_ENV, host))?,
            None => IpAddr::from([127, 0, 0, 1]),
        };

        let port = match var(API_PORT_ENV) {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid {}: {}", API_PORT_ENV, port))?,
            None => DEFAULT_PORT,
        };

        let token = match var(API_TOKEN_ENV) {
            Some(token) => token,
            None => load_or_create_token(&data_dir)?,
        };

        Ok(Self {
            data_dir,
            api: ApiConfig { host, port, token },
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}

/// Reuses the token persisted in the data directory, generating one on first run.
fn load_or_create_token(data_dir: &Path) -> anyhow::Result<String> {
    let token_path = data_dir.join(TOKEN_FILE);

    if let Ok(token) = std::fs::read_to_string(&token_path) {
        if !token.trim().is_empty() {
            tracing::info!("Using existing API token from {}", token_path.display());
            return Ok(token.trim().to_string());
        }
    }

    tracing::info!("Generating new API token at {}", token_path.display());
    let token = api::generate_token();
    std::fs::write(&token_path, &token)
        .with_context(|| format!("Failed to write API token to {}", token_path.display()))?;
    Ok(token)
}
