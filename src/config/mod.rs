use anyhow::{Context, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::ProviderKind;

pub const CREDENTIAL_VAR: &str = "OPENROUTER_API_KEY";
pub const DATABASE_VAR: &str = "DATABASE_URL";
pub const MODEL_VAR: &str = "MOCKUP_MODEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: String,
    pub provider: ProviderKind,
    pub model: String,
    /// Overrides the provider's default endpoint when set.
    pub api_base: Option<String>,
    pub timeout_secs: u64,
    pub bind: String,
    pub database_url: Option<String>,
    pub artifacts_root: String,
    pub save_transcripts: bool,
    pub site_url: String,
    pub site_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: "2025-12-01".into(),
            provider: ProviderKind::OpenRouter,
            model: "mistralai/devstral-2512:free".into(),
            api_base: None,
            timeout_secs: 300,
            bind: "127.0.0.1:3000".into(),
            database_url: None,
            artifacts_root: ".".into(),
            save_transcripts: false,
            site_url: "http://localhost:3000".into(),
            site_title: "UI/UX Mockup Generator".into(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let s = fs::read_to_string(p)?;
                toml::from_str::<Config>(&s).with_context(|| format!("parsing {}", p))?
            }
            None => Config::default(),
        };
        if let Some(url) = non_empty_var(DATABASE_VAR) {
            cfg.database_url = Some(url);
        }
        if let Some(model) = non_empty_var(MODEL_VAR) {
            cfg.model = model;
        }
        Ok(cfg)
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or_else(|| self.provider.default_base())
    }

    pub fn artifacts_root(&self) -> &Path {
        Path::new(&self.artifacts_root)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// What the process environment makes available to the pipeline. Read once at
/// startup and injected, so degradation decisions never touch the environment.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentCapabilities {
    pub model_credential: Option<String>,
    pub database_url: Option<String>,
}

impl EnvironmentCapabilities {
    pub fn from_env(cfg: &Config) -> Self {
        Self {
            model_credential: std::env::var(CREDENTIAL_VAR).ok(),
            database_url: cfg.database_url.clone().or_else(|| non_empty_var(DATABASE_VAR)),
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.model_credential.as_deref()
    }
}
