use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::capture::{Grabber, MonitorGrabber, OsToolGrabber};

/// Environment variable holding the recognition API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub model_name: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    1000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub strategy: CaptureStrategy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStrategy {
    #[default]
    Monitor,
    Ostool,
}

impl CaptureStrategy {
    pub fn grabber(&self) -> Arc<dyn Grabber> {
        match self {
            CaptureStrategy::Monitor => Arc::new(MonitorGrabber),
            CaptureStrategy::Ostool => Arc::new(OsToolGrabber),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o".to_string(),
            max_tokens: 1000,
        }
    }
}

/// The credential must be present at startup; without it no window is
/// created.
pub fn api_key_from_env() -> Result<String> {
    credential_from(API_KEY_ENV)
}

fn credential_from(var: &str) -> Result<String> {
    let key = std::env::var(var)
        .with_context(|| format!("{} is not set; export it before launching", var))?;
    if key.trim().is_empty() {
        anyhow::bail!("{} is set but empty", var);
    }
    Ok(key)
}
