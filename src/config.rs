use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CampaignError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Gemini,
    /// Offline backends for dry runs; no network calls.
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendKind,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    /// Longest edge a garment upload is downsized to before sending; 0 disables.
    pub max_garment_edge: u32,
    pub request_timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Gemini,
            api_key: None,
            api_base: DEFAULT_API_BASE.into(),
            text_model: DEFAULT_TEXT_MODEL.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            max_garment_edge: 1536,
            request_timeout_secs: None,
        }
    }
}

impl AppConfig {
    /// Optional YAML file first, then the process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        cfg.overlay_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let txt = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&txt).context("Failed to parse config YAML")
    }

    pub fn overlay_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(b) = get("CAMPAIGNGEN_BACKEND") {
            self.backend = match b.to_lowercase().as_str() {
                "gemini" => BackendKind::Gemini,
                "mock" => BackendKind::Mock,
                other => {
                    anyhow::bail!("CAMPAIGNGEN_BACKEND must be 'gemini' or 'mock', got '{other}'")
                }
            };
        }
        if let Some(v) = get("CAMPAIGNGEN_API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = get("CAMPAIGNGEN_TEXT_MODEL") {
            self.text_model = v;
        }
        if let Some(v) = get("CAMPAIGNGEN_IMAGE_MODEL") {
            self.image_model = v;
        }
        if let Some(v) = get("CAMPAIGNGEN_MAX_EDGE") {
            self.max_garment_edge = v.parse().context("CAMPAIGNGEN_MAX_EDGE must be an integer")?;
        }
        if let Some(v) = get("CAMPAIGNGEN_TIMEOUT_SECS") {
            let secs = v.parse().context("CAMPAIGNGEN_TIMEOUT_SECS must be an integer")?;
            self.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn credential(&self) -> Result<&str, CampaignError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(CampaignError::MissingCredential)
    }
}
