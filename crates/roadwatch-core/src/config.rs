use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use crate::model::{ANONYMOUS, LatLng};
use crate::photo::DEFAULT_MAX_PHOTO_BYTES;
use crate::store::local::DEFAULT_KEY;

/// Directory holding project state and config.
pub const PROJECT_DIR: &str = ".roadwatch";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub photo: PhotoConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_key")]
    pub key: String,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: default_storage_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,
    #[serde(default = "default_center_lng")]
    pub center_lng: f64,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lng: default_center_lng(),
            zoom: default_zoom(),
        }
    }
}

impl MapConfig {
    /// Configured center, validated.
    pub fn center(&self) -> Result<LatLng> {
        LatLng::new(self.center_lat, self.center_lng).context("Invalid [map] center")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_issue_type")]
    pub default_type: String,
    #[serde(default = "default_issue_types")]
    pub issue_types: Vec<String>,
    #[serde(default = "default_anonymous_name")]
    pub anonymous_name: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_type: default_issue_type(),
            issue_types: default_issue_types(),
            anonymous_name: default_anonymous_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoConfig {
    #[serde(default = "default_max_photo_bytes")]
    pub max_bytes: u64,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_photo_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Reporter identity used when neither `--as` nor `ROADWATCH_USER` is set.
    #[serde(default)]
    pub reporter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("roadwatch/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Render a config as the TOML written by `rw init`.
pub fn render_project_config(config: &ProjectConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize project config")
}

pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn resolve_output(cli_json: bool, user_output: Option<String>, env_format: Option<String>) -> String {
    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn default_storage_key() -> String {
    DEFAULT_KEY.to_string()
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}

const fn default_center_lat() -> f64 {
    19.0896
}

const fn default_center_lng() -> f64 {
    72.8656
}

const fn default_zoom() -> u8 {
    11
}

fn default_issue_type() -> String {
    "Accident".to_string()
}

fn default_issue_types() -> Vec<String> {
    ["Accident", "Pothole", "Waterlogging", "Broken Streetlight", "Other"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_anonymous_name() -> String {
    ANONYMOUS.to_string()
}

const fn default_max_photo_bytes() -> u64 {
    DEFAULT_MAX_PHOTO_BYTES
}
