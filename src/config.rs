use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{BoxLensError, BoxLensResult};

pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_PROMPT: &str = "Return bounding boxes as JSON arrays as name of object and its bounding boxes [ymin, xmin, ymax, xmax]. like 'name_1':  [ymin, xmin, ymax, xmax]";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Seconds before an in-flight model request is abandoned.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert("gemini".to_string(), ProviderEntry::gemini());
        Self {
            active_provider: "gemini".to_string(),
            providers,
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider.
    pub model: String,
    /// Models offered for selection; the default model need not be listed.
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// "gemini" for Google's generateContent API, None for OpenAI-compatible
    pub adapter: Option<String>,
    /// Optional API key stored in config.toml (env var BOXLENS_<ID>_API_KEY wins).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ProviderEntry {
    fn gemini() -> Self {
        Self {
            display_name: "Google Gemini".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-pro".to_string(),
            models: vec![
                "gemini-1.5-pro-exp-0827".to_string(),
                "gemini-1.5-pro".to_string(),
                "gemini-1.5-flash-exp-0827".to_string(),
                "gemini-1.5-flash-8b-exp-0827".to_string(),
            ],
            temperature: default_temperature(),
            adapter: Some("gemini".to_string()),
            api_key: None,
        }
    }
}

fn default_temperature() -> f64 {
    0.1
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Font files tried in order; the built-in bitmap font is used if none load.
    #[serde(default = "default_font_files")]
    pub font_files: Vec<PathBuf>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_outline_width")]
    pub outline_width: u32,
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u32,
    /// Hex colours (`#rrggbb`) cycled per box. Empty means random colours.
    #[serde(default)]
    pub palette: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_files: default_font_files(),
            font_size: default_font_size(),
            outline_width: default_outline_width(),
            max_image_size: default_max_image_size(),
            palette: Vec::new(),
        }
    }
}

fn default_font_files() -> Vec<PathBuf> {
    vec![PathBuf::from("NotoSansCJK-Regular.ttc")]
}

fn default_font_size() -> f32 {
    20.0
}

fn default_outline_width() -> u32 {
    3
}

fn default_max_image_size() -> u32 {
    800
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_prompt")]
    pub detect: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            detect: default_prompt(),
        }
    }
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn resolve_config_path() -> BoxLensResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("boxlens").join(CONFIG_FILE_NAME);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config directory");
            return Ok(candidate);
        }
    }

    Err(BoxLensError::Config(
        "config.toml not found next to executable, in working directory or user config directory"
            .into(),
    ))
}

pub fn load_config_from(path: &Path) -> BoxLensResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn load_config() -> BoxLensResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

/// Load the explicit path if given, otherwise search the usual locations and
/// fall back to built-in defaults when no file exists.
pub fn load_config_or_default(explicit: Option<&Path>) -> BoxLensResult<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }
    match load_config() {
        Ok(cfg) => Ok(cfg),
        Err(BoxLensError::Config(reason)) => {
            tracing::debug!(%reason, "using built-in default config");
            Ok(AppConfig::default())
        }
        Err(e) => Err(e),
    }
}

pub fn save_config(config: &AppConfig, path: &Path) -> BoxLensResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
