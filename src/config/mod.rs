pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub base_path: String,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            base_path: String::new(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
        }
    }
}

/// Model provider (OpenRouter-compatible chat-completions endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Blank means "not configured"; chat requests then fail with 503.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub referer_url: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_provider_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.5
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: String::new(),
            model: default_model(),
            referer_url: None,
            app_name: None,
            temperature: default_temperature(),
        }
    }
}

/// Tunables for the continuation loop and the truncation heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationConfig {
    #[serde(default = "default_max_continuations")]
    pub max_continuations: u32,
    #[serde(default = "default_trailing_word_limit")]
    pub trailing_word_limit: usize,
    #[serde(default = "default_mid_word_min_length")]
    pub mid_word_min_length: usize,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_continuation_prompt")]
    pub continuation_prompt: String,
}

fn default_max_continuations() -> u32 {
    3
}
fn default_trailing_word_limit() -> usize {
    50
}
fn default_mid_word_min_length() -> usize {
    100
}
fn default_system_prompt() -> String {
    "You are a helpful AI assistant. Provide clear, concise, and accurate responses.".to_string()
}
fn default_continuation_prompt() -> String {
    "Please continue from where you left off.".to_string()
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            max_continuations: default_max_continuations(),
            trailing_word_limit: default_trailing_word_limit(),
            mid_word_min_length: default_mid_word_min_length(),
            system_prompt: default_system_prompt(),
            continuation_prompt: default_continuation_prompt(),
        }
    }
}

/// Web search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
}

fn default_search_base_url() -> String {
    "https://serpapi.com/search.json".to_string()
}
fn default_summary_max_tokens() -> u32 {
    200
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_base_url(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

impl SearchConfig {
    /// The API key, if one is set and non-blank.
    #[must_use]
    pub fn configured_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// A browser session known to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub token: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub continuation: ContinuationConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
    #[serde(default)]
    pub features: FeaturesConfig,
}

impl AppConfig {
    /// Overlay values from the environment onto the parsed file.
    ///
    /// `lookup` is injected so tests do not touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_blank("OPENROUTER_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(model) = non_blank("OPENROUTER_MODEL") {
            self.provider.model = model;
        }
        if let Some(referer) = non_blank("OPENROUTER_REFERER_URL") {
            self.provider.referer_url = Some(referer);
        }
        if let Some(app_name) = non_blank("OPENROUTER_APP_NAME") {
            self.provider.app_name = Some(app_name);
        }
        if let Some(key) = non_blank("SERPAPI_KEY") {
            self.search.api_key = Some(key);
        }
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let mut config: AppConfig = serde_yaml::from_str(&contents)?;
    config.apply_env_overrides(|name| std::env::var(name).ok());
    validate_config(&config)?;
    Ok(config)
}
