//! Configuration loading, validation, and management for Lectern.
//!
//! Loads configuration from `~/.lectern/config.toml` with environment
//! variable overrides. Numeric settings are validated at load; the enumerated
//! agent modes are kept as strings and parsed where they are used, so an
//! unknown value fails the operation that needs it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
///
/// Maps directly to `~/.lectern/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Run loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Course catalog location
    #[serde(default)]
    pub courses: CoursesConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "deepseek/deepseek-chat".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("gateway", &self.gateway)
            .field("courses", &self.courses)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reasoning steps per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// `propagate` or `capture`
    #[serde(default = "default_tool_error_mode")]
    pub tool_error_mode: String,

    /// `reject` or `queue`
    #[serde(default = "default_session_policy")]
    pub session_policy: String,

    /// `discard` or `partial`
    #[serde(default = "default_cancel_save")]
    pub cancel_save: String,

    /// `tutor` or `evaluator`
    #[serde(default = "default_toolset")]
    pub toolset: String,

    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Whole-run limit in seconds, 0 disables it
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Per-tool limit in seconds, 0 disables it
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_iterations() -> usize {
    25
}
fn default_tool_error_mode() -> String {
    "propagate".into()
}
fn default_session_policy() -> String {
    "reject".into()
}
fn default_cancel_save() -> String {
    "discard".into()
}
fn default_toolset() -> String {
    "tutor".into()
}
fn default_run_timeout() -> u64 {
    300
}
fn default_tool_timeout() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_error_mode: default_tool_error_mode(),
            session_policy: default_session_policy(),
            cancel_save: default_cancel_save(),
            toolset: default_toolset(),
            system_prompt: None,
            run_timeout_secs: default_run_timeout(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

impl AgentConfig {
    pub fn tool_error_mode(&self) -> Result<ToolErrorMode, ConfigError> {
        self.tool_error_mode.parse()
    }

    pub fn session_policy(&self) -> Result<SessionPolicy, ConfigError> {
        self.session_policy.parse()
    }

    pub fn cancel_save(&self) -> Result<CancelSave, ConfigError> {
        self.cancel_save.parse()
    }

    pub fn toolset(&self) -> Result<Toolset, ConfigError> {
        self.toolset.parse()
    }

    pub fn run_timeout(&self) -> Option<std::time::Duration> {
        (self.run_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.run_timeout_secs))
    }

    pub fn tool_timeout(&self) -> Option<std::time::Duration> {
        (self.tool_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.tool_timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Browser origin allowed by CORS (the local frontend)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_cors_origin() -> String {
    "http://localhost:5173".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origin: default_cors_origin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoursesConfig {
    /// Directory holding `<slug>/<slug>.md` files and an optional `index.toml`
    #[serde(default = "default_courses_dir")]
    pub data_dir: PathBuf,
}

fn default_courses_dir() -> PathBuf {
    AppConfig::config_dir().join("courses")
}

impl Default for CoursesConfig {
    fn default() -> Self {
        Self {
            data_dir: default_courses_dir(),
        }
    }
}

/// What a failing tool does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolErrorMode {
    /// The run fails
    #[default]
    Propagate,
    /// The error becomes a tool-response message and the run continues
    Capture,
}

/// What a second run on a busy session does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    #[default]
    Reject,
    Queue,
}

/// What a cancelled run writes back to the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelSave {
    #[default]
    Discard,
    Partial,
}

/// Which tools the agent gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Toolset {
    #[default]
    Tutor,
    Evaluator,
}

fn unknown_mode(setting: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError::UnknownMode {
        setting: setting.into(),
        value: value.into(),
        expected: expected.into(),
    }
}

impl FromStr for ToolErrorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "propagate" => Ok(Self::Propagate),
            "capture" => Ok(Self::Capture),
            other => Err(unknown_mode("tool_error_mode", other, "propagate, capture")),
        }
    }
}

impl FromStr for SessionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Self::Reject),
            "queue" => Ok(Self::Queue),
            other => Err(unknown_mode("session_policy", other, "reject, queue")),
        }
    }
}

impl FromStr for CancelSave {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discard" => Ok(Self::Discard),
            "partial" => Ok(Self::Partial),
            other => Err(unknown_mode("cancel_save", other, "discard, partial")),
        }
    }
}

impl FromStr for Toolset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tutor" => Ok(Self::Tutor),
            "evaluator" => Ok(Self::Evaluator),
            other => Err(unknown_mode("toolset", other, "tutor, evaluator")),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.lectern/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `LECTERN_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `DEEPSEEK_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("LECTERN_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("LECTERN_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("LECTERN_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".lectern")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "default_max_tokens must be > 0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            gateway: GatewayConfig::default(),
            courses: CoursesConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown {setting} '{value}' (expected one of: {expected})")]
    UnknownMode {
        setting: String,
        value: String,
        expected: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.agent.max_iterations, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.agent.toolset, "tutor");
        assert_eq!(parsed.courses.data_dir, config.courses.data_dir);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let err = AppConfig::from_toml_str("[agent]\nmax_iterations = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn load_from_file_reads_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "deepseek"
default_model = "deepseek-chat"

[agent]
tool_error_mode = "capture"
session_policy = "queue"
toolset = "evaluator"
run_timeout_secs = 0

[gateway]
port = 9100

[courses]
data_dir = "/srv/courses"

[providers.deepseek]
api_key = "sk-test"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "deepseek");
        assert_eq!(config.agent.tool_error_mode().unwrap(), ToolErrorMode::Capture);
        assert_eq!(config.agent.session_policy().unwrap(), SessionPolicy::Queue);
        assert_eq!(config.agent.toolset().unwrap(), Toolset::Evaluator);
        assert_eq!(config.agent.cancel_save().unwrap(), CancelSave::Discard);
        assert!(config.agent.run_timeout().is_none());
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.courses.data_dir, PathBuf::from("/srv/courses"));
        assert!(config.has_api_key());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_provider = [").unwrap();
        match AppConfig::load_from(&path).unwrap_err() {
            ConfigError::ParseError { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_mode_fails_at_use_not_at_load() {
        let config = AppConfig::from_toml_str("[agent]\nsession_policy = \"shove\"\n").unwrap();
        let err = config.agent.session_policy().unwrap_err();
        assert!(err.to_string().contains("shove"));
        assert!(err.to_string().contains("reject, queue"));
    }

    #[test]
    fn api_keys_are_redacted_in_debug() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other".into()),
                api_url: None,
                default_model: None,
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("sk-other"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("propagate"));
    }
}
