//! Configuration loading, validation, and management for rolerag.
//!
//! Loads configuration from `~/.rolerag/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use rolerag_core::RoleId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.rolerag/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Embedding and chat model backend
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Where the pre-computed embedding snapshots live
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Retrieval limits and thresholds
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Section-reference matching in generated answers
    #[serde(default)]
    pub fuzzy: FuzzyConfig,

    /// Role tiers and defaults
    #[serde(default)]
    pub roles: RolesConfig,

    /// Role/menu/employee store
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "ollama" for the native Ollama API; anything else is treated as an
    /// OpenAI-compatible endpoint ("openai", "openrouter", "vllm", ...).
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// Override the backend's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// HTTP timeout for a single provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_kind() -> String {
    "ollama".into()
}
fn default_chat_model() -> String {
    "mistral".into()
}
fn default_embed_model() -> String {
    "nomic-embed-text".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: None,
            api_key: None,
            chat_model: default_chat_model(),
            embed_model: default_embed_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("chat_model", &self.chat_model)
            .field("embed_model", &self.embed_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Policy passages snapshot
    #[serde(default = "default_policies_path")]
    pub policies: PathBuf,

    /// JSON field holding the policy text
    #[serde(default = "default_policy_text_field")]
    pub policy_text_field: String,

    /// FAQ snapshot for every employee
    #[serde(default = "default_faq_general")]
    pub faq_general: PathBuf,

    /// FAQ snapshot for managers
    #[serde(default = "default_faq_managerial")]
    pub faq_managerial: PathBuf,

    /// FAQ snapshot for HR staff
    #[serde(default = "default_faq_hr")]
    pub faq_hr: PathBuf,

    /// JSON field holding the FAQ question (the embedded text)
    #[serde(default = "default_faq_text_field")]
    pub faq_text_field: String,

    /// JSON field holding the FAQ answer
    #[serde(default = "default_faq_answer_field")]
    pub faq_answer_field: String,

    /// A missing FAQ file degrades to an empty tier instead of failing.
    #[serde(default = "default_true")]
    pub allow_missing_faqs: bool,
}

fn default_policies_path() -> PathBuf {
    PathBuf::from("data/policy_vectors.json")
}
fn default_policy_text_field() -> String {
    "text".into()
}
fn default_faq_general() -> PathBuf {
    PathBuf::from("data/faq_vectors_emp.json")
}
fn default_faq_managerial() -> PathBuf {
    PathBuf::from("data/faq_vectors_mgr.json")
}
fn default_faq_hr() -> PathBuf {
    PathBuf::from("data/faq_vectors_hr.json")
}
fn default_faq_text_field() -> String {
    "question".into()
}
fn default_faq_answer_field() -> String {
    "answer".into()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            policies: default_policies_path(),
            policy_text_field: default_policy_text_field(),
            faq_general: default_faq_general(),
            faq_managerial: default_faq_managerial(),
            faq_hr: default_faq_hr(),
            faq_text_field: default_faq_text_field(),
            faq_answer_field: default_faq_answer_field(),
            allow_missing_faqs: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Number of policy passages injected into the prompt
    #[serde(default = "default_policy_top_k")]
    pub policy_top_k: usize,

    /// The best FAQ is used only when its score is strictly above this
    #[serde(default = "default_faq_min_score")]
    pub faq_min_score: f32,

    /// Query-relevant sections must score at least this
    #[serde(default = "default_section_min_score")]
    pub section_min_score: f32,

    /// At most this many query-relevant sections
    #[serde(default = "default_section_limit")]
    pub section_limit: usize,

    /// Conversation turns forwarded to the model
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Policy passages are cut to this many characters in the prompt
    #[serde(default = "default_policy_excerpt_chars")]
    pub policy_excerpt_chars: usize,
}

fn default_policy_top_k() -> usize {
    3
}
fn default_faq_min_score() -> f32 {
    0.65
}
fn default_section_min_score() -> f32 {
    0.85
}
fn default_section_limit() -> usize {
    5
}
fn default_history_window() -> usize {
    2
}
fn default_policy_excerpt_chars() -> usize {
    200
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            policy_top_k: default_policy_top_k(),
            faq_min_score: default_faq_min_score(),
            section_min_score: default_section_min_score(),
            section_limit: default_section_limit(),
            history_window: default_history_window(),
            policy_excerpt_chars: default_policy_excerpt_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyConfig {
    /// Character-level normalized edit distance must be below this
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,

    /// Mean per-word distance must also be below this
    #[serde(default = "default_token_cutoff")]
    pub token_cutoff: f64,

    /// Longest word n-gram scanned in the answer
    #[serde(default = "default_max_ngram")]
    pub max_ngram: usize,
}

fn default_max_distance() -> f64 {
    0.2
}
fn default_token_cutoff() -> f64 {
    0.4
}
fn default_max_ngram() -> usize {
    4
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
            token_cutoff: default_token_cutoff(),
            max_ngram: default_max_ngram(),
        }
    }
}

/// What to do with roles that no tier lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaqFallback {
    /// Tiers come only from the tier table.
    #[default]
    None,
    /// A role outside `known_roles` unlocks every FAQ tier.
    UnlistedRolesSeeAll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesConfig {
    /// Roles that unlock the managerial FAQ tier
    #[serde(default = "default_manager_roles")]
    pub manager_roles: Vec<RoleId>,

    /// Roles that unlock the HR FAQ tier
    #[serde(default = "default_hr_roles")]
    pub hr_roles: Vec<RoleId>,

    /// Roles assumed when a request does not send any
    #[serde(default = "default_roles")]
    pub default_roles: Vec<RoleId>,

    #[serde(default)]
    pub faq_fallback: FaqFallback,

    /// Allow-list consulted by `unlisted_roles_see_all`
    #[serde(default = "default_known_roles")]
    pub known_roles: Vec<RoleId>,
}

fn default_manager_roles() -> Vec<RoleId> {
    vec![10, 13]
}
fn default_hr_roles() -> Vec<RoleId> {
    vec![7, 15]
}
fn default_roles() -> Vec<RoleId> {
    vec![2, 10, 7]
}
fn default_known_roles() -> Vec<RoleId> {
    vec![2, 7, 10, 13, 15]
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            manager_roles: default_manager_roles(),
            hr_roles: default_hr_roles(),
            default_roles: default_roles(),
            faq_fallback: FaqFallback::default(),
            known_roles: default_known_roles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// "json" (fixture file) or "sqlite"
    #[serde(default = "default_directory_backend")]
    pub backend: String,

    /// JSON fixture path or SQLite database path
    #[serde(default = "default_directory_path")]
    pub path: String,
}

fn default_directory_backend() -> String {
    "json".into()
}
fn default_directory_path() -> String {
    "data/directory.json".into()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: default_directory_backend(),
            path: default_directory_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Base URL prepended to relative section links
    #[serde(default = "default_platform_base_url")]
    pub platform_base_url: String,

    /// Expose `POST /admin/reload`
    #[serde(default = "default_true")]
    pub enable_reload: bool,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_platform_base_url() -> String {
    "http://localhost".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            platform_base_url: default_platform_base_url(),
            enable_reload: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.rolerag/config.toml).
    ///
    /// Environment overrides are applied last:
    /// - `ROLERAG_PROVIDER`, `ROLERAG_CHAT_MODEL`, `ROLERAG_EMBED_MODEL`
    /// - `ROLERAG_API_KEY` (then `OPENAI_API_KEY`)
    /// - `ROLERAG_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
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

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(kind) = lookup("ROLERAG_PROVIDER") {
            self.provider.kind = kind;
        }
        if let Some(model) = lookup("ROLERAG_CHAT_MODEL") {
            self.provider.chat_model = model;
        }
        if let Some(model) = lookup("ROLERAG_EMBED_MODEL") {
            self.provider.embed_model = model;
        }
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("ROLERAG_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(url) = lookup("ROLERAG_BASE_URL") {
            self.gateway.platform_base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rolerag")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let r = &self.ranking;
        if r.policy_top_k == 0 {
            return Err(ConfigError::ValidationError("ranking.policy_top_k must be > 0".into()));
        }
        for (name, value) in [
            ("ranking.faq_min_score", r.faq_min_score),
            ("ranking.section_min_score", r.section_min_score),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be a cosine similarity in [-1, 1]"
                )));
            }
        }

        let f = &self.fuzzy;
        if !(0.0..=1.0).contains(&f.max_distance) || !(0.0..=1.0).contains(&f.token_cutoff) {
            return Err(ConfigError::ValidationError(
                "fuzzy.max_distance and fuzzy.token_cutoff must be in [0, 1]".into(),
            ));
        }
        if f.max_ngram == 0 {
            return Err(ConfigError::ValidationError("fuzzy.max_ngram must be > 0".into()));
        }

        // The role → tier table must be a function.
        if let Some(role) = self
            .roles
            .manager_roles
            .iter()
            .find(|r| self.roles.hr_roles.contains(r))
        {
            return Err(ConfigError::ValidationError(format!(
                "role {role} is listed as both a manager and an HR role"
            )));
        }

        if !matches!(self.directory.backend.as_str(), "json" | "sqlite") {
            return Err(ConfigError::ValidationError(format!(
                "directory.backend must be \"json\" or \"sqlite\", got \"{}\"",
                self.directory.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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
}

impl From<ConfigError> for rolerag_core::Error {
    fn from(err: ConfigError) -> Self {
        rolerag_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.kind, "ollama");
        assert_eq!(config.ranking.policy_top_k, 3);
        assert_eq!(config.roles.default_roles, vec![2, 10, 7]);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.chat_model, config.provider.chat_model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.roles.faq_fallback, FaqFallback::None);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[ranking]
faq_min_score = 0.7

[roles]
faq_fallback = "unlisted_roles_see_all"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!((config.ranking.faq_min_score - 0.7).abs() < f32::EPSILON);
        assert!((config.ranking.section_min_score - 0.85).abs() < f32::EPSILON);
        assert_eq!(config.roles.faq_fallback, FaqFallback::UnlistedRolesSeeAll);
        assert!((config.fuzzy.max_distance - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlapping_role_tiers_rejected() {
        let mut config = AppConfig::default();
        config.roles.hr_roles.push(10);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn unknown_directory_backend_rejected() {
        let mut config = AppConfig::default();
        config.directory.backend = "mysql".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.embed_model, "nomic-embed-text");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nport = 8088\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.port, 8088);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ROLERAG_PROVIDER", "openai"),
            ("ROLERAG_CHAT_MODEL", "gpt-4o-mini"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ROLERAG_BASE_URL", "https://hr.example.com"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.kind, "openai");
        assert_eq!(config.provider.chat_model, "gpt-4o-mini");
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.gateway.platform_base_url, "https://hr.example.com");
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("nomic-embed-text"));
        assert!(toml_str.contains("policy_top_k"));
    }
}
