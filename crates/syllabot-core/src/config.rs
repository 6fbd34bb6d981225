use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyllabotError};

/// Environment variables consulted for the vector store id, in order.
pub const VECTOR_STORE_ENV_VARS: [&str; 2] = ["VECTOR_STORE_ID", "vector_store_id"];

/// Top-level Syllabot configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub web_search: Option<WebSearchConfig>,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Full chat-completions endpoint URL. Default: OpenAI.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-4o".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests. Document fetches are never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model turns allowed within one actor activation.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize { 12 }

/// Hand-off protocol policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Enforce the scripted coordinator → retriever → coordinator →
    /// comparator → coordinator order. When false any graph edge is allowed.
    #[serde(default = "default_enforce_sequence")]
    pub enforce_sequence: bool,
    #[serde(default = "default_max_handoffs")]
    pub max_handoffs: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            enforce_sequence: default_enforce_sequence(),
            max_handoffs: default_max_handoffs(),
        }
    }
}

fn default_enforce_sequence() -> bool { true }
fn default_max_handoffs() -> usize { 8 }

/// Where the syllabus PDF link is published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_page_url")]
    pub page_url: String,
    /// Case-sensitive substring the download name must contain.
    #[serde(default = "default_required_substring")]
    pub required_substring: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            required_substring: default_required_substring(),
        }
    }
}

fn default_page_url() -> String { "https://casqb.org/ke-stazeni".to_string() }
fn default_required_substring() -> String { "ISTQB_CTFL_Syllabus_CZ".to_string() }

/// Vector store holding the reference document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_vector_base_url")]
    pub base_url: String,
    /// Falls back to the model API key when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_num_results")]
    pub max_num_results: u32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            id: None,
            base_url: default_vector_base_url(),
            api_key: None,
            max_num_results: default_max_num_results(),
        }
    }
}

fn default_vector_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_max_num_results() -> u32 { 5 }

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    pub api_key: String,
}

fn default_search_provider() -> String { "tavily".to_string() }

/// Instruction scripts and user input files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_prompt_dir")]
    pub dir: String,
    #[serde(default = "default_coordinator_prompt")]
    pub coordinator: String,
    #[serde(default = "default_retriever_prompt")]
    pub retriever: String,
    #[serde(default = "default_comparator_prompt")]
    pub comparator: String,
    #[serde(default = "default_user_input")]
    pub user_input: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: default_prompt_dir(),
            coordinator: default_coordinator_prompt(),
            retriever: default_retriever_prompt(),
            comparator: default_comparator_prompt(),
            user_input: default_user_input(),
        }
    }
}

impl PromptsConfig {
    /// Path of a prompt file relative to the prompt directory.
    pub fn prompt_path(&self, file: &str) -> PathBuf {
        Path::new(&self.dir).join(file)
    }
}

fn default_prompt_dir() -> String { "prompts".to_string() }
fn default_coordinator_prompt() -> String { "coordinator.md".to_string() }
fn default_retriever_prompt() -> String { "web_search.md".to_string() }
fn default_comparator_prompt() -> String { "file_search.md".to_string() }
fn default_user_input() -> String { "user_input.md".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 { 30 }
fn default_user_agent() -> String { "Syllabot/0.3".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SyllabotError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| SyllabotError::Configuration(e.to_string()))
    }

    /// Load `path` when it exists, otherwise start from defaults.
    /// Environment overrides are applied in both cases.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            debug!(path = %path.display(), "Config file absent, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Fill unset secrets and identifiers from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(id) = VECTOR_STORE_ENV_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|v| !v.trim().is_empty())
        {
            self.vector_store.id = Some(id);
        }

        if self.model.api_key.is_none() {
            self.model.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        if self.web_search.is_none() {
            if let Ok(key) = std::env::var("TAVILY_API_KEY") {
                self.web_search = Some(WebSearchConfig {
                    provider: default_search_provider(),
                    api_key: key,
                });
            }
        }
    }

    /// The configured vector store id, or a configuration error.
    pub fn require_vector_store_id(&self) -> Result<&str> {
        self.vector_store
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                SyllabotError::Configuration(format!(
                    "vector store id is not set (set {} or [vector_store] id)",
                    VECTOR_STORE_ENV_VARS[0]
                ))
            })
    }

    /// API key used for vector store queries.
    pub fn vector_store_api_key(&self) -> Option<&str> {
        self.vector_store
            .api_key
            .as_deref()
            .or(self.model.api_key.as_deref())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep the reference when the variable is unset
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
