//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies the `TELLYBOT_LOG_LEVEL` env override. API keys are never
//! sourced from TOML — only from the environment (`TVDB_API_KEY`,
//! `TVDB_PIN`, `LLM_API_KEY`).

use std::{env, fs, path::Path};

use serde::Deserialize;

use crate::error::AppError;

/// OpenAI / OpenAI-compatible provider configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM boundary configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"` or `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    /// Character budget for serialized narration input; exceeding it raises
    /// a typed overflow before any request is sent.
    pub narrate_input_budget: usize,
    pub openai: OpenAiConfig,
}

/// Metadata provider configuration.
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// Which provider is active (`"fixture"` or `"tvdb"`).
    pub provider: String,
    /// TVDB v4 API base URL.
    pub tvdb_api_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Session store configuration (`[memory]`).
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum turns retained per session (FIFO).
    pub max_history: usize,
    /// Session time-to-live in hours.
    pub session_ttl_hours: i64,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    pub llm: LlmConfig,
    pub metadata: MetadataConfig,
    pub memory: MemoryConfig,
    /// From `LLM_API_KEY` — `None` for keyless local models.
    pub llm_api_key: Option<String>,
    /// From `TVDB_API_KEY`.
    pub tvdb_api_key: Option<String>,
    /// From `TVDB_PIN` — only needed for user-supported keys.
    pub tvdb_pin: Option<String>,
}

// ── Raw TOML shapes ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    bot: RawBot,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(default)]
    memory: RawMemory,
}

#[derive(Deserialize)]
struct RawBot {
    name: String,
    log_level: String,
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default = "default_narrate_input_budget")]
    narrate_input_budget: usize,
    #[serde(default)]
    openai: RawOpenAi,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            narrate_input_budget: default_narrate_input_budget(),
            openai: RawOpenAi::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawOpenAi {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAi {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(rename = "default", default = "default_metadata_provider")]
    provider: String,
    #[serde(default = "default_tvdb_api_url")]
    tvdb_api_url: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawMetadata {
    fn default() -> Self {
        Self {
            provider: default_metadata_provider(),
            tvdb_api_url: default_tvdb_api_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawMemory {
    #[serde(default = "default_max_history")]
    max_history: usize,
    #[serde(default = "default_session_ttl_hours")]
    session_ttl_hours: i64,
}

impl Default for RawMemory {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

fn default_llm_provider() -> String { "dummy".to_string() }
fn default_narrate_input_budget() -> usize { 12_000 }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_metadata_provider() -> String { "fixture".to_string() }
fn default_tvdb_api_url() -> String { "https://api4.thetvdb.com/v4".to_string() }
fn default_timeout_seconds() -> u64 { 30 }
fn default_max_history() -> usize { 10 }
fn default_session_ttl_hours() -> i64 { 24 }

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let log_level_override = env::var("TELLYBOT_LOG_LEVEL").ok();
    load_from(Path::new("config/default.toml"), log_level_override.as_deref())
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, log_level_override: Option<&str>) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let log_level = log_level_override
        .unwrap_or(&parsed.bot.log_level)
        .to_string();

    Ok(Config {
        bot_name: parsed.bot.name,
        log_level,
        llm: LlmConfig {
            provider: parsed.llm.provider,
            narrate_input_budget: parsed.llm.narrate_input_budget,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        metadata: MetadataConfig {
            provider: parsed.metadata.provider,
            tvdb_api_url: parsed.metadata.tvdb_api_url,
            timeout_seconds: parsed.metadata.timeout_seconds,
        },
        memory: MemoryConfig {
            max_history: parsed.memory.max_history,
            session_ttl_hours: parsed.memory.session_ttl_hours,
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        tvdb_api_key: env::var("TVDB_API_KEY").ok(),
        tvdb_pin: env::var("TVDB_PIN").ok(),
    })
}


// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — dummy LLM, fixture metadata, no keys.
#[cfg(test)]
impl Config {
    pub fn test_default() -> Self {
        Self {
            bot_name: "test".into(),
            log_level: "info".into(),
            llm: LlmConfig {
                provider: "dummy".into(),
                narrate_input_budget: 12_000,
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    timeout_seconds: 1,
                },
            },
            metadata: MetadataConfig {
                provider: "fixture".into(),
                tvdb_api_url: "http://localhost:0/v4".into(),
                timeout_seconds: 1,
            },
            memory: MemoryConfig {
                max_history: 10,
                session_ttl_hours: 24,
            },
            llm_api_key: None,
            tvdb_api_key: None,
            tvdb_pin: None,
        }
    }
}
