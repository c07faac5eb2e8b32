mod defaults;
mod prompts;

#[cfg(test)]
mod tests;

pub use prompts::Prompts;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::FormaError;
use defaults::*;

/// Top-level Forma configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub forma: GeneralConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub funnel: FunnelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub program: ProgramConfig,
    #[serde(default)]
    pub prompts: Prompts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            forma: GeneralConfig::default(),
            buffer: BufferConfig::default(),
            media: MediaConfig::default(),
            classifier: ClassifierConfig::default(),
            funnel: FunnelConfig::default(),
            memory: MemoryConfig::default(),
            providers: ProvidersConfig::default(),
            channel: ChannelConfig::default(),
            program: ProgramConfig::default(),
            prompts: Prompts::default(),
        }
    }
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// Conversation buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Debounce window in seconds. A new event from the same sender within
    /// this window restarts the timer; the batch flushes when it expires.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
        }
    }
}

/// Media resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Audio longer than this is split into chunks before transcription.
    #[serde(default = "default_audio_chunk_threshold_secs")]
    pub audio_chunk_threshold_secs: u64,
    /// Size of each transcription chunk.
    #[serde(default = "default_audio_chunk_secs")]
    pub audio_chunk_secs: u64,
    /// Timeout for downloading an attachment.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Timeout for one transcription or description call.
    #[serde(default = "default_media_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio_chunk_threshold_secs: default_audio_chunk_threshold_secs(),
            audio_chunk_secs: default_audio_chunk_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            call_timeout_secs: default_media_call_timeout_secs(),
        }
    }
}

/// One entry in the classifier's model cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRef {
    /// Provider name: "anthropic", "openai", or "gemini".
    pub provider: String,
    /// Model identifier passed to that provider.
    pub model: String,
}

/// Intent classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Ordered model cascade: primary first, fallbacks after.
    #[serde(default = "default_cascade")]
    pub cascade: Vec<ModelRef>,
    /// Retries of the *same* model on a rate-limit error before advancing.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed backoff between same-model retries.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Timeout for one classification call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Minimum confidence to act on a non-chat category.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            cascade: default_cascade(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// Ad-funnel gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelConfig {
    /// The secondary ad-intent detector only runs for identities with at
    /// most this many stored messages.
    #[serde(default = "default_early_history_limit")]
    pub early_history_limit: usize,
    /// Minimum detector confidence to tag a lead.
    #[serde(default = "default_confidence_threshold")]
    pub ad_confidence_threshold: u8,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            early_history_limit: default_early_history_limit(),
            ad_confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_max_context")]
    pub max_context_messages: usize,
    /// Window within which identical messages collapse to one stored row.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: i64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_context_messages: default_max_context(),
            dedup_window_secs: default_dedup_window_secs(),
        }
    }
}

/// API keys and endpoints for the LLM providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub gemini_api_key: String,
    /// Model used for image/video description.
    #[serde(default = "default_vision_model")]
    pub gemini_vision_model: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            openai_base_url: default_openai_base_url(),
            gemini_api_key: String::new(),
            gemini_vision_model: default_vision_model(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Webhook ingress/egress channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_webhook_host")]
    pub host: String,
    #[serde(default = "default_webhook_port")]
    pub port: u16,
    /// Bearer token for inbound auth. Empty = no auth (local-only use).
    #[serde(default)]
    pub api_key: String,
    /// Platform endpoint outbound sends are POSTed to.
    #[serde(default)]
    pub send_url: String,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_webhook_host(),
            port: default_webhook_port(),
            api_key: String::new(),
            send_url: String::new(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

/// Training-program management collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_send_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_send_timeout_secs(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, FormaError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| FormaError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| FormaError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
