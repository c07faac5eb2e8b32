//! Default values for config fields.

use super::ModelRef;

pub(super) fn default_name() -> String {
    "forma".to_string()
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_debounce_secs() -> u64 {
    15
}

pub(super) fn default_audio_chunk_threshold_secs() -> u64 {
    59
}

pub(super) fn default_audio_chunk_secs() -> u64 {
    50
}

pub(super) fn default_download_timeout_secs() -> u64 {
    20
}

pub(super) fn default_media_call_timeout_secs() -> u64 {
    30
}

pub(super) fn default_cascade() -> Vec<ModelRef> {
    vec![
        ModelRef {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
        },
        ModelRef {
            provider: "anthropic".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
        },
        ModelRef {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
        },
    ]
}

pub(super) fn default_max_retries() -> u32 {
    2
}

pub(super) fn default_backoff_secs() -> u64 {
    5
}

pub(super) fn default_request_timeout_secs() -> u64 {
    30
}

pub(super) fn default_confidence_threshold() -> u8 {
    70
}

pub(super) fn default_early_history_limit() -> usize {
    3
}

pub(super) fn default_db_path() -> String {
    "~/.forma/data/forma.db".to_string()
}

pub(super) fn default_max_context() -> usize {
    20
}

pub(super) fn default_dedup_window_secs() -> i64 {
    300
}

pub(super) fn default_vision_model() -> String {
    "gemini-2.0-flash".to_string()
}

pub(super) fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_webhook_host() -> String {
    "127.0.0.1".to_string()
}

pub(super) fn default_webhook_port() -> u16 {
    8090
}

pub(super) fn default_send_timeout_secs() -> u64 {
    15
}
