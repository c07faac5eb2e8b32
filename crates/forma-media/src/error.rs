use thiserror::Error;

/// Typed failure from media resolution. One bad attachment never aborts
/// the turn — the caller substitutes a neutral placeholder.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Attachment bytes could not be fetched.
    #[error("media download failed: {0}")]
    Download(String),

    /// Payload did not decode as the claimed media type.
    #[error("media decode failed: {0}")]
    Decode(String),

    /// Speech-to-text call failed.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Visual description call failed.
    #[error("description failed: {0}")]
    Description(String),

    /// Attachment kind the resolver cannot fold into text.
    #[error("unsupported attachment: {0}")]
    Unsupported(String),
}
