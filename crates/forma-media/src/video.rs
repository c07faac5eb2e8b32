//! Video resolution: transcript and visual description, combined.

use crate::{audio, error::MediaError};
use forma_core::{
    config::MediaConfig,
    traits::{MediaDescriber, SpeechToText},
};
use std::sync::Arc;
use tracing::warn;

const PROBE_PROMPT: &str =
    "Answer with a single word, yes or no: does this video show a person \
     performing a gym exercise or lift?";

const TECHNIQUE_PROMPT: &str =
    "This video shows a person performing an exercise. Identify the \
     exercise, then describe the technique in detail: setup, stance, range \
     of motion, bar or joint path, tempo, and any visible form faults. Be \
     specific and concrete.";

const GENERIC_PROMPT: &str =
    "Describe what happens in this video in two or three sentences.";

/// Fold a video into one text block: visual description plus whatever the
/// audio track says.
pub(crate) async fn resolve_video(
    stt: &Arc<dyn SpeechToText>,
    describer: &Arc<dyn MediaDescriber>,
    config: &MediaConfig,
    bytes: &[u8],
    mime_type: &str,
    extension: &str,
) -> Result<String, MediaError> {
    let transcript_task = transcribe_track(stt, config, bytes, extension);
    let description_task = describe(describer, bytes, mime_type);

    let (transcript, description) = tokio::join!(transcript_task, description_task);

    // The description is the essential half; without it the video told us
    // nothing. A missing or silent audio track is normal.
    let description = description?;
    let transcript = transcript.unwrap_or_else(|e| {
        warn!("video audio track skipped: {e}");
        String::new()
    });

    let mut combined = format!("Video description: {description}");
    if !transcript.trim().is_empty() {
        combined.push_str(&format!("\nAudio transcript: {}", transcript.trim()));
    }
    Ok(combined)
}

async fn transcribe_track(
    stt: &Arc<dyn SpeechToText>,
    config: &MediaConfig,
    bytes: &[u8],
    extension: &str,
) -> Result<String, MediaError> {
    audio::transcribe_audio(stt, config, bytes, extension).await
}

async fn describe(
    describer: &Arc<dyn MediaDescriber>,
    bytes: &[u8],
    mime_type: &str,
) -> Result<String, MediaError> {
    // Cheap probe first: exercise content gets the structured technique
    // analysis, everything else a generic description.
    let probe = describer
        .describe(bytes, mime_type, PROBE_PROMPT)
        .await
        .map_err(|e| MediaError::Description(e.to_string()))?;

    let prompt = if probe.trim().to_lowercase().starts_with("yes") {
        TECHNIQUE_PROMPT
    } else {
        GENERIC_PROMPT
    };

    describer
        .describe(bytes, mime_type, prompt)
        .await
        .map_err(|e| MediaError::Description(e.to_string()))
}
