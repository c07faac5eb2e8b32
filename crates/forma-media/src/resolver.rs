//! The media resolver: attachment in, text out.

use crate::{audio, error::MediaError, image_check, video};
use forma_core::{
    config::MediaConfig,
    event::{Attachment, AttachmentKind},
    traits::{MediaDescriber, SpeechToText},
};
use std::sync::Arc;
use tracing::debug;

const IMAGE_CAPTION_PROMPT: &str =
    "Describe this photo in one or two sentences. If it shows food, list \
     the visible items and estimate portion sizes.";

/// A resolved attachment: the original kind plus its text rendering.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub kind: AttachmentKind,
    pub text: String,
}

/// Resolves attachments to text via the transcription and description
/// collaborators.
pub struct MediaResolver {
    client: reqwest::Client,
    stt: Arc<dyn SpeechToText>,
    describer: Arc<dyn MediaDescriber>,
    config: MediaConfig,
}

impl MediaResolver {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        describer: Arc<dyn MediaDescriber>,
        config: MediaConfig,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.download_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            stt,
            describer,
            config,
        }
    }

    /// Resolve one attachment to text, or a typed error the caller turns
    /// into a placeholder.
    pub async fn resolve(&self, attachment: &Attachment) -> Result<ResolvedMedia, MediaError> {
        let bytes = self.fetch(attachment).await?;
        let mime = mime_for(attachment);
        let extension = extension_for(&mime);

        debug!(
            "resolving {:?} attachment ({} bytes)",
            attachment.kind,
            bytes.len()
        );

        let text = match attachment.kind {
            AttachmentKind::Audio => {
                let transcript =
                    audio::transcribe_audio(&self.stt, &self.config, &bytes, extension).await?;
                format!("Voice message transcript: {}", transcript.trim())
            }
            AttachmentKind::Image => {
                image_check::validate_image(&bytes)?;
                let caption = self
                    .describer
                    .describe(&bytes, &mime, IMAGE_CAPTION_PROMPT)
                    .await
                    .map_err(|e| MediaError::Description(e.to_string()))?;
                format!("Photo: {}", caption.trim())
            }
            AttachmentKind::Video => {
                video::resolve_video(
                    &self.stt,
                    &self.describer,
                    &self.config,
                    &bytes,
                    &mime,
                    extension,
                )
                .await?
            }
            AttachmentKind::Document | AttachmentKind::Other => {
                return Err(MediaError::Unsupported(format!("{:?}", attachment.kind)));
            }
        };

        Ok(ResolvedMedia {
            kind: attachment.kind,
            text,
        })
    }

    /// Neutral placeholder substituted when resolution fails.
    pub fn placeholder(kind: AttachmentKind) -> &'static str {
        match kind {
            AttachmentKind::Audio => "[voice message could not be processed]",
            AttachmentKind::Image => "[photo could not be processed]",
            AttachmentKind::Video => "[video could not be processed]",
            AttachmentKind::Document | AttachmentKind::Other => {
                "[attachment could not be processed]"
            }
        }
    }

    /// Inline bytes, or download from the attachment URL.
    async fn fetch(&self, attachment: &Attachment) -> Result<Vec<u8>, MediaError> {
        if let Some(data) = &attachment.data {
            return Ok(data.clone());
        }

        let Some(url) = &attachment.url else {
            return Err(MediaError::Download(
                "attachment has neither data nor url".to_string(),
            ));
        };

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Download(format!("fetch failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(MediaError::Download(format!(
                "fetch returned {}",
                resp.status()
            )));
        }

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| MediaError::Download(format!("body read failed: {e}")))
    }
}

/// The attachment's declared mime type, or a sensible default per kind.
fn mime_for(attachment: &Attachment) -> String {
    if let Some(mime) = &attachment.mime_type {
        return mime.clone();
    }
    match attachment.kind {
        AttachmentKind::Audio => "audio/ogg",
        AttachmentKind::Image => "image/jpeg",
        AttachmentKind::Video => "video/mp4",
        AttachmentKind::Document | AttachmentKind::Other => "application/octet-stream",
    }
    .to_string()
}

/// File extension ffmpeg should sniff from.
fn extension_for(mime: &str) -> &'static str {
    match mime {
        "audio/ogg" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mp4" | "audio/m4a" => "m4a",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
}
