//! Whisper transcription over the OpenAI audio API.

use async_trait::async_trait;
use forma_core::{error::FormaError, traits::SpeechToText};
use serde::Deserialize;

const TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Whisper API response.
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Speech-to-text via the OpenAI Whisper API.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
}

impl WhisperTranscriber {
    pub fn from_config(api_key: String, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, api_key }
    }
}

/// File extension for a mime type, so the API sees a sensible filename.
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" => "m4a",
        _ => "ogg",
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, FormaError> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(format!("voice.{}", extension_for(mime_type)))
            .mime_str(mime_type)
            .map_err(|e| FormaError::Provider(format!("whisper mime error: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .part("file", part);

        let resp = self
            .client
            .post(TRANSCRIPTION_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FormaError::Provider(format!("whisper request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FormaError::Provider(format!(
                "whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = resp
            .json()
            .await
            .map_err(|e| FormaError::Provider(format!("whisper response parse failed: {e}")))?;

        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_known_mimes() {
        assert_eq!(extension_for("audio/wav"), "wav");
        assert_eq!(extension_for("audio/mpeg"), "mp3");
        assert_eq!(extension_for("audio/ogg"), "ogg");
        assert_eq!(extension_for("application/octet-stream"), "ogg");
    }
}
