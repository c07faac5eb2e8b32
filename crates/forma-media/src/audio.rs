//! Audio transcoding and chunked transcription.
//!
//! Everything is normalized to 16 kHz mono s16le PCM via ffmpeg before
//! transcription. Long recordings are split into fixed-size chunks and
//! transcribed independently — the API rejects long uploads, and chunking
//! keeps one slow segment from failing the whole recording.

use crate::error::MediaError;
use forma_core::{config::MediaConfig, traits::SpeechToText};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

const SAMPLE_RATE: usize = 16_000;
/// Mono 16-bit samples.
const BYTES_PER_SECOND: usize = SAMPLE_RATE * 2;

/// Transcribe an audio attachment, chunking if it exceeds the threshold.
pub(crate) async fn transcribe_audio(
    stt: &Arc<dyn SpeechToText>,
    config: &MediaConfig,
    audio: &[u8],
    extension: &str,
) -> Result<String, MediaError> {
    let pcm = transcode_to_pcm(audio, extension).await?;
    let duration = duration_secs(&pcm);

    if duration <= config.audio_chunk_threshold_secs {
        let wav = wav_from_pcm(&pcm);
        return stt
            .transcribe(&wav, "audio/wav")
            .await
            .map_err(|e| MediaError::Transcription(e.to_string()));
    }

    debug!(
        "audio runs {duration}s, chunking into {}s segments",
        config.audio_chunk_secs
    );

    let mut transcript = String::new();
    for chunk in chunk_pcm(&pcm, config.audio_chunk_secs) {
        let wav = wav_from_pcm(chunk);
        let piece = stt
            .transcribe(&wav, "audio/wav")
            .await
            .map_err(|e| MediaError::Transcription(e.to_string()))?;
        if !transcript.is_empty() {
            transcript.push(' ');
        }
        transcript.push_str(piece.trim());
    }

    Ok(transcript)
}

/// Decode arbitrary audio bytes to canonical PCM via an ffmpeg subprocess.
pub(crate) async fn transcode_to_pcm(
    audio: &[u8],
    extension: &str,
) -> Result<Vec<u8>, MediaError> {
    let (src, src_path) = write_temp(audio, extension)?;
    let dst = NamedTempFile::with_suffix(".pcm")
        .map_err(|e| MediaError::Decode(format!("temp file failed: {e}")))?;
    let dst_path = dst.path().to_path_buf();

    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(&src_path)
        .args(["-vn", "-f", "s16le", "-ac", "1", "-ar", "16000"])
        .arg(&dst_path)
        .output()
        .await
        .map_err(|e| MediaError::Decode(format!("ffmpeg unavailable: {e}")))?;

    drop(src);

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().last().unwrap_or_default().to_string();
        return Err(MediaError::Decode(format!("ffmpeg failed: {tail}")));
    }

    let pcm = std::fs::read(&dst_path)
        .map_err(|e| MediaError::Decode(format!("failed to read transcoded audio: {e}")))?;

    if pcm.is_empty() {
        return Err(MediaError::Decode("no audio stream in payload".to_string()));
    }

    Ok(pcm)
}

/// Write bytes to a temp file with the right extension for ffmpeg sniffing.
fn write_temp(data: &[u8], extension: &str) -> Result<(NamedTempFile, std::path::PathBuf), MediaError> {
    let file = NamedTempFile::with_suffix(format!(".{extension}"))
        .map_err(|e| MediaError::Decode(format!("temp file failed: {e}")))?;
    std::fs::write(file.path(), data)
        .map_err(|e| MediaError::Decode(format!("temp write failed: {e}")))?;
    let path = file.path().to_path_buf();
    Ok((file, path))
}

/// Duration of a canonical PCM buffer in whole seconds.
pub(crate) fn duration_secs(pcm: &[u8]) -> u64 {
    (pcm.len() / BYTES_PER_SECOND) as u64
}

/// Split PCM into fixed-size chunks, sample-aligned.
pub(crate) fn chunk_pcm(pcm: &[u8], chunk_secs: u64) -> Vec<&[u8]> {
    let chunk_bytes = (chunk_secs as usize * BYTES_PER_SECOND).max(2) & !1;
    pcm.chunks(chunk_bytes).collect()
}

/// Wrap raw PCM in a minimal WAV container so the transcription API can
/// identify the format.
pub(crate) fn wav_from_pcm(pcm: &[u8]) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let sample_rate = SAMPLE_RATE as u32;
    let byte_rate = BYTES_PER_SECOND as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_pcm_length() {
        // 10 seconds of silence.
        let pcm = vec![0u8; BYTES_PER_SECOND * 10];
        assert_eq!(duration_secs(&pcm), 10);
        // Just under a second rounds down.
        assert_eq!(duration_secs(&vec![0u8; BYTES_PER_SECOND - 2]), 0);
    }

    #[test]
    fn test_chunking_boundaries() {
        // 120 seconds split at 50s -> 50 + 50 + 20.
        let pcm = vec![0u8; BYTES_PER_SECOND * 120];
        let chunks = chunk_pcm(&pcm, 50);
        assert_eq!(chunks.len(), 3);
        assert_eq!(duration_secs(chunks[0]), 50);
        assert_eq!(duration_secs(chunks[1]), 50);
        assert_eq!(duration_secs(chunks[2]), 20);
    }

    #[test]
    fn test_short_audio_single_chunk() {
        let pcm = vec![0u8; BYTES_PER_SECOND * 30];
        let chunks = chunk_pcm(&pcm, 50);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_wav_header() {
        let pcm = vec![0u8; 320];
        let wav = wav_from_pcm(&pcm);
        assert_eq!(wav.len(), 44 + 320);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 320);
        // 16 kHz sample rate at offset 24.
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 16_000);
    }
}
