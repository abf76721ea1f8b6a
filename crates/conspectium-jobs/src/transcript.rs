//! Transcript acquisition for note jobs.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use conspectium_core::{AiError, AudioSource, AudioStatus, Error, GenerationJob, Note, Result};

use crate::policy::{FailureResponse, Operation};
use crate::service::GenerationService;

/// Transcript stored when transcription fails and the placeholder is enabled.
pub const PLACEHOLDER_TRANSCRIPT: &str =
    "Аудио загружено, но транскрибация недоступна в офлайн-режиме.";

/// Job error for a transient transcription failure.
pub const TRANSCRIPTION_RETRY_HINT: &str =
    "Speech recognition service is overloaded; retry the job in a couple of minutes";

const DEFAULT_AUDIO_MIME: &str = "application/octet-stream";

/// Text a note job generates from, plus the audio source it came from.
#[derive(Debug, Clone)]
pub struct ObtainedTranscript {
    pub text: String,
    pub audio: Option<AudioSource>,
}

impl GenerationService {
    /// Obtain the transcript for a note job.
    ///
    /// Without an audio source the note's initial text is used verbatim. With
    /// one, a cached transcription is reused; otherwise the audio is
    /// transcribed and the result cached on the audio source before
    /// returning, so it survives a later failure of the job.
    pub(crate) async fn obtain_transcript(
        &self,
        job: &GenerationJob,
        note: &Note,
    ) -> Result<ObtainedTranscript> {
        let Some(audio_id) = job.audio_source_id else {
            return match note.input_text.as_deref() {
                Some(text) if !text.trim().is_empty() => Ok(ObtainedTranscript {
                    text: text.to_string(),
                    audio: None,
                }),
                _ => Err(Error::TranscriptUnavailable(
                    "note has neither an audio source nor initial text".into(),
                )),
            };
        };

        let mut audio = self
            .repo
            .get_audio_source(audio_id)
            .await?
            .ok_or_else(|| {
                Error::TranscriptUnavailable(format!("audio source {audio_id} not found"))
            })?;

        if let Some(cached) = audio.cached_transcript() {
            debug!(audio_source_id = %audio.id, "Reusing cached transcription");
            let text = cached.to_string();
            return Ok(ObtainedTranscript {
                text,
                audio: Some(audio),
            });
        }

        let file_ref = audio.file_ref.clone().ok_or_else(|| {
            Error::TranscriptUnavailable(format!("audio source {} has no stored file", audio.id))
        })?;

        // The source only enters `processing` once its blob is in hand.
        let data = self.storage.read(&file_ref).await?;

        audio.status = AudioStatus::Processing;
        self.repo.save_audio_source(&audio).await?;

        let filename = audio
            .original_filename
            .clone()
            .unwrap_or_else(|| file_ref.rsplit('/').next().unwrap_or("audio").to_string());
        let mime = audio
            .mime_type
            .clone()
            .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string());

        let outcome = self
            .ai
            .transcribe(data, &filename, &mime)
            .await
            .and_then(|out| {
                if out.transcript.trim().is_empty() {
                    Err(AiError::permanent("transcription returned empty text"))
                } else {
                    Ok(out)
                }
            });

        match outcome {
            Ok(out) => {
                let text = out.transcript.trim().to_string();
                audio.transcription = Some(text.clone());
                audio.status = AudioStatus::Ready;
                audio.duration_secs = out.duration_sec.or(audio.duration_secs);
                audio.set_metadata(
                    "transcription",
                    json!({
                        "model": self.ai.model_name(),
                        "duration_sec": out.duration_sec,
                        "language": out.language,
                    }),
                );
                audio.remove_metadata("transient_error");
                audio.remove_metadata("transient_at");
                self.repo.save_audio_source(&audio).await?;

                info!(
                    audio_source_id = %audio.id,
                    chars = text.chars().count(),
                    "Audio transcribed"
                );
                Ok(ObtainedTranscript {
                    text,
                    audio: Some(audio),
                })
            }
            Err(err) => self.handle_transcription_failure(audio, err).await,
        }
    }

    async fn handle_transcription_failure(
        &self,
        mut audio: AudioSource,
        err: AiError,
    ) -> Result<ObtainedTranscript> {
        match self.policy.resolve(Operation::Transcription, err.class) {
            FailureResponse::PlaceholderTranscript => {
                warn!(
                    audio_source_id = %audio.id,
                    error = %err,
                    "Transcription failed, storing placeholder transcript"
                );
                audio.transcription = Some(PLACEHOLDER_TRANSCRIPT.to_string());
                audio.status = AudioStatus::Ready;
                audio.set_metadata("transcription_error", json!(err.message));
                audio.set_metadata("placeholder", json!(true));
                self.repo.save_audio_source(&audio).await?;
                Ok(ObtainedTranscript {
                    text: PLACEHOLDER_TRANSCRIPT.to_string(),
                    audio: Some(audio),
                })
            }
            FailureResponse::ResetAudioToPending => {
                warn!(
                    audio_source_id = %audio.id,
                    error = %err,
                    "Transient transcription failure, audio source reset to pending"
                );
                audio.status = AudioStatus::Pending;
                audio.set_metadata("transient_error", json!(err.message));
                audio.set_metadata("transient_at", json!(Utc::now().to_rfc3339()));
                self.repo.save_audio_source(&audio).await?;
                Err(AiError::transient(TRANSCRIPTION_RETRY_HINT).into())
            }
            _ => {
                warn!(
                    audio_source_id = %audio.id,
                    error = %err,
                    "Transcription failed"
                );
                audio.status = AudioStatus::Failed;
                audio.set_metadata("error", json!(err.message));
                self.repo.save_audio_source(&audio).await?;
                Err(AiError {
                    class: err.class,
                    message: format!("audio transcription failed: {}", err.message),
                }
                .into())
            }
        }
    }
}
