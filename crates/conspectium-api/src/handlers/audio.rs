//! Audio upload handler.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use conspectium_core::{AudioSource, AudioSourceKind, AudioStatus};
use conspectium_jobs::AudioUpload;

use crate::auth::CurrentUser;
use crate::{ApiError, AppState};

/// Response for a registered audio source.
#[derive(Debug, Serialize)]
pub struct AudioSourceView {
    pub id: Uuid,
    pub kind: AudioSourceKind,
    pub status: AudioStatus,
    pub original_filename: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<&AudioSource> for AudioSourceView {
    fn from(audio: &AudioSource) -> Self {
        Self {
            id: audio.id,
            kind: audio.kind,
            status: audio.status,
            original_filename: audio.original_filename.clone(),
            mime_type: audio.mime_type.clone(),
            file_size: audio.file_size,
            created_at: audio.created_at,
        }
    }
}

fn is_accepted_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    essence.starts_with("audio/") || essence == "application/octet-stream"
}

/// Upload an audio file for later transcription.
///
/// # Multipart Fields
/// - `file`: Audio file (required). `audio/*` or `application/octet-stream`.
/// - `kind`: `uploaded` (default) or `microphone`
///
/// # Returns
/// - 201 Created with the `pending` audio source
/// - 400 Bad Request if the file is missing or empty
/// - 413 Payload Too Large above `MAX_UPLOAD_SIZE_MB`
/// - 415 Unsupported Media Type for non-audio content
pub async fn upload_audio(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AudioSourceView>), ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut kind = AudioSourceKind::Uploaded;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(|n| n.to_string());
                content_type = field.content_type().map(|c| c.to_string());
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?
                        .to_vec(),
                );
            }
            Some("kind") => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
                kind = match val.trim() {
                    "" | "uploaded" => AudioSourceKind::Uploaded,
                    "microphone" => AudioSourceKind::Microphone,
                    other => {
                        return Err(ApiError::BadRequest(format!(
                            "unsupported audio source kind: {}",
                            other
                        )))
                    }
                };
            }
            _ => {} // ignore unknown fields
        }
    }

    let data = file_data
        .ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".to_string()))?;

    if data.len() > state.config.max_upload_size {
        return Err(ApiError::PayloadTooLarge(format!(
            "Audio file exceeds the {} byte upload limit",
            state.config.max_upload_size
        )));
    }

    let mime_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    if !is_accepted_mime(&mime_type) {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Expected an audio file, got {}",
            mime_type
        )));
    }

    let audio = state
        .service
        .upload_audio(
            owner,
            AudioUpload {
                kind,
                filename,
                mime_type: Some(mime_type),
                data,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AudioSourceView::from(&audio))))
}
