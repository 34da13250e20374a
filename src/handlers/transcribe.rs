use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use tracing::info;

use crate::error::GmaoError;
use crate::router::GmaoState;
use crate::service::transcription::{Transcript, audio_mime, transcribe};

/// Transcribe the multipart `audio` field of a voice note.
pub async fn transcribe_audio(
    State(state): State<GmaoState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Transcript>, GmaoError> {
    let mut multipart = multipart?;
    let mut audio = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("audio") {
            let mime = audio_mime(field.content_type())?;
            audio = Some((mime, field.bytes().await?));
        }
    }
    let (mime, bytes) =
        audio.ok_or_else(|| GmaoError::InvalidInput("missing `audio` field".to_string()))?;

    let limit = state.cfg.limits.max_audio_bytes;
    if bytes.len() > limit {
        return Err(GmaoError::PayloadTooLarge { limit });
    }

    let transcript = transcribe(state.model.as_ref(), &bytes, &mime).await?;
    info!(
        language = transcript.language.code(),
        score = transcript.score,
        chars = transcript.text.chars().count(),
        "voice note transcribed"
    );
    Ok(Json(transcript))
}
