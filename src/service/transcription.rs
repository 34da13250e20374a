use crate::error::GmaoError;
use crate::service::language::{detect_language, language_score};
use crate::service::llm::{LanguageModel, LlmRequest, ModelRole};
use crate::types::domain::Language;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

/// Languages transcribed in parallel; Darija is recognized afterwards
/// from the Arabic transcript.
const CANDIDATE_LANGUAGES: [Language; 3] = [Language::Arabic, Language::French, Language::English];

const AUDIO_TYPES: &[&str] = &[
    "audio/webm",
    "audio/ogg",
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/mp4",
    "audio/m4a",
    "audio/x-m4a",
    "audio/aac",
    "audio/flac",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub language: Language,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    pub language: Language,
    pub score: f32,
    pub candidates: Vec<CandidateScore>,
}

/// Strip parameters (`audio/webm;codecs=opus`) and check the type is audio we accept.
pub fn audio_mime(content_type: Option<&str>) -> Result<String, GmaoError> {
    let essence = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase())
        .unwrap_or_default();
    if AUDIO_TYPES.contains(&essence.as_str()) {
        Ok(essence)
    } else {
        Err(GmaoError::UnsupportedFormat(format!(
            "unsupported audio type `{essence}`"
        )))
    }
}

/// Transcribe `audio` once per candidate language, concurrently, and keep
/// the transcript whose text best fits the language it was asked for.
pub async fn transcribe(
    model: &dyn LanguageModel,
    audio: &[u8],
    mime_type: &str,
) -> Result<Transcript, GmaoError> {
    if audio.is_empty() {
        return Err(GmaoError::InvalidInput("audio is empty".to_string()));
    }
    let calls = CANDIDATE_LANGUAGES.map(|language| {
        let request = LlmRequest::new(ModelRole::Transcription, "transcribe")
            .system("You transcribe maintenance voice notes verbatim. Output only the transcript.")
            .blob(mime_type, audio)
            .text(format!(
                "Transcribe this recording in {} ({}). Do not translate.",
                language.display_name(),
                language.code()
            ))
            .temperature(0.0);
        async move { (language, model.generate(request).await) }
    });

    let mut candidates = Vec::new();
    let mut best: Option<(Language, String, f32)> = None;
    let mut last_error = None;
    for (language, result) in join_all(calls).await {
        match result {
            Ok(text) => {
                let text = text.trim().to_string();
                let score = language_score(&text, language);
                debug!(language = language.code(), score, "transcript scored");
                candidates.push(CandidateScore { language, score });
                if best.as_ref().is_none_or(|(_, _, s)| score > *s) {
                    best = Some((language, text, score));
                }
            }
            Err(e) => {
                warn!(language = language.code(), error = %e, "transcription attempt failed");
                last_error = Some(e);
            }
        }
    }

    let Some((language, text, score)) = best else {
        return Err(last_error.unwrap_or_else(|| {
            GmaoError::ModelOutput("transcription produced no output".to_string())
        }));
    };
    let language = if language == Language::Arabic {
        detect_language(&text)
    } else {
        language
    };
    Ok(Transcript {
        text,
        language,
        score,
        candidates,
    })
}
