use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Error as SqlxError;
use std::collections::HashMap;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum GmaoError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Invalid JSON body: {0}")]
    JsonBody(#[from] JsonRejection),

    #[error("Invalid query string: {0}")]
    QueryString(#[from] QueryRejection),

    #[error("Invalid path: {0}")]
    PathParams(#[from] PathRejection),

    #[error("Invalid multipart request: {0}")]
    MultipartRequest(#[from] MultipartRejection),

    #[error("QR code error: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid state transition: {0}")]
    Conflict(String),

    #[error("Payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Upstream model error: {0:?}")]
    Upstream(UpstreamError),

    #[error("Model returned no usable output: {0}")]
    ModelOutput(String),
}

impl GmaoError {
    /// Network-level failures and upstream 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            GmaoError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GmaoError::UpstreamStatus(code) => code.is_server_error(),
            GmaoError::Upstream(err) => err.error.code >= 500,
            _ => false,
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            GmaoError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            GmaoError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT"),
            GmaoError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            GmaoError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            GmaoError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            GmaoError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            GmaoError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            GmaoError::Multipart(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            GmaoError::JsonBody(r) if r.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            GmaoError::JsonBody(_)
            | GmaoError::QueryString(_)
            | GmaoError::PathParams(_)
            | GmaoError::MultipartRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            GmaoError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT"),
            GmaoError::UpstreamStatus(StatusCode::TOO_MANY_REQUESTS) => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT")
            }
            GmaoError::Upstream(err) if err.error.code == 429 => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT")
            }
            GmaoError::UpstreamStatus(_)
            | GmaoError::Upstream(_)
            | GmaoError::Reqwest(_)
            | GmaoError::UrlParse(_) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY"),
            GmaoError::ModelOutput(_) => (StatusCode::BAD_GATEWAY, "MODEL_OUTPUT"),
            GmaoError::DatabaseError(_)
            | GmaoError::Io(_)
            | GmaoError::Json(_)
            | GmaoError::Qr(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for GmaoError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        } else {
            tracing::debug!(error = %self, code, "request rejected");
        }

        let localized = LocalizedMessage::for_code(code);
        let message = match &self {
            // Client-facing detail is safe for validation failures only.
            GmaoError::InvalidInput(msg) | GmaoError::UnsupportedFormat(msg) => msg.clone(),
            GmaoError::NotFound(what) => format!("{what} not found."),
            GmaoError::Conflict(msg) => msg.clone(),
            GmaoError::JsonBody(r) => r.body_text(),
            GmaoError::QueryString(r) => r.body_text(),
            GmaoError::PathParams(r) => r.body_text(),
            GmaoError::MultipartRequest(r) => r.body_text(),
            GmaoError::PayloadTooLarge { limit } => {
                format!("Payload exceeds the {limit} byte limit.")
            }
            _ => localized.en.to_string(),
        };
        let retry_after = match &self {
            GmaoError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            GmaoError::Upstream(err) if err.error.code == 429 => err.retry_delay_secs(),
            _ => None,
        };

        let body = Json(ApiErrorResponse {
            error: ApiErrorBody {
                code: code.to_string(),
                message,
                localized,
            },
        });
        match retry_after {
            Some(secs) => (
                status,
                [(axum::http::header::RETRY_AFTER, secs.to_string())],
                body,
            )
                .into_response(),
            None => (status, body).into_response(),
        }
    }
}

/// Standardized API error response body
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub localized: LocalizedMessage,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Fixed user-facing message in the three interface languages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocalizedMessage {
    pub en: String,
    pub fr: String,
    pub ar: String,
}

impl LocalizedMessage {
    pub fn for_code(code: &str) -> Self {
        let (en, fr, ar) = match code {
            "INVALID_INPUT" => (
                "The request is invalid.",
                "La requête est invalide.",
                "الطلب غير صالح.",
            ),
            "UNSUPPORTED_FORMAT" => (
                "Unsupported file format.",
                "Format de fichier non pris en charge.",
                "صيغة الملف غير مدعومة.",
            ),
            "UNAUTHORIZED" => (
                "Authentication required.",
                "Authentification requise.",
                "المصادقة مطلوبة.",
            ),
            "NOT_FOUND" => (
                "Resource not found.",
                "Ressource introuvable.",
                "المورد غير موجود.",
            ),
            "CONFLICT" => (
                "This change is not allowed in the current state.",
                "Cette modification n'est pas autorisée dans l'état actuel.",
                "هذا التغيير غير مسموح به في الحالة الحالية.",
            ),
            "PAYLOAD_TOO_LARGE" => (
                "The file is too large.",
                "Le fichier est trop volumineux.",
                "الملف كبير جدًا.",
            ),
            "RATE_LIMIT" => (
                "Too many requests, please try again later.",
                "Trop de requêtes, veuillez réessayer plus tard.",
                "طلبات كثيرة جدًا، يرجى المحاولة لاحقًا.",
            ),
            "BAD_GATEWAY" | "MODEL_OUTPUT" => (
                "The AI service is unavailable.",
                "Le service d'IA est indisponible.",
                "خدمة الذكاء الاصطناعي غير متوفرة.",
            ),
            _ => (
                "An internal server error occurred.",
                "Une erreur interne est survenue.",
                "حدث خطأ داخلي في الخادم.",
            ),
        };
        Self {
            en: en.to_string(),
            fr: fr.to_string(),
            ar: ar.to_string(),
        }
    }
}

/// Upstream (Gemini-compatible) API error response structure
#[derive(Deserialize, Debug)]
pub struct UpstreamError {
    pub error: UpstreamErrorBody,
}

#[derive(Deserialize, Debug)]
pub struct UpstreamErrorBody {
    pub code: u32,
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl UpstreamError {
    /// Server-suggested delay from a `RetryInfo` detail, e.g. `"retryDelay": "17s"`.
    pub fn retry_delay_secs(&self) -> Option<u64> {
        self.error
            .extra
            .get("details")?
            .as_array()?
            .iter()
            .filter_map(|detail| detail.get("retryDelay").and_then(|d| d.as_str()))
            .filter_map(|d| d.trim_end_matches('s').parse::<f64>().ok())
            .map(|secs| secs.ceil() as u64)
            .next()
    }
}
