use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use axum::body::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::DbDocument;
use crate::error::GmaoError;
use crate::handlers::extract::{GmaoPath, GmaoQuery};
use crate::router::GmaoState;
use crate::service::cache::content_hash;
use crate::text::non_blank;
use crate::types::domain::DocumentStatus;

const PDF_MAGIC: &[u8] = b"%PDF-";

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

async fn read_upload(mut multipart: Multipart) -> Result<(Upload, Option<String>), GmaoError> {
    let mut upload = None;
    let mut asset_id = None;
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .and_then(|n| non_blank(Some(n)))
                    .unwrap_or_else(|| "document.pdf".to_string());
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                upload = Some(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some("asset_id") => asset_id = non_blank(Some(&field.text().await?)),
            _ => {}
        }
    }
    let upload =
        upload.ok_or_else(|| GmaoError::InvalidInput("missing `file` field".to_string()))?;
    Ok((upload, asset_id))
}

/// Store a PDF and start extraction in the background.
///
/// `202 Accepted` with the new document, or `200 OK` with the existing one
/// when the same bytes were uploaded before.
pub async fn upload_document(
    State(state): State<GmaoState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DbDocument>), GmaoError> {
    let (upload, asset_id) = read_upload(multipart?).await?;
    let limit = state.cfg.limits.max_upload_bytes;
    if upload.bytes.is_empty() {
        return Err(GmaoError::InvalidInput("file is empty".to_string()));
    }
    if upload.bytes.len() > limit {
        return Err(GmaoError::PayloadTooLarge { limit });
    }
    if !upload.bytes.starts_with(PDF_MAGIC) {
        return Err(GmaoError::UnsupportedFormat(format!(
            "only PDF documents are accepted (got {})",
            upload.content_type.as_deref().unwrap_or("unknown type")
        )));
    }
    if let Some(id) = asset_id.as_deref() {
        state.storage.get_asset(id).await?;
    }

    let hash = content_hash(&upload.bytes);
    if let Some(existing) = state.storage.find_document_by_hash(&hash).await? {
        info!(document_id = %existing.id, "duplicate upload, returning existing document");
        return Ok((StatusCode::OK, Json(existing)));
    }

    let path = state.blobs.put(&hash, "pdf", &upload.bytes).await?;
    let inserted = state
        .storage
        .insert_document(
            &upload.file_name,
            &hash,
            &path.to_string_lossy(),
            upload.bytes.len() as i64,
            asset_id.as_deref(),
        )
        .await;
    let doc = match inserted {
        Ok(doc) => doc,
        Err(e) => {
            // a concurrent upload of the same bytes won the unique hash
            if let Some(existing) = state.storage.find_document_by_hash(&hash).await? {
                return Ok((StatusCode::OK, Json(existing)));
            }
            return Err(e);
        }
    };

    info!(
        document_id = %doc.id,
        file_name = %doc.file_name,
        size = doc.size_bytes,
        "document stored, extraction scheduled"
    );
    state.pipeline.spawn(doc.id.clone());
    Ok((StatusCode::ACCEPTED, Json(doc)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    pub asset_id: Option<String>,
}

pub async fn list_documents(
    State(state): State<GmaoState>,
    GmaoQuery(q): GmaoQuery<DocumentQuery>,
) -> Result<Json<Vec<DbDocument>>, GmaoError> {
    let docs = state.storage.list_documents(q.asset_id.as_deref()).await?;
    Ok(Json(docs))
}

pub async fn get_document(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<Json<DbDocument>, GmaoError> {
    Ok(Json(state.storage.get_document(&id).await?))
}

pub async fn reprocess_document(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<(StatusCode, Json<DbDocument>), GmaoError> {
    let doc = state.storage.get_document(&id).await?;
    if doc.status == DocumentStatus::Failed {
        warn!(document_id = %id, error = ?doc.error, "reprocessing failed document");
    }
    if !state.storage.claim_document_for_processing(&id).await? {
        return Err(GmaoError::Conflict(
            "document is already being processed".to_string(),
        ));
    }
    state.pipeline.spawn(id.clone());
    Ok((StatusCode::ACCEPTED, Json(state.storage.get_document(&id).await?)))
}
