use axum::{
    Json,
    extract::State,
};
use serde::Deserialize;

use crate::db::DbDependencySuggestion;
use crate::error::GmaoError;
use crate::handlers::extract::{GmaoJson, GmaoPath, GmaoQuery};
use crate::router::GmaoState;
use crate::types::domain::SuggestionStatus;

#[derive(Debug, Deserialize)]
pub struct SuggestBody {
    pub text: String,
}

pub async fn suggest_dependencies(
    State(state): State<GmaoState>,
    GmaoJson(body): GmaoJson<SuggestBody>,
) -> Result<Json<Vec<DbDependencySuggestion>>, GmaoError> {
    Ok(Json(state.dependencies.suggest(&body.text).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionQuery {
    pub asset_id: Option<String>,
    pub status: Option<SuggestionStatus>,
}

pub async fn list_suggestions(
    State(state): State<GmaoState>,
    GmaoQuery(q): GmaoQuery<SuggestionQuery>,
) -> Result<Json<Vec<DbDependencySuggestion>>, GmaoError> {
    let rows = state
        .storage
        .list_suggestions(q.asset_id.as_deref(), q.status)
        .await?;
    Ok(Json(rows))
}

pub async fn accept_suggestion(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<Json<DbDependencySuggestion>, GmaoError> {
    let row = state
        .storage
        .review_suggestion(&id, SuggestionStatus::Accepted)
        .await?;
    Ok(Json(row))
}

pub async fn reject_suggestion(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<Json<DbDependencySuggestion>, GmaoError> {
    let row = state
        .storage
        .review_suggestion(&id, SuggestionStatus::Rejected)
        .await?;
    Ok(Json(row))
}
