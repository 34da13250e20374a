use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::db::patch::{AssetCreate, AssetPatch};
use crate::db::{
    AssetWithAliases, DbAsset, DbComponent, DbMaintenancePlan, DbSparePart,
};
use crate::error::GmaoError;
use crate::handlers::extract::{GmaoJson, GmaoPath};
use crate::router::GmaoState;
use crate::service::qr;

/// Everything known about one asset.
#[derive(Debug, Serialize)]
pub struct AssetDetail {
    #[serde(flatten)]
    pub asset: DbAsset,
    pub aliases: Vec<String>,
    pub components: Vec<DbComponent>,
    pub spare_parts: Vec<DbSparePart>,
    pub maintenance_plans: Vec<DbMaintenancePlan>,
}

async fn detail(state: &GmaoState, asset: DbAsset) -> Result<AssetDetail, GmaoError> {
    let storage = &state.storage;
    Ok(AssetDetail {
        aliases: storage.list_aliases(&asset.id).await?,
        components: storage.list_components(&asset.id).await?,
        spare_parts: storage.list_spare_parts(&asset.id).await?,
        maintenance_plans: storage.list_maintenance_plans(&asset.id).await?,
        asset,
    })
}

pub async fn list_assets(
    State(state): State<GmaoState>,
) -> Result<Json<Vec<AssetWithAliases>>, GmaoError> {
    Ok(Json(state.storage.list_assets_with_aliases().await?))
}

pub async fn create_asset(
    State(state): State<GmaoState>,
    GmaoJson(mut new): GmaoJson<AssetCreate>,
) -> Result<(StatusCode, Json<DbAsset>), GmaoError> {
    if new.name.trim().is_empty() {
        return Err(GmaoError::InvalidInput("name is required".to_string()));
    }
    if let Some(parent) = new.parent_id.as_deref() {
        state.storage.get_asset(parent).await?;
    }
    new.source_document_id = None;
    let asset = state.storage.insert_asset(new).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn get_asset(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<Json<AssetDetail>, GmaoError> {
    let asset = state.storage.get_asset(&id).await?;
    Ok(Json(detail(&state, asset).await?))
}

pub async fn update_asset(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
    GmaoJson(patch): GmaoJson<AssetPatch>,
) -> Result<Json<DbAsset>, GmaoError> {
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(GmaoError::InvalidInput("name is required".to_string()));
    }
    if let Some(Some(parent)) = patch.parent_id.as_ref()
        && parent != &id
    {
        state.storage.get_asset(parent).await?;
    }
    Ok(Json(state.storage.update_asset(&id, patch).await?))
}

pub async fn delete_asset(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<StatusCode, GmaoError> {
    state.storage.delete_asset(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AliasBody {
    pub alias: String,
}

/// `201` when the alias is new, `200` when an equivalent one already existed.
pub async fn add_alias(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
    GmaoJson(body): GmaoJson<AliasBody>,
) -> Result<(StatusCode, Json<Vec<String>>), GmaoError> {
    state.storage.get_asset(&id).await?;
    let created = state.storage.add_alias(&id, &body.alias).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(state.storage.list_aliases(&id).await?)))
}

/// The asset's lookup code as a printable SVG QR label.
pub async fn asset_qr(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<impl IntoResponse, GmaoError> {
    let asset = state.storage.get_asset(&id).await?;
    let svg = qr::render_svg(&asset.qr_code)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

/// Resolve a scanned code to its asset.
pub async fn asset_by_qr(
    State(state): State<GmaoState>,
    GmaoPath(code): GmaoPath<String>,
) -> Result<Json<AssetDetail>, GmaoError> {
    let asset = state.storage.get_asset_by_qr(&code).await?;
    Ok(Json(detail(&state, asset).await?))
}
