use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

use crate::db::DbWorkOrder;
use crate::db::patch::{WorkOrderCreate, WorkOrderPatch};
use crate::error::GmaoError;
use crate::handlers::extract::{GmaoJson, GmaoPath, GmaoQuery};
use crate::router::GmaoState;
use crate::types::domain::WorkOrderStatus;

#[derive(Debug, Default, Deserialize)]
pub struct WorkOrderQuery {
    pub asset_id: Option<String>,
    pub status: Option<WorkOrderStatus>,
}

pub async fn list_work_orders(
    State(state): State<GmaoState>,
    GmaoQuery(q): GmaoQuery<WorkOrderQuery>,
) -> Result<Json<Vec<DbWorkOrder>>, GmaoError> {
    let rows = state
        .storage
        .list_work_orders(q.asset_id.as_deref(), q.status)
        .await?;
    Ok(Json(rows))
}

pub async fn create_work_order(
    State(state): State<GmaoState>,
    GmaoJson(new): GmaoJson<WorkOrderCreate>,
) -> Result<(StatusCode, Json<DbWorkOrder>), GmaoError> {
    let wo = state.storage.insert_work_order(new).await?;
    info!(work_order_id = %wo.id, asset_id = ?wo.asset_id, "work order opened");
    Ok((StatusCode::CREATED, Json(wo)))
}

pub async fn get_work_order(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
) -> Result<Json<DbWorkOrder>, GmaoError> {
    Ok(Json(state.storage.get_work_order(&id).await?))
}

/// Partial update; status changes must follow the work-order lifecycle.
pub async fn update_work_order(
    State(state): State<GmaoState>,
    GmaoPath(id): GmaoPath<String>,
    GmaoJson(patch): GmaoJson<WorkOrderPatch>,
) -> Result<Json<DbWorkOrder>, GmaoError> {
    let wo = state.storage.update_work_order(&id, patch).await?;
    info!(work_order_id = %wo.id, status = wo.status.as_str(), "work order updated");
    Ok(Json(wo))
}
