use crate::infra::AppState;
use axum::extract::Path;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde_json::json;
use terrarisk::error::AppError;
use terrarisk::ledger::PurchaseStats;
use terrarisk::store::GroupRecord;

pub(crate) fn router() -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/reset/:group_id", post(reset_group))
        .route("/groups/:group_id", delete(delete_group))
}

pub(crate) async fn stats(
    Extension(state): Extension<AppState>,
) -> Result<Json<PurchaseStats>, AppError> {
    Ok(Json(state.ledger.purchase_stats()?))
}

pub(crate) async fn reset_group(
    Extension(state): Extension<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupRecord>, AppError> {
    Ok(Json(state.ledger.reset(&group_id)?))
}

pub(crate) async fn delete_group(
    Extension(state): Extension<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.ledger.delete(&group_id)?;
    Ok(Json(json!({ "status": "deleted", "groupId": group_id })))
}
