use crate::infra::AppState;
use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use terrarisk::error::AppError;
use terrarisk::store::{GroupProfile, GroupRecord};

pub(crate) fn router() -> Router {
    Router::new()
        .route("/", post(create_group).get(list_groups))
        .route("/:id", get(get_group))
        .route("/:id/purchase", post(purchase_layer))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateGroupRequest {
    pub(crate) name: String,
    #[serde(flatten)]
    pub(crate) profile: GroupProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PurchaseRequest {
    pub(crate) layer_id: String,
}

pub(crate) async fn create_group(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<Json<GroupRecord>, AppError> {
    let group = state.ledger.create(&payload.name, payload.profile)?;
    Ok(Json(group))
}

pub(crate) async fn list_groups(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<GroupRecord>>, AppError> {
    Ok(Json(state.ledger.list()?))
}

pub(crate) async fn get_group(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GroupRecord>, AppError> {
    Ok(Json(state.ledger.get(&id)?))
}

pub(crate) async fn purchase_layer(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<PurchaseRequest>,
) -> Result<Json<GroupRecord>, AppError> {
    let group = state.ledger.purchase(&id, &payload.layer_id)?;
    Ok(Json(group))
}
