use crate::infra::AppState;
use axum::extract::Path;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use terrarisk::catalog::{self, Layer, LayerCategory, Polarity};
use terrarisk::error::AppError;
use terrarisk::ledger::LedgerError;

pub(crate) fn router() -> Router {
    Router::new()
        .route("/", get(list_layers))
        .route("/:id", get(get_layer))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LayerView {
    pub(crate) id: &'static str,
    pub(crate) name: &'static str,
    pub(crate) category: LayerCategory,
    pub(crate) description: &'static str,
    pub(crate) cost: u32,
    pub(crate) indicator: &'static str,
    pub(crate) polarity: Polarity,
    pub(crate) is_free: bool,
    pub(crate) popularity: u64,
}

impl LayerView {
    fn from_layer(layer: &Layer, popularity: u64) -> Self {
        Self {
            id: layer.id,
            name: layer.name,
            category: layer.category,
            description: layer.description,
            cost: layer.cost,
            indicator: layer.indicator,
            polarity: layer.polarity,
            is_free: layer.is_free,
            popularity,
        }
    }
}

pub(crate) async fn list_layers(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<LayerView>>, AppError> {
    let popularity = state.ledger.layer_popularity()?;
    let views = catalog::layers()
        .iter()
        .map(|layer| {
            LayerView::from_layer(layer, popularity.get(layer.id).copied().unwrap_or(0))
        })
        .collect();
    Ok(Json(views))
}

pub(crate) async fn get_layer(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LayerView>, AppError> {
    let layer = catalog::layer(&id).ok_or(LedgerError::LayerNotFound(id))?;
    let popularity = state.ledger.layer_popularity()?;
    Ok(Json(LayerView::from_layer(
        layer,
        popularity.get(layer.id).copied().unwrap_or(0),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{test_state, SAMPLE_CSV};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use terrarisk::store::GroupProfile;

    #[tokio::test]
    async fn list_layers_reports_purchase_popularity() {
        let state = test_state(SAMPLE_CSV);
        let group = state
            .ledger
            .create("Equipo Verde", GroupProfile::default())
            .expect("group creates");
        state
            .ledger
            .purchase(&group.id, "dengue")
            .expect("purchase succeeds");

        let Json(views) = list_layers(Extension(state))
            .await
            .expect("catalog lists");
        assert_eq!(views.len(), 16);
        let dengue = views.iter().find(|view| view.id == "dengue").expect("in catalog");
        assert_eq!(dengue.popularity, 1);
        let flooding = views.iter().find(|view| view.id == "flooding").expect("in catalog");
        assert_eq!(flooding.popularity, 0);
    }

    #[tokio::test]
    async fn get_layer_maps_unknown_to_not_found() {
        let state = test_state(SAMPLE_CSV);

        let err = get_layer(Extension(state), Path("asteroid_impact".into()))
            .await
            .expect_err("unknown layer");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
