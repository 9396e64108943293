use crate::infra::AppState;
use crate::routes::not_found;
use axum::extract::{Path, Query};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use terrarisk::error::AppError;
use terrarisk::ledger::LedgerError;

pub(crate) fn router() -> Router {
    Router::new()
        .route("/", get(list_municipalities))
        .route("/search", get(search_municipalities))
        .route("/values/:layer_id", get(indicator_values))
        .route("/:code", get(get_municipality))
}

#[derive(Debug, Serialize)]
pub(crate) struct MunicipalitySummary {
    pub(crate) code: String,
    pub(crate) name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    pub(crate) q: String,
}

pub(crate) async fn list_municipalities(
    Extension(state): Extension<AppState>,
) -> Json<Vec<MunicipalitySummary>> {
    let summaries = state
        .dataset
        .all()
        .iter()
        .map(|row| MunicipalitySummary {
            code: row.code.clone(),
            name: row.name.clone(),
            region: row.region.clone(),
        })
        .collect();
    Json(summaries)
}

pub(crate) async fn search_municipalities(
    Extension(state): Extension<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MunicipalitySummary>>, AppError> {
    let query = params.q.trim();
    if query.chars().count() < 2 {
        return Err(LedgerError::InvalidInput(
            "search query must be at least 2 characters".into(),
        )
        .into());
    }

    let matches = state
        .dataset
        .search(query)
        .into_iter()
        .map(|row| MunicipalitySummary {
            code: row.code.clone(),
            name: row.name.clone(),
            region: row.region.clone(),
        })
        .collect();
    Ok(Json(matches))
}

pub(crate) async fn indicator_values(
    Extension(state): Extension<AppState>,
    Path(layer_id): Path<String>,
) -> Response {
    match state.dataset.indicator_values(&layer_id) {
        Some(column) => Json(column).into_response(),
        None => not_found(format!("no indicator data for layer '{layer_id}'")),
    }
}

pub(crate) async fn get_municipality(
    Extension(state): Extension<AppState>,
    Path(code): Path<String>,
) -> Response {
    match state.dataset.get(&code) {
        Some(row) => Json(row.clone()).into_response(),
        None => not_found(format!("municipality '{code}' not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{test_state, SAMPLE_CSV};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn search_rejects_short_queries() {
        let state = test_state(SAMPLE_CSV);

        let err = search_municipalities(
            Extension(state),
            Query(SearchParams { q: "s".into() }),
        )
        .await
        .expect_err("one-char query is invalid");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_matches_case_insensitively() {
        let state = test_state(SAMPLE_CSV);

        let Json(matches) = search_municipalities(
            Extension(state),
            Query(SearchParams { q: "CAMPI".into() }),
        )
        .await
        .expect("query is long enough");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Campinas");
    }

    #[tokio::test]
    async fn get_municipality_handles_unknown_codes() {
        let state = test_state(SAMPLE_CSV);

        let response = get_municipality(Extension(state.clone()), Path("9999999".into())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get_municipality(Extension(state), Path("3509502".into())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn indicator_values_requires_known_layer_with_data() {
        let state = test_state(SAMPLE_CSV);

        let response =
            indicator_values(Extension(state.clone()), Path("fire_risk".into())).await;
        assert_eq!(response.status(), StatusCode::OK);

        // In the catalog but absent from the sample dataset.
        let response = indicator_values(Extension(state), Path("dengue".into())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
