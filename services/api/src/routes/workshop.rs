use std::collections::BTreeMap;

use crate::infra::AppState;
use crate::routes::not_found;
use axum::extract::{Path, Query};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use terrarisk::actions::{self, ActionCatalogEntry, ActionRelevance};
use terrarisk::catalog::{self, Polarity, Quadrant};
use terrarisk::comparison::{
    perspective_change, ranking_difference, CorrelationPair, PerspectiveChange,
    PositionDifference,
};
use terrarisk::error::AppError;
use terrarisk::ledger::LedgerError;
use terrarisk::ranking::RankedMunicipality;
use terrarisk::round_to;
use terrarisk::store::{RankingEntry, RankingPhase, StoredRanking};

/// Fallback risk set suggested to groups that own no risk layer yet.
const DEFAULT_HIGH_RISK_LAYERS: [&str; 7] = [
    "fire_risk",
    "flooding",
    "dengue",
    "diarrhea",
    "cv_mortality",
    "poverty",
    "vulnerability",
];

pub(crate) fn router() -> Router {
    Router::new()
        .route("/municipalities", get(workshop_municipalities))
        .route("/actions", get(action_catalog))
        .route("/actions/save", post(save_actions))
        .route("/ranking", post(submit_ranking))
        .route("/rankings/:group_id", get(group_rankings))
        .route("/comparison/:group_id", get(comparison))
        .route("/radar", get(radar))
        .route("/vulnerability-comparison", get(vulnerability_comparison))
        .route("/perspective-change/:group_id", get(perspective))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkshopMunicipalityView {
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) quadrant: Quadrant,
    pub(crate) description: &'static str,
    /// Mean raw indicator value per catalog category.
    pub(crate) risk_summary: BTreeMap<&'static str, f64>,
}

pub(crate) async fn workshop_municipalities(
    Extension(state): Extension<AppState>,
) -> Json<Vec<WorkshopMunicipalityView>> {
    let views = catalog::workshop_municipalities()
        .iter()
        .filter_map(|muni| {
            let row = state.dataset.by_name(muni.name)?;

            let mut sums: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
            for layer in catalog::layers() {
                // Context-only layers never enter the summary.
                if layer.polarity == Polarity::Neutral {
                    continue;
                }
                if let Some(&value) = row.indicators.get(layer.id) {
                    let entry = sums.entry(layer.category.label()).or_insert((0.0, 0));
                    entry.0 += value;
                    entry.1 += 1;
                }
            }
            let risk_summary = sums
                .into_iter()
                .map(|(category, (sum, count))| (category, round_to(sum / count as f64, 3)))
                .collect();

            Some(WorkshopMunicipalityView {
                code: row.code.clone(),
                name: row.name.clone(),
                quadrant: muni.quadrant,
                description: muni.quadrant.description(),
                risk_summary,
            })
        })
        .collect();
    Json(views)
}

pub(crate) async fn action_catalog() -> Json<Vec<ActionCatalogEntry>> {
    Json(actions::action_catalog_stats())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitRankingRequest {
    pub(crate) group_id: String,
    pub(crate) phase: String,
    pub(crate) ranking: Vec<RankingEntry>,
}

pub(crate) async fn submit_ranking(
    Extension(state): Extension<AppState>,
    Json(payload): Json<SubmitRankingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let phase: RankingPhase = payload
        .phase
        .parse()
        .map_err(|_| LedgerError::InvalidInput(format!("unknown phase '{}'", payload.phase)))?;
    state
        .ledger
        .submit_ranking(&payload.group_id, phase, payload.ranking)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RankingsResponse {
    pub(crate) initial: Option<StoredRanking>,
    pub(crate) revised: Option<StoredRanking>,
    pub(crate) platform: Vec<RankedMunicipality>,
}

pub(crate) async fn group_rankings(
    Extension(state): Extension<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<RankingsResponse>, AppError> {
    let snapshots = state.ledger.rankings(&group_id)?;
    Ok(Json(RankingsResponse {
        initial: snapshots.initial,
        revised: snapshots.revised,
        platform: state.platform.as_ref().clone(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveActionsRequest {
    pub(crate) group_id: String,
    pub(crate) selected_actions: Vec<String>,
}

pub(crate) async fn save_actions(
    Extension(state): Extension<AppState>,
    Json(payload): Json<SaveActionsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .ledger
        .save_selected_actions(&payload.group_id, payload.selected_actions)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ComparisonResponse {
    pub(crate) user_ranking: StoredRanking,
    pub(crate) platform_ranking: Vec<RankedMunicipality>,
    pub(crate) ranking_correlation: CorrelationPair,
    pub(crate) position_differences: Vec<PositionDifference>,
    pub(crate) user_actions: Vec<String>,
    pub(crate) suggested_actions: Vec<ActionRelevance>,
    pub(crate) action_overlap: f64,
}

pub(crate) async fn comparison(
    Extension(state): Extension<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<ComparisonResponse>, AppError> {
    let group = state.ledger.get(&group_id)?;
    let snapshots = state.ledger.rankings(&group_id)?;
    let user_ranking = snapshots
        .revised
        .or(snapshots.initial)
        .ok_or_else(|| LedgerError::RankingNotFound(group_id.clone()))?;

    let difference = ranking_difference(&user_ranking.entries, &state.platform);

    let mut risk_layers: Vec<String> = group
        .purchased_layers
        .iter()
        .cloned()
        .chain(catalog::free_layer_ids().map(str::to_string))
        .filter(|id| catalog::layer(id).is_some_and(|layer| layer.polarity == Polarity::Risk))
        .collect();
    if risk_layers.is_empty() {
        risk_layers = DEFAULT_HIGH_RISK_LAYERS.iter().map(|id| id.to_string()).collect();
    }
    let mut suggested_actions = actions::actions_for_risks(&risk_layers);
    suggested_actions.truncate(10);

    let user_actions = state.ledger.selected_actions(&group_id)?;
    let overlap = user_actions
        .iter()
        .filter(|id| suggested_actions.iter().any(|action| action.id == id.as_str()))
        .count();
    let action_overlap = if user_actions.is_empty() {
        0.0
    } else {
        round_to(overlap as f64 / user_actions.len() as f64 * 100.0, 1)
    };

    Ok(Json(ComparisonResponse {
        user_ranking,
        platform_ranking: state.platform.as_ref().clone(),
        ranking_correlation: CorrelationPair {
            spearman: difference.spearman,
            kendall: difference.kendall,
        },
        position_differences: difference.position_differences,
        user_actions,
        suggested_actions,
        action_overlap,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RadarParams {
    pub(crate) codes: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RadarEntry {
    pub(crate) code: String,
    pub(crate) name: String,
    /// Mean normalized (0-100) layer score per category.
    pub(crate) scores: BTreeMap<&'static str, f64>,
}

pub(crate) async fn radar(
    Extension(state): Extension<AppState>,
    Query(params): Query<RadarParams>,
) -> Json<Vec<RadarEntry>> {
    let entries = params
        .codes
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .filter_map(|code| {
            let row = state.dataset.get(code)?;
            let scores = state
                .dataset
                .category_scores(code)?
                .into_iter()
                .map(|(category, score)| (category, round_to(score, 1)))
                .collect();
            Some(RadarEntry {
                code: row.code.clone(),
                name: row.name.clone(),
                scores,
            })
        })
        .collect();
    Json(entries)
}

pub(crate) async fn vulnerability_comparison(
    Extension(state): Extension<AppState>,
) -> Response {
    match actions::vulnerability_comparison(&state.dataset) {
        Some(comparison) => Json(comparison).into_response(),
        None => not_found("not enough vulnerability data for a comparison".into()),
    }
}

pub(crate) async fn perspective(
    Extension(state): Extension<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<PerspectiveChange>, AppError> {
    let group = state.ledger.get(&group_id)?;
    let snapshots = state.ledger.rankings(&group_id)?;
    let initial = snapshots
        .initial
        .ok_or_else(|| LedgerError::RankingNotFound(group_id.clone()))?;

    let data_layers_used = group.purchased_layers.len() + catalog::free_layer_ids().count();
    let credits_spent = state.ledger.initial_credits().saturating_sub(group.credits);

    let payload = perspective_change(
        &initial,
        snapshots.revised.as_ref(),
        &state.platform,
        data_layers_used,
        credits_spent,
    );
    Ok(Json(payload))
}
