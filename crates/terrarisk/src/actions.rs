//! Scoring of catalog actions against risk dimensions and against
//! vulnerability-stratified municipality subsets.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::{self, Action, LayerCategory, Polarity};
use crate::dataset::DatasetAccessor;
use crate::round_to;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingRisk {
    pub layer_id: &'static str,
    pub evidence: u8,
}

/// An action scored against a set of risk layers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRelevance {
    pub id: &'static str,
    pub category: LayerCategory,
    pub relevance_score: u32,
    pub matching_risks: Vec<MatchingRisk>,
    pub matching_count: usize,
}

/// Score every catalog action against the given risk layers: relevance is
/// the summed evidence weight over the overlap. Zero-overlap actions are
/// excluded; ties keep catalog order.
pub fn actions_for_risks<S: AsRef<str>>(risk_layer_ids: &[S]) -> Vec<ActionRelevance> {
    let mut scored: Vec<ActionRelevance> = catalog::actions()
        .iter()
        .filter_map(|action| {
            let matching: Vec<MatchingRisk> = action
                .links
                .iter()
                .filter(|(layer_id, _)| {
                    risk_layer_ids.iter().any(|risk| risk.as_ref() == *layer_id)
                })
                .map(|&(layer_id, evidence)| MatchingRisk { layer_id, evidence })
                .collect();
            let relevance_score: u32 = matching.iter().map(|m| u32::from(m.evidence)).sum();
            (relevance_score > 0).then(|| ActionRelevance {
                id: action.id,
                category: action.category,
                relevance_score,
                matching_count: matching.len(),
                matching_risks: matching,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    scored
}

/// Catalog entry enriched with derived evidence statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCatalogEntry {
    pub id: &'static str,
    pub category: LayerCategory,
    pub links: BTreeMap<&'static str, u8>,
    pub total_links: usize,
    pub total_evidence: u32,
    pub avg_evidence: f64,
}

pub fn action_catalog_stats() -> Vec<ActionCatalogEntry> {
    catalog::actions()
        .iter()
        .map(|action| {
            let total_links = action.links.len();
            let total_evidence = action.total_evidence();
            ActionCatalogEntry {
                id: action.id,
                category: action.category,
                links: action.links.iter().copied().collect(),
                total_links,
                total_evidence,
                avg_evidence: round_to(f64::from(total_evidence) / total_links as f64, 2),
            }
        })
        .collect()
}

/// Normalized benefit of an action for a municipality subset described by
/// per-layer 0-100 averages.
///
/// A protective layer with low average capacity benefits strongly from an
/// action that builds it (weight * (100 - avg)/100); a risk layer with high
/// average exposure benefits strongly from mitigation (weight * avg/100).
/// Neutral layers are skipped. The total is normalized by the action's
/// maximum possible weighted sum, so the result lies in [0, 1].
pub fn vulnerability_benefit(action: &Action, averages: &BTreeMap<&'static str, f64>) -> f64 {
    let max_weight = f64::from(action.total_evidence());
    if max_weight == 0.0 {
        return 0.0;
    }

    let mut benefit = 0.0;
    for &(layer_id, weight) in action.links {
        let Some(layer) = catalog::layer(layer_id) else { continue };
        let Some(&average) = averages.get(layer_id) else { continue };
        let contribution = match layer.polarity {
            Polarity::Protective => (100.0 - average) / 100.0,
            Polarity::Risk => average / 100.0,
            Polarity::Neutral => continue,
        };
        benefit += f64::from(weight) * contribution;
    }
    benefit / max_weight
}

pub fn benefit_disparity(
    action: &Action,
    high_averages: &BTreeMap<&'static str, f64>,
    low_averages: &BTreeMap<&'static str, f64>,
) -> f64 {
    (vulnerability_benefit(action, high_averages) - vulnerability_benefit(action, low_averages))
        .abs()
}

/// Per-layer 0-100 average profile of one vulnerability subset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsetProfile {
    pub codes: Vec<String>,
    pub names: Vec<String>,
    pub averages: BTreeMap<&'static str, f64>,
}

/// How equitably one action benefits the two subsets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionImpact {
    pub action_id: &'static str,
    pub category: LayerCategory,
    pub high_benefit: f64,
    pub low_benefit: f64,
    pub disparity: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityComparison {
    pub high_vulnerability: SubsetProfile,
    pub low_vulnerability: SubsetProfile,
    pub action_impacts: Vec<ActionImpact>,
}

/// Split the workshop municipalities at their vulnerability-indicator median
/// into high and low subsets and measure every action's benefit disparity
/// between them. `None` when fewer than two workshop municipalities carry a
/// vulnerability value.
pub fn vulnerability_comparison(dataset: &DatasetAccessor) -> Option<VulnerabilityComparison> {
    let mut rows: Vec<_> = catalog::workshop_municipalities()
        .iter()
        .filter_map(|muni| dataset.by_name(muni.name))
        .filter_map(|row| {
            row.indicators
                .get(catalog::VULNERABILITY_LAYER)
                .map(|&vulnerability| (row, vulnerability))
        })
        .collect();
    if rows.len() < 2 {
        return None;
    }

    // Most vulnerable first; the top half is the high-vulnerability subset.
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).expect("vulnerability values are finite"));
    let mid = rows.len().div_ceil(2);
    let (high_rows, low_rows) = rows.split_at(mid);

    let high = subset_profile(dataset, high_rows);
    let low = subset_profile(dataset, low_rows);

    let mut action_impacts: Vec<ActionImpact> = catalog::actions()
        .iter()
        .map(|action| {
            let high_benefit = vulnerability_benefit(action, &high.averages);
            let low_benefit = vulnerability_benefit(action, &low.averages);
            ActionImpact {
                action_id: action.id,
                category: action.category,
                high_benefit: round_to(high_benefit, 3),
                low_benefit: round_to(low_benefit, 3),
                disparity: round_to((high_benefit - low_benefit).abs(), 3),
            }
        })
        .collect();
    action_impacts.sort_by(|a, b| {
        b.disparity.partial_cmp(&a.disparity).expect("disparities are finite")
    });

    Some(VulnerabilityComparison {
        high_vulnerability: high,
        low_vulnerability: low,
        action_impacts,
    })
}

fn subset_profile(
    dataset: &DatasetAccessor,
    rows: &[(&crate::dataset::Municipality, f64)],
) -> SubsetProfile {
    let mut sums: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
    for (row, _) in rows {
        if let Some(scores) = dataset.normalized_scores(&row.code) {
            for (layer_id, score) in scores {
                let entry = sums.entry(layer_id).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }
    }

    SubsetProfile {
        codes: rows.iter().map(|(row, _)| row.code.clone()).collect(),
        names: rows.iter().map(|(row, _)| row.name.clone()).collect(),
        averages: sums
            .into_iter()
            .map(|(layer_id, (sum, count))| (layer_id, round_to(sum / count as f64, 1)))
            .collect(),
    }
}
