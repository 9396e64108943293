//! Platform ranking: the group-independent priority order of the ten
//! workshop municipalities, derived from raw indicator data.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog;
use crate::dataset::{DatasetAccessor, Municipality};
use crate::round_to;

/// One municipality's place in the platform ranking, with the per-dimension
/// scores retained for downstream explanation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMunicipality {
    pub code: String,
    pub name: String,
    /// 1 = highest intervention priority.
    pub position: u32,
    pub composite_score: f64,
    pub risk_score: f64,
    pub protective_score: f64,
    /// Raw (median-imputed) indicator values per ranked dimension.
    pub dimension_scores: BTreeMap<&'static str, f64>,
}

/// Compute the platform ranking over the workshop municipalities present in
/// the dataset. Deterministic: normalization is min-max within the ranked
/// subset, missing values are imputed with the subset median, and ties on
/// the composite keep catalog order (stable sort).
pub fn compute_platform_ranking(dataset: &DatasetAccessor) -> Vec<RankedMunicipality> {
    // Assembled in workshop-catalog order, which is the tie-break order for
    // equal composites in the stable sort below.
    let rows: Vec<&Municipality> = catalog::workshop_municipalities()
        .iter()
        .filter_map(|muni| dataset.by_name(muni.name))
        .collect();
    if rows.is_empty() {
        return Vec::new();
    }

    // Per ranked dimension: imputed raw values and subset-normalized values,
    // aligned with `rows`. Dimensions absent from every row are dropped.
    let mut raw_by_dim: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
    let mut normalized_by_dim: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
    for layer in catalog::layers().iter().filter(|layer| layer.in_ranking) {
        let observed: Vec<Option<f64>> = rows
            .iter()
            .map(|row| row.indicators.get(layer.id).copied())
            .collect();
        let Some(imputed) = impute_with_median(&observed) else {
            continue;
        };
        normalized_by_dim.insert(layer.id, normalize_subset(&imputed));
        raw_by_dim.insert(layer.id, imputed);
    }

    let mut scored: Vec<(f64, RankedMunicipality)> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let risk: Vec<f64> = catalog::risk_dimensions()
                .filter_map(|layer| normalized_by_dim.get(layer.id).map(|values| values[idx]))
                .collect();
            let protective: Vec<f64> = catalog::protective_dimensions()
                .filter_map(|layer| normalized_by_dim.get(layer.id).map(|values| 1.0 - values[idx]))
                .collect();

            let risk_score = mean(&risk);
            let protective_score = mean(&protective);
            let composite = risk_score + protective_score;

            let dimension_scores = raw_by_dim
                .iter()
                .map(|(&dim, values)| (dim, values[idx]))
                .collect();

            (
                composite,
                RankedMunicipality {
                    code: row.code.clone(),
                    name: row.name.clone(),
                    position: 0,
                    composite_score: round_to(composite, 4),
                    risk_score: round_to(risk_score, 4),
                    protective_score: round_to(protective_score, 4),
                    dimension_scores,
                },
            )
        })
        .collect();

    // Stable sort on the unrounded composite; input order breaks ties.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).expect("composite scores are finite"));

    scored
        .into_iter()
        .enumerate()
        .map(|(idx, (_, mut ranked))| {
            ranked.position = idx as u32 + 1;
            ranked
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Replace missing values with the median of the present ones. `None` when
/// the dimension has no data at all.
fn impute_with_median(observed: &[Option<f64>]) -> Option<Vec<f64>> {
    let mut present: Vec<f64> = observed.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.partial_cmp(b).expect("indicator values are finite"));
    let mid = present.len() / 2;
    let median = if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    };
    Some(observed.iter().map(|value| value.unwrap_or(median)).collect())
}

/// Min-max normalization to [0, 1] within the ranked subset. Constant
/// columns carry no signal and normalize to 0.5 everywhere.
fn normalize_subset(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return vec![0.5; values.len()];
    }
    values.iter().map(|value| (value - min) / (max - min)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetAccessor;

    // Two workshop municipalities with opposed profiles plus one in between.
    // Iporanga: maximal risk, minimal governance/biodiversity.
    const FIXTURE: &str = "\
cod_ibge,Municipio,idx_gobernanza_100,UAI_Crisk,idx_biodiv,forest_cover,fire_risk_index,flooding_risks,idx_vulnerabilidad,pct_pobreza
3520699,Iporanga,10,0.1,20,30,90,80,0.9,40
3509502,Campinas,90,0.9,80,70,10,5,0.1,5
3548500,Santos,60,0.5,50,50,40,30,0.4,15
";

    fn fixture() -> DatasetAccessor {
        DatasetAccessor::from_reader(FIXTURE.as_bytes()).expect("fixture loads")
    }

    #[test]
    fn output_is_a_permutation_and_deterministic() {
        let dataset = fixture();
        let first = compute_platform_ranking(&dataset);
        let second = compute_platform_ranking(&dataset);

        assert_eq!(first.len(), 3);
        let mut positions: Vec<u32> = first.iter().map(|r| r.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 2, 3]);

        let codes_first: Vec<_> = first.iter().map(|r| r.code.as_str()).collect();
        let codes_second: Vec<_> = second.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes_first, codes_second);
    }

    #[test]
    fn max_risk_min_protective_ranks_first() {
        let ranking = compute_platform_ranking(&fixture());
        assert_eq!(ranking[0].name, "Iporanga");
        assert_eq!(ranking[0].position, 1);
        assert_eq!(ranking.last().expect("non-empty").name, "Campinas");
    }

    #[test]
    fn dimension_scores_are_retained() {
        let ranking = compute_platform_ranking(&fixture());
        let iporanga = ranking.iter().find(|r| r.name == "Iporanga").expect("present");
        assert_eq!(iporanga.dimension_scores.get("fire_risk"), Some(&90.0));
        assert!(iporanga.risk_score > 0.9);
        assert!(iporanga.protective_score > 0.9);
    }

    #[test]
    fn missing_values_are_imputed_with_subset_median() {
        let csv = "\
cod_ibge,Municipio,idx_gobernanza_100,fire_risk_index
3520699,Iporanga,10,
3509502,Campinas,90,10
3548500,Santos,60,40
";
        let dataset = DatasetAccessor::from_reader(csv.as_bytes()).expect("loads");
        let ranking = compute_platform_ranking(&dataset);
        let iporanga = ranking.iter().find(|r| r.name == "Iporanga").expect("present");
        // Median of (10, 40) = 25.
        assert_eq!(iporanga.dimension_scores.get("fire_risk"), Some(&25.0));
    }

    #[test]
    fn constant_dimension_contributes_half_everywhere() {
        let csv = "\
cod_ibge,Municipio,fire_risk_index
3520699,Iporanga,7
3509502,Campinas,7
";
        let dataset = DatasetAccessor::from_reader(csv.as_bytes()).expect("loads");
        let ranking = compute_platform_ranking(&dataset);
        for ranked in &ranking {
            assert_eq!(ranked.risk_score, 0.5);
        }
    }

    #[test]
    fn municipalities_absent_from_dataset_are_skipped() {
        let csv = "cod_ibge,Municipio,fire_risk_index\n3548500,Santos,10\n";
        let dataset = DatasetAccessor::from_reader(csv.as_bytes()).expect("loads");
        let ranking = compute_platform_ranking(&dataset);
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].position, 1);
    }
}
