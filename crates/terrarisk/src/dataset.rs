//! Municipal dataset accessor.
//!
//! The table is loaded exactly once, at startup, and injected wherever it is
//! needed; there is no lazy global state. Column names are resolved against a
//! declared alias table in one pass, and per-indicator min/max statistics are
//! precomputed here so downstream engines never rescan the table.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::catalog;

/// Acceptable column names per semantic field, first match wins.
const CODE_ALIASES: &[&str] = &["cod_ibge", "CD_MUN", "codigo"];
const NAME_ALIASES: &[&str] = &["Municipio", "nome", "NM_MUN", "municipio", "name"];
const REGION_ALIASES: &[&str] = &["nome_mesorregiao", "regiao", "REGIAO", "region"];

/// Cap on name-search results.
const SEARCH_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to open dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset has no recognizable {field} column (accepted: {aliases:?})")]
    MissingColumn {
        field: &'static str,
        aliases: &'static [&'static str],
    },
}

/// One immutable municipality row. Indicator values are keyed by catalog
/// layer id; missing or non-numeric cells are simply absent.
#[derive(Debug, Clone, Serialize)]
pub struct Municipality {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub indicators: BTreeMap<&'static str, f64>,
}

/// Full-table value range for one indicator, missing cells excluded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorStats {
    pub min: f64,
    pub max: f64,
}

/// Per-code values for one indicator, with positional terciles for
/// choropleth-style consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorColumn {
    pub layer_id: &'static str,
    pub values: BTreeMap<String, Option<f64>>,
    pub terciles: [f64; 2],
    pub min: f64,
    pub max: f64,
}

#[derive(Debug)]
pub struct DatasetAccessor {
    rows: Vec<Municipality>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    stats: BTreeMap<&'static str, IndicatorStats>,
}

impl DatasetAccessor {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let code_idx = resolve_column(&headers, CODE_ALIASES)
            .ok_or(DatasetError::MissingColumn { field: "code", aliases: CODE_ALIASES })?;
        let name_idx = resolve_column(&headers, NAME_ALIASES)
            .ok_or(DatasetError::MissingColumn { field: "name", aliases: NAME_ALIASES })?;
        let region_idx = resolve_column(&headers, REGION_ALIASES);

        // Indicator columns resolved once; absent layers degrade silently.
        let indicator_columns: Vec<(&'static str, usize)> = catalog::layers()
            .iter()
            .filter_map(|layer| {
                header_index(&headers, layer.indicator).map(|idx| (layer.id, idx))
            })
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let code = normalize_code(record.get(code_idx).unwrap_or_default());
            if code.is_empty() {
                continue;
            }
            let name = record.get(name_idx).unwrap_or_default().trim().to_string();
            let region = region_idx
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);

            let mut indicators = BTreeMap::new();
            for &(layer_id, idx) in &indicator_columns {
                if let Some(value) = record.get(idx).and_then(parse_numeric) {
                    indicators.insert(layer_id, value);
                }
            }

            rows.push(Municipality { code, name, region, indicators });
        }

        let by_code = rows
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.code.clone(), pos))
            .collect();
        let by_name = rows
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.name.clone(), pos))
            .collect();
        let stats = compute_stats(&rows);

        Ok(Self { rows, by_code, by_name, stats })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn all(&self) -> &[Municipality] {
        &self.rows
    }

    /// Exact lookup after code normalization.
    pub fn get(&self, code: &str) -> Option<&Municipality> {
        let code = normalize_code(code);
        self.by_code.get(&code).map(|&pos| &self.rows[pos])
    }

    /// Exact name lookup, used to resolve the workshop municipalities.
    pub fn by_name(&self, name: &str) -> Option<&Municipality> {
        self.by_name.get(name.trim()).map(|&pos| &self.rows[pos])
    }

    /// Case-insensitive substring search over names, capped at 20 matches.
    pub fn search(&self, query: &str) -> Vec<&Municipality> {
        let query = query.trim().to_lowercase();
        self.rows
            .iter()
            .filter(|row| row.name.to_lowercase().contains(&query))
            .take(SEARCH_LIMIT)
            .collect()
    }

    /// Precomputed full-table min/max per catalog layer. Layers whose column
    /// is absent or entirely non-numeric have no entry.
    pub fn indicator_stats(&self) -> &BTreeMap<&'static str, IndicatorStats> {
        &self.stats
    }

    /// Per-layer 0-100 min-max score for one municipality against the full
    /// table. Layers without stats are omitted; unknown codes return `None`.
    pub fn normalized_scores(&self, code: &str) -> Option<BTreeMap<&'static str, f64>> {
        let row = self.get(code)?;
        let mut scores = BTreeMap::new();
        for (&layer_id, stats) in &self.stats {
            if let Some(&value) = row.indicators.get(layer_id) {
                scores.insert(layer_id, normalize_0_100(value, stats));
            }
        }
        Some(scores)
    }

    /// Mean 0-100 score per category for one municipality.
    pub fn category_scores(&self, code: &str) -> Option<BTreeMap<&'static str, f64>> {
        let scores = self.normalized_scores(code)?;
        let mut sums: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
        for layer in catalog::layers() {
            if let Some(&score) = scores.get(layer.id) {
                let entry = sums.entry(layer.category.label()).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }
        Some(
            sums.into_iter()
                .map(|(category, (sum, count))| (category, sum / count as f64))
                .collect(),
        )
    }

    /// All values for one layer keyed by municipality code, with positional
    /// terciles over the present values.
    pub fn indicator_values(&self, layer_id: &str) -> Option<IndicatorColumn> {
        let layer = catalog::layer(layer_id)?;
        let stats = *self.stats.get(layer.id)?;

        let mut values = BTreeMap::new();
        let mut present = Vec::new();
        for row in &self.rows {
            let value = row.indicators.get(layer.id).copied();
            if let Some(value) = value {
                present.push(value);
            }
            values.insert(row.code.clone(), value);
        }
        present.sort_by(|a, b| a.partial_cmp(b).expect("indicator values are finite"));

        let n = present.len();
        let terciles = [
            present[(n as f64 * 0.33) as usize],
            present[(n as f64 * 0.66) as usize],
        ];

        Some(IndicatorColumn {
            layer_id: layer.id,
            values,
            terciles,
            min: stats.min,
            max: stats.max,
        })
    }
}

fn resolve_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| header_index(headers, alias))
}

fn header_index(headers: &csv::StringRecord, wanted: &str) -> Option<usize> {
    headers.iter().position(|header| header == wanted)
}

/// Trims and strips a trailing `.0` left behind by float-formatted codes.
fn normalize_code(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0") {
        Some(stem) if !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()) => {
            stem.to_string()
        }
        _ => trimmed.to_string(),
    }
}

fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn compute_stats(rows: &[Municipality]) -> BTreeMap<&'static str, IndicatorStats> {
    let mut stats = BTreeMap::new();
    for layer in catalog::layers() {
        let mut range: Option<IndicatorStats> = None;
        for row in rows {
            if let Some(&value) = row.indicators.get(layer.id) {
                range = Some(match range {
                    None => IndicatorStats { min: value, max: value },
                    Some(current) => IndicatorStats {
                        min: current.min.min(value),
                        max: current.max.max(value),
                    },
                });
            }
        }
        if let Some(range) = range {
            stats.insert(layer.id, range);
        }
    }
    stats
}

fn normalize_0_100(value: f64, stats: &IndicatorStats) -> f64 {
    if stats.max == stats.min {
        50.0
    } else {
        (value - stats.min) / (stats.max - stats.min) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
cod_ibge,Municipio,nome_mesorregiao,idx_gobernanza_100,idx_vulnerabilidad,fire_risk_index
3550308,São Paulo,Metropolitana,80,0.2,10
3509502,Campinas,Campinas,70,0.3,20
3520699,Iporanga,Vale do Ribeira,30,0.9,40
";

    fn sample() -> DatasetAccessor {
        DatasetAccessor::from_reader(SAMPLE.as_bytes()).expect("sample dataset loads")
    }

    #[test]
    fn resolves_aliased_columns_and_rows() {
        let dataset = sample();
        assert_eq!(dataset.len(), 3);
        let sp = dataset.get("3550308").expect("São Paulo present");
        assert_eq!(sp.name, "São Paulo");
        assert_eq!(sp.region.as_deref(), Some("Metropolitana"));
        assert_eq!(sp.indicators.get("governance_general"), Some(&80.0));
    }

    #[test]
    fn alternative_code_column_resolves() {
        let csv = "CD_MUN,name\n123,Testville\n";
        let dataset = DatasetAccessor::from_reader(csv.as_bytes()).expect("loads");
        assert!(dataset.get("123").is_some());
    }

    #[test]
    fn missing_code_column_is_a_schema_error() {
        let csv = "Municipio,idx_biodiv\nSantos,1\n";
        let err = DatasetAccessor::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { field: "code", .. }));
    }

    #[test]
    fn float_formatted_codes_are_normalized() {
        let csv = "cod_ibge,Municipio\n3550308.0,São Paulo\n";
        let dataset = DatasetAccessor::from_reader(csv.as_bytes()).expect("loads");
        assert!(dataset.get("3550308").is_some());
        assert!(dataset.get(" 3550308 ").is_some());
    }

    #[test]
    fn non_numeric_and_missing_cells_are_excluded_from_stats() {
        let csv = "\
cod_ibge,Municipio,fire_risk_index,idx_biodiv
1,A,10,n/a
2,B,,none
3,C,30,
";
        let dataset = DatasetAccessor::from_reader(csv.as_bytes()).expect("loads");
        let stats = dataset.indicator_stats();
        let fire = stats.get("fire_risk").expect("fire stats present");
        assert_eq!((fire.min, fire.max), (10.0, 30.0));
        // Entirely non-numeric column is omitted rather than failing.
        assert!(!stats.contains_key("biodiversity"));
    }

    #[test]
    fn search_is_case_insensitive_and_capped() {
        let dataset = sample();
        let hits = dataset.search("sÃo");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "São Paulo");

        let mut csv = String::from("cod_ibge,Municipio\n");
        for i in 0..30 {
            csv.push_str(&format!("{i},Municipio {i}\n"));
        }
        let big = DatasetAccessor::from_reader(csv.as_bytes()).expect("loads");
        assert_eq!(big.search("municipio").len(), 20);
    }

    #[test]
    fn normalized_scores_span_zero_to_hundred() {
        let dataset = sample();
        let low = dataset.normalized_scores("3550308").expect("scores");
        let high = dataset.normalized_scores("3520699").expect("scores");
        assert_eq!(low.get("fire_risk"), Some(&0.0));
        assert_eq!(high.get("fire_risk"), Some(&100.0));
        assert_eq!(high.get("vulnerability"), Some(&100.0));
    }

    #[test]
    fn unknown_code_yields_no_scores() {
        assert!(sample().normalized_scores("nope").is_none());
    }

    #[test]
    fn indicator_values_include_missing_codes_as_null() {
        let csv = "\
cod_ibge,Municipio,fire_risk_index
1,A,10
2,B,
3,C,30
";
        let dataset = DatasetAccessor::from_reader(csv.as_bytes()).expect("loads");
        let column = dataset.indicator_values("fire_risk").expect("column");
        assert_eq!(column.values.get("2"), Some(&None));
        assert_eq!((column.min, column.max), (10.0, 30.0));
        assert!(dataset.indicator_values("not_a_layer").is_none());
    }

    #[test]
    fn category_scores_average_layers_within_category() {
        let dataset = sample();
        let scores = dataset.category_scores("3509502").expect("scores");
        // Social category holds only vulnerability here: (0.3-0.2)/(0.9-0.2)*100.
        let social = scores.get("social").expect("social score");
        assert!((social - 14.285714).abs() < 1e-4);
    }
}
