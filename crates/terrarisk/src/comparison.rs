//! Rank-correlation statistics and ranking comparison analytics.
//!
//! Correlations over fewer than the required pairs are a legitimate
//! degenerate case and yield `None`, never an error.

use std::collections::HashMap;

use serde::Serialize;

use crate::ranking::RankedMunicipality;
use crate::round_to;
use crate::store::StoredRanking;

/// Spearman's rank correlation: 1 - 6*sum(d^2) / (n*(n^2-1)).
///
/// `None` for mismatched lengths or empty input; exactly 1.0 for the
/// degenerate single-pair case.
pub fn spearman(ranks_a: &[u32], ranks_b: &[u32]) -> Option<f64> {
    if ranks_a.len() != ranks_b.len() || ranks_a.is_empty() {
        return None;
    }
    let n = ranks_a.len();
    if n == 1 {
        return Some(1.0);
    }

    let d_squared_sum: f64 = ranks_a
        .iter()
        .zip(ranks_b)
        .map(|(&a, &b)| {
            let d = f64::from(a) - f64::from(b);
            d * d
        })
        .sum();
    let n = n as f64;
    Some(1.0 - (6.0 * d_squared_sum) / (n * (n * n - 1.0)))
}

/// Kendall's tau over all C(n,2) unordered pairs. Pairs tied in either
/// ranking contribute to neither count. Symmetric in its arguments.
pub fn kendall(ranks_a: &[u32], ranks_b: &[u32]) -> Option<f64> {
    if ranks_a.len() != ranks_b.len() || ranks_a.is_empty() {
        return None;
    }
    let n = ranks_a.len();
    let total_pairs = n * (n - 1) / 2;
    if total_pairs == 0 {
        return None;
    }

    let mut concordant = 0i64;
    let mut discordant = 0i64;
    for i in 0..n {
        for j in (i + 1)..n {
            let sign_a = (i64::from(ranks_a[j]) - i64::from(ranks_a[i])).signum();
            let sign_b = (i64::from(ranks_b[j]) - i64::from(ranks_b[i])).signum();
            match sign_a * sign_b {
                1 => concordant += 1,
                -1 => discordant += 1,
                _ => {}
            }
        }
    }

    Some((concordant - discordant) as f64 / total_pairs as f64)
}

/// Signed placement disagreement for one municipality.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDifference {
    pub code: String,
    pub name: String,
    pub user_position: u32,
    pub platform_position: u32,
    /// user - platform; positive means the group ranked it less urgent.
    pub difference: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingDifference {
    pub spearman: Option<f64>,
    pub kendall: Option<f64>,
    pub position_differences: Vec<PositionDifference>,
}

/// Compare a group ranking against the platform ranking over their common
/// municipality codes. Differences are sorted by absolute magnitude
/// descending so the largest disagreements surface first.
pub fn ranking_difference(
    user: &[crate::store::RankingEntry],
    platform: &[RankedMunicipality],
) -> RankingDifference {
    let user_positions: HashMap<&str, u32> = user
        .iter()
        .map(|entry| (entry.code.as_str(), entry.position))
        .collect();

    // Platform order keeps the pairing deterministic.
    let mut user_ranks = Vec::new();
    let mut platform_ranks = Vec::new();
    let mut differences = Vec::new();
    for ranked in platform {
        let Some(&user_position) = user_positions.get(ranked.code.as_str()) else {
            continue;
        };
        user_ranks.push(user_position);
        platform_ranks.push(ranked.position);
        differences.push(PositionDifference {
            code: ranked.code.clone(),
            name: ranked.name.clone(),
            user_position,
            platform_position: ranked.position,
            difference: user_position as i32 - ranked.position as i32,
        });
    }

    differences.sort_by(|a, b| b.difference.abs().cmp(&a.difference.abs()));

    RankingDifference {
        spearman: spearman(&user_ranks, &platform_ranks).map(|value| round_to(value, 3)),
        kendall: kendall(&user_ranks, &platform_ranks).map(|value| round_to(value, 3)),
        position_differences: differences,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Promoted,
    Demoted,
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityChange {
    pub code: String,
    pub name: String,
    pub initial_position: u32,
    pub revised_position: u32,
    /// initial - revised; positive = promoted to higher priority.
    pub position_change: i32,
    pub change_type: ChangeKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPair {
    pub spearman: Option<f64>,
    pub kendall: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Convergence {
    pub initial_spearman: Option<f64>,
    pub revised_spearman: Option<f64>,
    /// Correlation delta scaled to a percentage: positive means the revised
    /// ranking moved closer to the platform ranking.
    pub improvement: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveChange {
    pub total_position_changes: usize,
    pub average_position_shift: f64,
    pub max_position_shift: u32,
    pub unchanged_count: usize,
    pub promotions: usize,
    pub demotions: usize,
    pub top_three_changes: bool,
    pub bottom_three_changes: bool,
    pub initial_vs_revised_correlation: CorrelationPair,
    pub municipality_changes: Vec<MunicipalityChange>,
    pub convergence_with_platform: Convergence,
    pub data_layers_used: usize,
    pub credits_spent: u32,
}

/// Measure how a group's view shifted between its initial and revised
/// rankings, and whether it converged toward the platform ranking. A missing
/// revised snapshot means no revision yet: the initial ranking stands in for
/// it and every change is zero.
pub fn perspective_change(
    initial: &StoredRanking,
    revised: Option<&StoredRanking>,
    platform: &[RankedMunicipality],
    data_layers_used: usize,
    credits_spent: u32,
) -> PerspectiveChange {
    let revised = revised.unwrap_or(initial);
    let revised_positions: HashMap<&str, u32> = revised
        .entries
        .iter()
        .map(|entry| (entry.code.as_str(), entry.position))
        .collect();
    let names: HashMap<&str, &str> = platform
        .iter()
        .map(|ranked| (ranked.code.as_str(), ranked.name.as_str()))
        .collect();

    let mut ordered = initial.entries.clone();
    ordered.sort_by_key(|entry| entry.position);

    let mut changes = Vec::new();
    let mut initial_ranks = Vec::new();
    let mut revised_ranks = Vec::new();
    for entry in &ordered {
        let Some(&revised_position) = revised_positions.get(entry.code.as_str()) else {
            continue;
        };
        let position_change = entry.position as i32 - revised_position as i32;
        let change_type = match position_change {
            change if change > 0 => ChangeKind::Promoted,
            change if change < 0 => ChangeKind::Demoted,
            _ => ChangeKind::Unchanged,
        };
        initial_ranks.push(entry.position);
        revised_ranks.push(revised_position);
        changes.push(MunicipalityChange {
            code: entry.code.clone(),
            name: names.get(entry.code.as_str()).unwrap_or(&entry.code.as_str()).to_string(),
            initial_position: entry.position,
            revised_position,
            position_change,
            change_type,
        });
    }

    let moved: Vec<u32> = changes
        .iter()
        .filter(|change| change.position_change != 0)
        .map(|change| change.position_change.unsigned_abs())
        .collect();
    let n = changes.len();
    let top_three_changes = changes
        .iter()
        .filter(|change| change.initial_position <= 3)
        .any(|change| change.position_change != 0);
    let bottom_three_changes = changes
        .iter()
        .filter(|change| change.initial_position + 3 > n as u32)
        .any(|change| change.position_change != 0);

    let initial_vs_platform = correlate_with_platform(&ordered, platform);
    let mut revised_entries = revised.entries.clone();
    revised_entries.sort_by_key(|entry| entry.position);
    let revised_vs_platform = correlate_with_platform(&revised_entries, platform);
    let improvement = match (revised_vs_platform, initial_vs_platform) {
        (Some(after), Some(before)) => round_to((after - before) * 50.0, 1),
        _ => 0.0,
    };

    PerspectiveChange {
        total_position_changes: moved.len(),
        average_position_shift: if moved.is_empty() {
            0.0
        } else {
            round_to(moved.iter().sum::<u32>() as f64 / moved.len() as f64, 2)
        },
        max_position_shift: moved.iter().copied().max().unwrap_or(0),
        unchanged_count: n - moved.len(),
        promotions: changes.iter().filter(|c| c.change_type == ChangeKind::Promoted).count(),
        demotions: changes.iter().filter(|c| c.change_type == ChangeKind::Demoted).count(),
        top_three_changes,
        bottom_three_changes,
        initial_vs_revised_correlation: CorrelationPair {
            spearman: spearman(&initial_ranks, &revised_ranks).map(|v| round_to(v, 3)),
            kendall: kendall(&initial_ranks, &revised_ranks).map(|v| round_to(v, 3)),
        },
        municipality_changes: changes,
        convergence_with_platform: Convergence {
            initial_spearman: initial_vs_platform.map(|v| round_to(v, 3)),
            revised_spearman: revised_vs_platform.map(|v| round_to(v, 3)),
            improvement,
        },
        data_layers_used,
        credits_spent,
    }
}

fn correlate_with_platform(
    entries: &[crate::store::RankingEntry],
    platform: &[RankedMunicipality],
) -> Option<f64> {
    let positions: HashMap<&str, u32> = entries
        .iter()
        .map(|entry| (entry.code.as_str(), entry.position))
        .collect();
    let mut user_ranks = Vec::new();
    let mut platform_ranks = Vec::new();
    for ranked in platform {
        if let Some(&position) = positions.get(ranked.code.as_str()) {
            user_ranks.push(position);
            platform_ranks.push(ranked.position);
        }
    }
    spearman(&user_ranks, &platform_ranks)
}
