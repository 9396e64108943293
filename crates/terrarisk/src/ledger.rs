//! Per-group token economy and snapshot persistence, composed over a
//! [`WorkshopStore`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog;
use crate::store::{
    GroupProfile, GroupRecord, PurchaseRecord, RankingEntry, RankingPhase, RankingSnapshots,
    StoreError, StoredRanking, WorkshopStore,
};

/// Shortest accepted group name after trimming.
const MIN_NAME_LEN: usize = 2;

static GROUP_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_group_id() -> String {
    let id = GROUP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("grp-{id:06}")
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("group '{0}' not found")]
    GroupNotFound(String),
    #[error("layer '{0}' not found")]
    LayerNotFound(String),
    #[error("action '{0}' not found")]
    ActionNotFound(String),
    #[error("no ranking found for group '{0}'")]
    RankingNotFound(String),
    #[error("layer '{0}' is free and cannot be purchased")]
    FreeLayer(String),
    #[error("layer '{0}' already purchased")]
    AlreadyOwned(String),
    #[error("insufficient credits: balance {balance}, cost {cost}")]
    InsufficientCredits { balance: u32, cost: u32 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-layer purchase count, most purchased first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerPopularity {
    pub layer_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupActivity {
    pub id: String,
    pub name: String,
    pub credits: u32,
    pub purchased_count: usize,
    pub last_activity: DateTime<Utc>,
}

/// Admin-facing purchase statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseStats {
    pub total_groups: usize,
    pub total_purchases: usize,
    pub credits_spent: u64,
    pub popular_layers: Vec<LayerPopularity>,
    pub group_stats: Vec<GroupActivity>,
}

pub struct WorkshopLedger<S> {
    store: Arc<S>,
    initial_credits: u32,
}

impl<S> WorkshopLedger<S>
where
    S: WorkshopStore,
{
    pub fn new(store: Arc<S>, initial_credits: u32) -> Self {
        Self { store, initial_credits }
    }

    pub fn initial_credits(&self) -> u32 {
        self.initial_credits
    }

    /// Create a group with the full initial balance and an empty purchased
    /// set. Names shorter than two characters are rejected before any
    /// mutation.
    pub fn create(&self, name: &str, profile: GroupProfile) -> Result<GroupRecord, LedgerError> {
        let name = name.trim();
        if name.chars().count() < MIN_NAME_LEN {
            return Err(LedgerError::InvalidInput(
                "group name must be at least 2 characters".to_string(),
            ));
        }

        let now = Utc::now();
        let group = GroupRecord {
            id: next_group_id(),
            name: name.to_string(),
            credits: self.initial_credits,
            purchased_layers: Vec::new(),
            profile,
            created_at: now,
            updated_at: now,
        };
        let group = self.store.insert_group(group)?;
        info!(group_id = %group.id, name = %group.name, "group created");
        Ok(group)
    }

    pub fn get(&self, group_id: &str) -> Result<GroupRecord, LedgerError> {
        self.store
            .fetch_group(group_id)?
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))
    }

    pub fn list(&self) -> Result<Vec<GroupRecord>, LedgerError> {
        Ok(self.store.list_groups()?)
    }

    /// Debit-on-purchase. Free layers are implicitly available and must not
    /// be purchased; everything else is validated and applied atomically by
    /// the store.
    pub fn purchase(&self, group_id: &str, layer_id: &str) -> Result<GroupRecord, LedgerError> {
        let layer = catalog::layer(layer_id)
            .ok_or_else(|| LedgerError::LayerNotFound(layer_id.to_string()))?;
        if layer.is_free {
            return Err(LedgerError::FreeLayer(layer_id.to_string()));
        }

        let updated = self
            .store
            .apply_purchase(group_id, layer.id, layer.cost)
            .map_err(|err| match err {
                StoreError::NotFound => LedgerError::GroupNotFound(group_id.to_string()),
                StoreError::AlreadyOwned => LedgerError::AlreadyOwned(layer_id.to_string()),
                StoreError::InsufficientCredits { balance, cost } => {
                    LedgerError::InsufficientCredits { balance, cost }
                }
                other => LedgerError::Store(other),
            })?;
        info!(
            group_id,
            layer_id,
            cost = layer.cost,
            balance = updated.credits,
            "layer purchased"
        );
        Ok(updated)
    }

    /// Restore the balance to the configured initial value. Purchased layers
    /// and purchase history are deliberately kept.
    pub fn reset(&self, group_id: &str) -> Result<GroupRecord, LedgerError> {
        self.store
            .reset_credits(group_id, self.initial_credits)
            .map_err(|err| match err {
                StoreError::NotFound => LedgerError::GroupNotFound(group_id.to_string()),
                other => LedgerError::Store(other),
            })
    }

    pub fn delete(&self, group_id: &str) -> Result<(), LedgerError> {
        if self.store.delete_group(group_id)? {
            Ok(())
        } else {
            Err(LedgerError::GroupNotFound(group_id.to_string()))
        }
    }

    /// Validate and upsert a ranking snapshot for one phase. Positions must
    /// form a permutation of 1..=N over distinct municipality codes.
    pub fn submit_ranking(
        &self,
        group_id: &str,
        phase: RankingPhase,
        entries: Vec<RankingEntry>,
    ) -> Result<(), LedgerError> {
        self.get(group_id)?;
        validate_ranking(&entries)?;

        let entry_count = entries.len();
        self.store.upsert_ranking(StoredRanking {
            group_id: group_id.to_string(),
            phase,
            entries,
            created_at: Utc::now(),
        })?;
        debug!(group_id, phase = phase.as_str(), entries = entry_count, "ranking stored");
        Ok(())
    }

    pub fn rankings(&self, group_id: &str) -> Result<RankingSnapshots, LedgerError> {
        self.get(group_id)?;
        Ok(self.store.fetch_rankings(group_id)?)
    }

    /// Upsert the group's selected intervention actions. Every id must exist
    /// in the catalog and appear once.
    pub fn save_selected_actions(
        &self,
        group_id: &str,
        action_ids: Vec<String>,
    ) -> Result<(), LedgerError> {
        self.get(group_id)?;

        let mut seen = HashSet::new();
        for id in &action_ids {
            if catalog::action(id).is_none() {
                return Err(LedgerError::ActionNotFound(id.clone()));
            }
            if !seen.insert(id.as_str()) {
                return Err(LedgerError::InvalidInput(format!(
                    "action '{id}' selected more than once"
                )));
            }
        }

        self.store.upsert_selected_actions(group_id, action_ids)?;
        Ok(())
    }

    pub fn selected_actions(&self, group_id: &str) -> Result<Vec<String>, LedgerError> {
        self.get(group_id)?;
        Ok(self.store.fetch_selected_actions(group_id)?)
    }

    pub fn purchase_history(&self) -> Result<Vec<PurchaseRecord>, LedgerError> {
        Ok(self.store.purchases()?)
    }

    /// Purchase count per layer, most purchased first; layers never bought
    /// are absent.
    pub fn layer_popularity(&self) -> Result<HashMap<String, u64>, LedgerError> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for purchase in self.store.purchases()? {
            *counts.entry(purchase.layer_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub fn purchase_stats(&self) -> Result<PurchaseStats, LedgerError> {
        let purchases = self.store.purchases()?;
        let credits_spent = purchases.iter().map(|p| u64::from(p.cost)).sum();

        let mut counts: HashMap<String, u64> = HashMap::new();
        for purchase in &purchases {
            *counts.entry(purchase.layer_id.clone()).or_insert(0) += 1;
        }
        let mut popular_layers: Vec<_> = counts
            .into_iter()
            .map(|(layer_id, count)| LayerPopularity { layer_id, count })
            .collect();
        popular_layers.sort_by(|a, b| b.count.cmp(&a.count).then(a.layer_id.cmp(&b.layer_id)));

        let mut group_stats: Vec<_> = self
            .store
            .list_groups()?
            .into_iter()
            .map(|group| GroupActivity {
                purchased_count: group.purchased_layers.len(),
                id: group.id,
                name: group.name,
                credits: group.credits,
                last_activity: group.updated_at,
            })
            .collect();
        group_stats.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        Ok(PurchaseStats {
            total_groups: group_stats.len(),
            total_purchases: purchases.len(),
            credits_spent,
            popular_layers,
            group_stats,
        })
    }
}

fn validate_ranking(entries: &[RankingEntry]) -> Result<(), LedgerError> {
    if entries.is_empty() {
        return Err(LedgerError::InvalidInput("ranking data is required".to_string()));
    }

    let mut codes = HashSet::new();
    for entry in entries {
        if !codes.insert(entry.code.as_str()) {
            return Err(LedgerError::InvalidInput(format!(
                "municipality '{}' ranked more than once",
                entry.code
            )));
        }
    }

    let mut positions: Vec<u32> = entries.iter().map(|entry| entry.position).collect();
    positions.sort_unstable();
    let expected: Vec<u32> = (1..=entries.len() as u32).collect();
    if positions != expected {
        return Err(LedgerError::InvalidInput(format!(
            "positions must form a permutation of 1..={}",
            entries.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> WorkshopLedger<MemoryStore> {
        WorkshopLedger::new(Arc::new(MemoryStore::default()), 10)
    }

    fn entries(codes: &[&str]) -> Vec<RankingEntry> {
        codes
            .iter()
            .enumerate()
            .map(|(idx, code)| RankingEntry {
                code: (*code).to_string(),
                position: idx as u32 + 1,
            })
            .collect()
    }

    #[test]
    fn create_starts_with_full_balance() {
        let ledger = ledger();
        let group = ledger.create("  Grupo Azul  ", GroupProfile::default()).expect("create");
        assert_eq!(group.name, "Grupo Azul");
        assert_eq!(group.credits, 10);
        assert!(group.purchased_layers.is_empty());
        assert!(group.id.starts_with("grp-"));
    }

    #[test]
    fn short_names_are_rejected() {
        let err = ledger().create(" a ", GroupProfile::default()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn purchase_scenario_debits_balance() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");

        let updated = ledger.purchase(&group.id, "fire_risk").expect("purchase");
        assert_eq!(updated.credits, 9);
        assert_eq!(updated.purchased_layers, vec!["fire_risk"]);
    }

    #[test]
    fn balance_always_equals_initial_minus_spend() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");

        for layer_id in ["fire_risk", "dengue", "poverty"] {
            let updated = ledger.purchase(&group.id, layer_id).expect("purchase");
            let spent: u32 = updated
                .purchased_layers
                .iter()
                .map(|id| catalog::layer(id).expect("known layer").cost)
                .sum();
            assert_eq!(updated.credits, 10 - spent);
        }
    }

    #[test]
    fn double_purchase_fails_and_changes_nothing() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");
        ledger.purchase(&group.id, "dengue").expect("first purchase");

        let err = ledger.purchase(&group.id, "dengue").unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyOwned(_)));

        let after = ledger.get(&group.id).expect("group");
        assert_eq!(after.credits, 9);
        assert_eq!(after.purchased_layers, vec!["dengue"]);
    }

    #[test]
    fn free_layers_cannot_be_purchased() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");

        let err = ledger.purchase(&group.id, "vulnerability").unwrap_err();
        assert!(matches!(err, LedgerError::FreeLayer(_)));
        assert!(ledger.purchase_history().expect("history").is_empty());
    }

    #[test]
    fn unknown_ids_surface_not_found() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");

        assert!(matches!(
            ledger.purchase(&group.id, "nonexistent"),
            Err(LedgerError::LayerNotFound(_))
        ));
        assert!(matches!(
            ledger.purchase("grp-999999", "dengue"),
            Err(LedgerError::GroupNotFound(_))
        ));
    }

    #[test]
    fn reset_restores_balance_only() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");
        ledger.purchase(&group.id, "dengue").expect("purchase");

        let reset = ledger.reset(&group.id).expect("reset");
        assert_eq!(reset.credits, 10);
        assert_eq!(reset.purchased_layers, vec!["dengue"]);
        assert_eq!(ledger.purchase_history().expect("history").len(), 1);
    }

    #[test]
    fn ranking_submission_validates_permutation() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");

        ledger
            .submit_ranking(&group.id, RankingPhase::Initial, entries(&["1", "2", "3"]))
            .expect("valid ranking accepted");

        let mut gapped = entries(&["1", "2", "3"]);
        gapped[2].position = 5;
        assert!(matches!(
            ledger.submit_ranking(&group.id, RankingPhase::Initial, gapped),
            Err(LedgerError::InvalidInput(_))
        ));

        let duplicated = entries(&["1", "2", "1"]);
        assert!(matches!(
            ledger.submit_ranking(&group.id, RankingPhase::Initial, duplicated),
            Err(LedgerError::InvalidInput(_))
        ));

        assert!(matches!(
            ledger.submit_ranking(&group.id, RankingPhase::Initial, Vec::new()),
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[test]
    fn ranking_resubmission_overwrites() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");

        ledger
            .submit_ranking(&group.id, RankingPhase::Initial, entries(&["1", "2"]))
            .expect("first");
        ledger
            .submit_ranking(&group.id, RankingPhase::Initial, entries(&["2", "1"]))
            .expect("second");

        let snapshots = ledger.rankings(&group.id).expect("snapshots");
        let initial = snapshots.initial.expect("initial present");
        assert_eq!(initial.entries[0].code, "2");
        assert!(snapshots.revised.is_none());
    }

    #[test]
    fn selected_actions_validate_catalog_ids() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");

        ledger
            .save_selected_actions(&group.id, vec!["reforestation".into(), "urban_drainage".into()])
            .expect("valid actions");
        assert_eq!(ledger.selected_actions(&group.id).expect("actions").len(), 2);

        assert!(matches!(
            ledger.save_selected_actions(&group.id, vec!["not_an_action".into()]),
            Err(LedgerError::ActionNotFound(_))
        ));
        assert!(matches!(
            ledger.save_selected_actions(
                &group.id,
                vec!["reforestation".into(), "reforestation".into()]
            ),
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[test]
    fn stats_aggregate_purchases_across_groups() {
        let ledger = ledger();
        let a = ledger.create("Grupo A", GroupProfile::default()).expect("create");
        let b = ledger.create("Grupo B", GroupProfile::default()).expect("create");
        ledger.purchase(&a.id, "dengue").expect("purchase");
        ledger.purchase(&b.id, "dengue").expect("purchase");
        ledger.purchase(&b.id, "fire_risk").expect("purchase");

        let stats = ledger.purchase_stats().expect("stats");
        assert_eq!(stats.total_groups, 2);
        assert_eq!(stats.total_purchases, 3);
        assert_eq!(stats.credits_spent, 3);
        assert_eq!(stats.popular_layers[0].layer_id, "dengue");
        assert_eq!(stats.popular_layers[0].count, 2);
    }

    #[test]
    fn delete_removes_group_and_history() {
        let ledger = ledger();
        let group = ledger.create("Grupo", GroupProfile::default()).expect("create");
        ledger.purchase(&group.id, "dengue").expect("purchase");

        ledger.delete(&group.id).expect("delete");
        assert!(matches!(ledger.get(&group.id), Err(LedgerError::GroupNotFound(_))));
        assert!(ledger.purchase_history().expect("history").is_empty());
        assert!(matches!(ledger.delete(&group.id), Err(LedgerError::GroupNotFound(_))));
    }
}
