//! Durable records and the storage seam.
//!
//! `WorkshopStore` is the abstraction the ledger talks to; `MemoryStore` is
//! the process-local implementation used by the service and the tests. Every
//! trait method is a single atomic unit: in particular `apply_purchase`
//! performs the balance check, the debit, the purchased-set append, and the
//! history append inside one critical section, so no partial-write state can
//! be observed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional participant profile captured at group creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_participants: Option<u32>,
}

/// A participant group and its economy state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub id: String,
    pub name: String,
    pub credits: u32,
    /// Purchase order is preserved.
    pub purchased_layers: Vec<String>,
    #[serde(flatten)]
    pub profile: GroupProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only purchase history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub group_id: String,
    pub layer_id: String,
    pub cost: u32,
    pub purchased_at: DateTime<Utc>,
}

/// Workshop phase a ranking snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPhase {
    Initial,
    Revised,
}

impl RankingPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RankingPhase::Initial => "initial",
            RankingPhase::Revised => "revised",
        }
    }
}

impl std::str::FromStr for RankingPhase {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "initial" => Ok(RankingPhase::Initial),
            "revised" => Ok(RankingPhase::Revised),
            _ => Err(()),
        }
    }
}

/// One (municipality, position) pair of a submitted ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub code: String,
    pub position: u32,
}

/// A group's ranking for one phase. At most one per (group, phase);
/// re-submission overwrites in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRanking {
    pub group_id: String,
    pub phase: RankingPhase,
    pub entries: Vec<RankingEntry>,
    pub created_at: DateTime<Utc>,
}

/// Both phase snapshots for a group, either possibly absent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RankingSnapshots {
    pub initial: Option<StoredRanking>,
    pub revised: Option<StoredRanking>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("layer already purchased")]
    AlreadyOwned,
    #[error("insufficient credits: balance {balance}, cost {cost}")]
    InsufficientCredits { balance: u32, cost: u32 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage seam so the ledger and the analytics endpoints can be exercised
/// against fixture state.
pub trait WorkshopStore: Send + Sync {
    fn insert_group(&self, group: GroupRecord) -> Result<GroupRecord, StoreError>;
    fn fetch_group(&self, id: &str) -> Result<Option<GroupRecord>, StoreError>;
    /// All groups, newest first.
    fn list_groups(&self) -> Result<Vec<GroupRecord>, StoreError>;
    /// Atomically debit the balance, append the layer, and record the
    /// purchase. Fails without mutation on unknown group, already-owned
    /// layer, or insufficient balance.
    fn apply_purchase(
        &self,
        group_id: &str,
        layer_id: &str,
        cost: u32,
    ) -> Result<GroupRecord, StoreError>;
    /// Restore the balance only; purchased layers and history are kept.
    fn reset_credits(&self, group_id: &str, credits: u32) -> Result<GroupRecord, StoreError>;
    /// Remove the group and cascade to purchases, rankings, and actions.
    fn delete_group(&self, group_id: &str) -> Result<bool, StoreError>;
    fn purchases(&self) -> Result<Vec<PurchaseRecord>, StoreError>;
    fn upsert_ranking(&self, ranking: StoredRanking) -> Result<(), StoreError>;
    fn fetch_rankings(&self, group_id: &str) -> Result<RankingSnapshots, StoreError>;
    fn upsert_selected_actions(
        &self,
        group_id: &str,
        action_ids: Vec<String>,
    ) -> Result<(), StoreError>;
    fn fetch_selected_actions(&self, group_id: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    groups: HashMap<String, GroupRecord>,
    purchases: Vec<PurchaseRecord>,
    rankings: HashMap<(String, RankingPhase), StoredRanking>,
    selected_actions: HashMap<String, Vec<String>>,
}

/// Mutex-guarded in-memory store. A single lock over the whole keyspace
/// keeps every operation trivially transactional.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

impl WorkshopStore for MemoryStore {
    fn insert_group(&self, group: GroupRecord) -> Result<GroupRecord, StoreError> {
        let mut state = self.lock();
        if state.groups.contains_key(&group.id) {
            return Err(StoreError::Conflict);
        }
        state.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    fn fetch_group(&self, id: &str) -> Result<Option<GroupRecord>, StoreError> {
        Ok(self.lock().groups.get(id).cloned())
    }

    fn list_groups(&self) -> Result<Vec<GroupRecord>, StoreError> {
        let state = self.lock();
        let mut groups: Vec<_> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }

    fn apply_purchase(
        &self,
        group_id: &str,
        layer_id: &str,
        cost: u32,
    ) -> Result<GroupRecord, StoreError> {
        let mut state = self.lock();
        let group = state.groups.get_mut(group_id).ok_or(StoreError::NotFound)?;
        if group.purchased_layers.iter().any(|owned| owned == layer_id) {
            return Err(StoreError::AlreadyOwned);
        }
        if group.credits < cost {
            return Err(StoreError::InsufficientCredits { balance: group.credits, cost });
        }

        let now = Utc::now();
        group.credits -= cost;
        group.purchased_layers.push(layer_id.to_string());
        group.updated_at = now;
        let updated = group.clone();

        state.purchases.push(PurchaseRecord {
            group_id: group_id.to_string(),
            layer_id: layer_id.to_string(),
            cost,
            purchased_at: now,
        });
        Ok(updated)
    }

    fn reset_credits(&self, group_id: &str, credits: u32) -> Result<GroupRecord, StoreError> {
        let mut state = self.lock();
        let group = state.groups.get_mut(group_id).ok_or(StoreError::NotFound)?;
        group.credits = credits;
        group.updated_at = Utc::now();
        Ok(group.clone())
    }

    fn delete_group(&self, group_id: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let removed = state.groups.remove(group_id).is_some();
        if removed {
            state.purchases.retain(|purchase| purchase.group_id != group_id);
            state.rankings.retain(|(owner, _), _| owner != group_id);
            state.selected_actions.remove(group_id);
        }
        Ok(removed)
    }

    fn purchases(&self) -> Result<Vec<PurchaseRecord>, StoreError> {
        Ok(self.lock().purchases.clone())
    }

    fn upsert_ranking(&self, ranking: StoredRanking) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.groups.contains_key(&ranking.group_id) {
            return Err(StoreError::NotFound);
        }
        state
            .rankings
            .insert((ranking.group_id.clone(), ranking.phase), ranking);
        Ok(())
    }

    fn fetch_rankings(&self, group_id: &str) -> Result<RankingSnapshots, StoreError> {
        let state = self.lock();
        Ok(RankingSnapshots {
            initial: state
                .rankings
                .get(&(group_id.to_string(), RankingPhase::Initial))
                .cloned(),
            revised: state
                .rankings
                .get(&(group_id.to_string(), RankingPhase::Revised))
                .cloned(),
        })
    }

    fn upsert_selected_actions(
        &self,
        group_id: &str,
        action_ids: Vec<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.groups.contains_key(group_id) {
            return Err(StoreError::NotFound);
        }
        state.selected_actions.insert(group_id.to_string(), action_ids);
        Ok(())
    }

    fn fetch_selected_actions(&self, group_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .selected_actions
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, credits: u32) -> GroupRecord {
        let now = Utc::now();
        GroupRecord {
            id: id.to_string(),
            name: format!("Group {id}"),
            credits,
            purchased_layers: Vec::new(),
            profile: GroupProfile::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn purchase_debits_and_records_atomically() {
        let store = MemoryStore::default();
        store.insert_group(group("g1", 10)).expect("insert");

        let updated = store.apply_purchase("g1", "fire_risk", 3).expect("purchase");
        assert_eq!(updated.credits, 7);
        assert_eq!(updated.purchased_layers, vec!["fire_risk"]);

        let history = store.purchases().expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].layer_id, "fire_risk");
        assert_eq!(history[0].cost, 3);
    }

    #[test]
    fn repeat_purchase_fails_without_mutation() {
        let store = MemoryStore::default();
        store.insert_group(group("g1", 10)).expect("insert");
        store.apply_purchase("g1", "dengue", 1).expect("first purchase");

        let err = store.apply_purchase("g1", "dengue", 1).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyOwned));

        let after = store.fetch_group("g1").expect("fetch").expect("present");
        assert_eq!(after.credits, 9);
        assert_eq!(after.purchased_layers.len(), 1);
        assert_eq!(store.purchases().expect("history").len(), 1);
    }

    #[test]
    fn insufficient_balance_leaves_state_untouched() {
        let store = MemoryStore::default();
        store.insert_group(group("g1", 2)).expect("insert");

        let err = store.apply_purchase("g1", "dengue", 3).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientCredits { balance: 2, cost: 3 }));

        let after = store.fetch_group("g1").expect("fetch").expect("present");
        assert_eq!(after.credits, 2);
        assert!(after.purchased_layers.is_empty());
        assert!(store.purchases().expect("history").is_empty());
    }

    #[test]
    fn reset_restores_credits_but_keeps_purchases() {
        let store = MemoryStore::default();
        store.insert_group(group("g1", 10)).expect("insert");
        store.apply_purchase("g1", "dengue", 1).expect("purchase");

        let reset = store.reset_credits("g1", 10).expect("reset");
        assert_eq!(reset.credits, 10);
        assert_eq!(reset.purchased_layers, vec!["dengue"]);
        assert_eq!(store.purchases().expect("history").len(), 1);
    }

    #[test]
    fn ranking_upsert_overwrites_per_phase() {
        let store = MemoryStore::default();
        store.insert_group(group("g1", 10)).expect("insert");

        let entries = vec![RankingEntry { code: "1".into(), position: 1 }];
        store
            .upsert_ranking(StoredRanking {
                group_id: "g1".into(),
                phase: RankingPhase::Initial,
                entries: entries.clone(),
                created_at: Utc::now(),
            })
            .expect("first submit");
        let replacement = vec![RankingEntry { code: "2".into(), position: 1 }];
        store
            .upsert_ranking(StoredRanking {
                group_id: "g1".into(),
                phase: RankingPhase::Initial,
                entries: replacement.clone(),
                created_at: Utc::now(),
            })
            .expect("resubmit");

        let snapshots = store.fetch_rankings("g1").expect("snapshots");
        let initial = snapshots.initial.expect("initial present");
        assert_eq!(initial.entries, replacement);
        assert!(snapshots.revised.is_none());
    }

    #[test]
    fn delete_cascades_to_dependent_records() {
        let store = MemoryStore::default();
        store.insert_group(group("g1", 10)).expect("insert");
        store.apply_purchase("g1", "dengue", 1).expect("purchase");
        store
            .upsert_ranking(StoredRanking {
                group_id: "g1".into(),
                phase: RankingPhase::Initial,
                entries: vec![RankingEntry { code: "1".into(), position: 1 }],
                created_at: Utc::now(),
            })
            .expect("ranking");
        store
            .upsert_selected_actions("g1", vec!["reforestation".into()])
            .expect("actions");

        assert!(store.delete_group("g1").expect("delete"));
        assert!(store.fetch_group("g1").expect("fetch").is_none());
        assert!(store.purchases().expect("history").is_empty());
        assert!(store.fetch_rankings("g1").expect("snapshots").initial.is_none());
        assert!(store.fetch_selected_actions("g1").expect("actions").is_empty());
        assert!(!store.delete_group("g1").expect("second delete"));
    }
}
