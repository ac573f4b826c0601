use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BillingRepository, CandidateRepository, LedgerRepository, LedgerTotals, OwnerRepository,
    PropertyRepository, RemovedCandidates, StatusTally,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    BillingOrder, BillingPeriod, Candidate, DeletedCandidate, LedgerKey, Owner,
    PaymentLedgerEntry, PaymentStatus, Property,
};

#[derive(Default)]
struct Tables {
    owners: HashMap<Uuid, Owner>,
    properties: HashMap<Uuid, Property>,
    candidates: HashMap<Uuid, Candidate>,
    archived: Vec<DeletedCandidate>,
    ledger: HashMap<Uuid, PaymentLedgerEntry>,
    ledger_index: HashMap<LedgerKey, Uuid>,
    billing_orders: HashMap<String, BillingOrder>,
}

impl Tables {
    fn drop_ledger_for_candidate(&mut self, candidate_id: Uuid) -> u64 {
        let doomed: Vec<Uuid> = self
            .ledger
            .values()
            .filter(|entry| entry.candidate_id == candidate_id)
            .map(|entry| entry.id)
            .collect();
        for id in &doomed {
            if let Some(entry) = self.ledger.remove(id) {
                self.ledger_index.remove(&entry.key());
            }
        }
        doomed.len() as u64
    }

    fn period_entries(
        &self,
        property_id: Uuid,
        period: BillingPeriod,
    ) -> impl Iterator<Item = &PaymentLedgerEntry> {
        self.ledger.values().filter(move |entry| {
            entry.property_id == property_id
                && entry.payment_month == period.month()
                && entry.payment_year == period.year()
        })
    }
}

/// Process-local store with the same key discipline as [`super::PgStore`].
/// Used when no database is configured and throughout the test suite.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    owner_writes: AtomicU64,
    ledger_writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owner rows written since creation.
    pub fn owner_writes(&self) -> u64 {
        self.owner_writes.load(Ordering::SeqCst)
    }

    /// Number of ledger rows inserted or overwritten since creation.
    pub fn ledger_writes(&self) -> u64 {
        self.ledger_writes.load(Ordering::SeqCst)
    }

    /// Number of ledger rows currently held.
    pub async fn ledger_len(&self) -> usize {
        self.tables.read().await.ledger.len()
    }
}

#[async_trait]
impl OwnerRepository for MemoryStore {
    async fn find_owner(&self, owner_id: Uuid) -> AppResult<Option<Owner>> {
        Ok(self.tables.read().await.owners.get(&owner_id).cloned())
    }

    async fn find_owner_by_email(&self, email: &str) -> AppResult<Option<Owner>> {
        let tables = self.tables.read().await;
        Ok(tables
            .owners
            .values()
            .find(|owner| owner.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_owner_by_mobile(&self, mobile: &str) -> AppResult<Option<Owner>> {
        let tables = self.tables.read().await;
        Ok(tables
            .owners
            .values()
            .find(|owner| owner.mobile == mobile)
            .cloned())
    }

    async fn insert_owner(&self, owner: &Owner) -> AppResult<Owner> {
        let mut tables = self.tables.write().await;
        let taken = tables.owners.values().any(|existing| {
            existing.email.eq_ignore_ascii_case(&owner.email) || existing.mobile == owner.mobile
        });
        if taken {
            return Err(AppError::Conflict(
                "Duplicate value violates a unique constraint.".to_string(),
            ));
        }
        tables.owners.insert(owner.id, owner.clone());
        self.owner_writes.fetch_add(1, Ordering::SeqCst);
        Ok(owner.clone())
    }

    async fn mark_trial_expired(&self, owner_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.owners.get_mut(&owner_id) {
            Some(owner) if !owner.trial_expired => {
                owner.trial_expired = true;
                self.owner_writes.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save_subscription(
        &self,
        owner_id: Uuid,
        plan: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Option<Owner>> {
        let mut tables = self.tables.write().await;
        let Some(owner) = tables.owners.get_mut(&owner_id) else {
            return Ok(None);
        };
        owner.subscribed = true;
        owner.subscription_plan = Some(plan.to_string());
        owner.subscription_start = Some(start);
        owner.subscription_end = Some(end);
        self.owner_writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(owner.clone()))
    }
}

#[async_trait]
impl PropertyRepository for MemoryStore {
    async fn insert_property(&self, property: &Property) -> AppResult<Property> {
        let mut tables = self.tables.write().await;
        tables.properties.insert(property.id, property.clone());
        Ok(property.clone())
    }

    async fn find_property(&self, property_id: Uuid) -> AppResult<Option<Property>> {
        Ok(self.tables.read().await.properties.get(&property_id).cloned())
    }

    async fn list_properties(&self, owner_id: Uuid, deleted: bool) -> AppResult<Vec<Property>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Property> = tables
            .properties
            .values()
            .filter(|property| property.owner_id == owner_id && property.deleted == deleted)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn set_property_deleted(&self, property_id: Uuid, deleted: bool) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.properties.get_mut(&property_id) {
            Some(property) => {
                property.deleted = deleted;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CandidateRepository for MemoryStore {
    async fn insert_candidate(&self, candidate: &Candidate) -> AppResult<Candidate> {
        let mut tables = self.tables.write().await;
        tables.candidates.insert(candidate.id, candidate.clone());
        Ok(candidate.clone())
    }

    async fn find_candidate(&self, candidate_id: Uuid) -> AppResult<Option<Candidate>> {
        Ok(self.tables.read().await.candidates.get(&candidate_id).cloned())
    }

    async fn update_candidate(&self, candidate: &Candidate) -> AppResult<Option<Candidate>> {
        let mut tables = self.tables.write().await;
        match tables.candidates.get_mut(&candidate.id) {
            Some(existing) => {
                *existing = candidate.clone();
                Ok(Some(candidate.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_candidates(&self, property_id: Uuid) -> AppResult<Vec<Candidate>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Candidate> = tables
            .candidates
            .values()
            .filter(|candidate| candidate.property_id == property_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.room_no.cmp(&b.room_no).then(a.created_at.cmp(&b.created_at)));
        Ok(rows)
    }

    async fn archive_and_delete_candidate(&self, archive: &DeletedCandidate) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.candidates.remove(&archive.candidate_id).is_none() {
            return Ok(false);
        }
        tables.drop_ledger_for_candidate(archive.candidate_id);
        tables.archived.push(archive.clone());
        Ok(true)
    }

    async fn remove_property_candidates(
        &self,
        property_id: Uuid,
    ) -> AppResult<RemovedCandidates> {
        let mut tables = self.tables.write().await;
        let doomed: Vec<Uuid> = tables
            .candidates
            .values()
            .filter(|candidate| candidate.property_id == property_id)
            .map(|candidate| candidate.id)
            .collect();
        let mut removed = RemovedCandidates::default();
        for candidate_id in doomed {
            removed.ledger_entries += tables.drop_ledger_for_candidate(candidate_id);
            tables.candidates.remove(&candidate_id);
            removed.candidates += 1;
        }
        Ok(removed)
    }

    async fn list_archived_candidates(
        &self,
        owner_id: Uuid,
        property_id: Option<Uuid>,
    ) -> AppResult<Vec<DeletedCandidate>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<DeletedCandidate> = tables
            .archived
            .iter()
            .filter(|archived| {
                tables
                    .properties
                    .get(&archived.property_id)
                    .is_some_and(|property| property.owner_id == owner_id)
            })
            .filter(|archived| property_id.map_or(true, |id| archived.property_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(rows)
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn find_ledger_entry(&self, key: LedgerKey) -> AppResult<Option<PaymentLedgerEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger_index
            .get(&key)
            .and_then(|id| tables.ledger.get(id))
            .cloned())
    }

    async fn insert_ledger_entry_if_absent(
        &self,
        entry: &PaymentLedgerEntry,
    ) -> AppResult<PaymentLedgerEntry> {
        let mut tables = self.tables.write().await;
        let key = entry.key();
        if let Some(existing) = tables
            .ledger_index
            .get(&key)
            .and_then(|id| tables.ledger.get(id))
        {
            return Ok(existing.clone());
        }
        tables.ledger_index.insert(key, entry.id);
        tables.ledger.insert(entry.id, entry.clone());
        self.ledger_writes.fetch_add(1, Ordering::SeqCst);
        Ok(entry.clone())
    }

    async fn save_ledger_entry(
        &self,
        entry: &PaymentLedgerEntry,
    ) -> AppResult<Option<PaymentLedgerEntry>> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.ledger.get(&entry.id) else {
            return Ok(None);
        };
        if existing.key() != entry.key() {
            return Err(AppError::Conflict(
                "Ledger entry key cannot change.".to_string(),
            ));
        }
        tables.ledger.insert(entry.id, entry.clone());
        self.ledger_writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(entry.clone()))
    }

    async fn ledger_totals(
        &self,
        property_id: Uuid,
        period: BillingPeriod,
    ) -> AppResult<LedgerTotals> {
        let tables = self.tables.read().await;
        Ok(tables
            .period_entries(property_id, period)
            .fold(LedgerTotals::default(), |mut totals, entry| {
                totals.advance += entry.advance;
                totals.paid += entry.amount_paid;
                totals.balance += entry.balance;
                totals
            }))
    }

    async fn ledger_status_tally(
        &self,
        property_id: Uuid,
        period: BillingPeriod,
    ) -> AppResult<StatusTally> {
        let tables = self.tables.read().await;
        Ok(tables
            .period_entries(property_id, period)
            .fold(StatusTally::default(), |mut tally, entry| {
                tally.total += 1;
                match entry.status {
                    PaymentStatus::Paid => tally.paid += 1,
                    PaymentStatus::PartialPaid => tally.partial += 1,
                    PaymentStatus::Pending => {}
                }
                tally
            }))
    }
}

#[async_trait]
impl BillingRepository for MemoryStore {
    async fn insert_billing_order(&self, order: &BillingOrder) -> AppResult<BillingOrder> {
        let mut tables = self.tables.write().await;
        if tables.billing_orders.contains_key(&order.order_id) {
            return Err(AppError::Conflict(
                "Duplicate value violates a unique constraint.".to_string(),
            ));
        }
        tables
            .billing_orders
            .insert(order.order_id.clone(), order.clone());
        Ok(order.clone())
    }

    async fn find_billing_order(&self, order_id: &str) -> AppResult<Option<BillingOrder>> {
        Ok(self.tables.read().await.billing_orders.get(order_id).cloned())
    }

    async fn claim_billing_order(
        &self,
        order_id: &str,
        payment_id: &str,
        paid_at: DateTime<Utc>,
    ) -> AppResult<Option<BillingOrder>> {
        let mut tables = self.tables.write().await;
        let reused = tables
            .billing_orders
            .values()
            .any(|order| order.payment_id.as_deref() == Some(payment_id));
        if reused {
            return Err(AppError::Conflict(
                "Duplicate value violates a unique constraint.".to_string(),
            ));
        }
        match tables.billing_orders.get_mut(order_id) {
            Some(order) if order.payment_id.is_none() => {
                order.payment_id = Some(payment_id.to_string());
                order.paid_at = Some(paid_at);
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}
