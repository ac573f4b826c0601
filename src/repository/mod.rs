//! Storage seam for the ledger engine.
//!
//! Every method is a single atomic unit against the backing store. The
//! ledger key `(candidate_id, property_id, month, year)` is unique at the
//! storage layer; [`LedgerRepository::insert_ledger_entry_if_absent`] is the
//! only way a new entry comes into existence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    BillingOrder, BillingPeriod, Candidate, DeletedCandidate, LedgerKey, Owner,
    PaymentLedgerEntry, Property,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Period roll-up of the three ledger amounts. Empty periods sum to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct LedgerTotals {
    pub advance: f64,
    pub paid: f64,
    pub balance: f64,
}

/// Raw status tallies for a period as read from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    pub total: u64,
    pub paid: u64,
    pub partial: u64,
}

/// Rows removed when a property's candidate list is cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RemovedCandidates {
    pub candidates: u64,
    pub ledger_entries: u64,
}

#[async_trait]
pub trait OwnerRepository: Send + Sync {
    async fn find_owner(&self, owner_id: Uuid) -> AppResult<Option<Owner>>;

    async fn find_owner_by_email(&self, email: &str) -> AppResult<Option<Owner>>;

    async fn find_owner_by_mobile(&self, mobile: &str) -> AppResult<Option<Owner>>;

    /// Fails with `Conflict` when the email or mobile is already taken.
    async fn insert_owner(&self, owner: &Owner) -> AppResult<Owner>;

    /// Flip `trial_expired` to true if it is still false. Returns whether a
    /// row changed.
    async fn mark_trial_expired(&self, owner_id: Uuid) -> AppResult<bool>;

    async fn save_subscription(
        &self,
        owner_id: Uuid,
        plan: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Option<Owner>>;
}

#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn insert_property(&self, property: &Property) -> AppResult<Property>;

    async fn find_property(&self, property_id: Uuid) -> AppResult<Option<Property>>;

    /// Properties of `owner_id` with the given soft-delete flag, oldest first.
    async fn list_properties(&self, owner_id: Uuid, deleted: bool) -> AppResult<Vec<Property>>;

    async fn set_property_deleted(&self, property_id: Uuid, deleted: bool) -> AppResult<bool>;
}

#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn insert_candidate(&self, candidate: &Candidate) -> AppResult<Candidate>;

    async fn find_candidate(&self, candidate_id: Uuid) -> AppResult<Option<Candidate>>;

    async fn update_candidate(&self, candidate: &Candidate) -> AppResult<Option<Candidate>>;

    /// Candidates of a property ordered by the raw room string.
    async fn list_candidates(&self, property_id: Uuid) -> AppResult<Vec<Candidate>>;

    /// Store the archive copy, drop the candidate's ledger entries and the
    /// live row, all in one transaction.
    async fn archive_and_delete_candidate(&self, archive: &DeletedCandidate) -> AppResult<bool>;

    /// Remove every candidate of a property together with their ledger
    /// entries in one transaction.
    async fn remove_property_candidates(&self, property_id: Uuid)
        -> AppResult<RemovedCandidates>;

    /// Archived candidates across the owner's properties, newest first.
    async fn list_archived_candidates(
        &self,
        owner_id: Uuid,
        property_id: Option<Uuid>,
    ) -> AppResult<Vec<DeletedCandidate>>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn find_ledger_entry(&self, key: LedgerKey) -> AppResult<Option<PaymentLedgerEntry>>;

    /// Insert `entry` unless its key already exists; either way return the
    /// row that owns the key.
    async fn insert_ledger_entry_if_absent(
        &self,
        entry: &PaymentLedgerEntry,
    ) -> AppResult<PaymentLedgerEntry>;

    /// Overwrite the row with `entry.id`. Returns `None` if it vanished.
    async fn save_ledger_entry(
        &self,
        entry: &PaymentLedgerEntry,
    ) -> AppResult<Option<PaymentLedgerEntry>>;

    async fn ledger_totals(&self, property_id: Uuid, period: BillingPeriod)
        -> AppResult<LedgerTotals>;

    async fn ledger_status_tally(
        &self,
        property_id: Uuid,
        period: BillingPeriod,
    ) -> AppResult<StatusTally>;
}

#[async_trait]
pub trait BillingRepository: Send + Sync {
    /// Fails with `Conflict` when the order id is already registered.
    async fn insert_billing_order(&self, order: &BillingOrder) -> AppResult<BillingOrder>;

    async fn find_billing_order(&self, order_id: &str) -> AppResult<Option<BillingOrder>>;

    /// Attach `payment_id` to an unpaid order. Returns `None` when the order
    /// is missing or already paid; fails with `Conflict` when the payment id
    /// was used by another order.
    async fn claim_billing_order(
        &self,
        order_id: &str,
        payment_id: &str,
        paid_at: DateTime<Utc>,
    ) -> AppResult<Option<BillingOrder>>;
}

pub trait Store:
    OwnerRepository + PropertyRepository + CandidateRepository + LedgerRepository + BillingRepository
{
}

impl<T> Store for T where
    T: OwnerRepository
        + PropertyRepository
        + CandidateRepository
        + LedgerRepository
        + BillingRepository
{
}
