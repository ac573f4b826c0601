//! One payment record per (candidate, property, month, year).
//!
//! Entries are created lazily by [`get_or_create`] and changed only through
//! [`apply_update`], which touches the supplied fields and then normalizes
//! the row. Status is a free label; any state may follow any other.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        coerce, non_blank, BillingPeriod, Candidate, Coerced, LedgerKey, PaymentLedgerEntry,
        PaymentStatus, Property,
    },
    repository::LedgerRepository,
};

/// Caller-supplied changes. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerUpdate {
    pub room_no: Option<String>,
    pub payment_method: Option<String>,
    pub status: Option<String>,
    pub advance: Option<f64>,
    pub amount_paid: Option<f64>,
    pub balance: Option<f64>,
    pub payment_date: Option<NaiveDate>,
    pub transaction_id: Option<String>,
    pub receipt_id: Option<String>,
}

pub fn ledger_key(candidate_id: Uuid, property_id: Uuid, period: BillingPeriod) -> LedgerKey {
    LedgerKey {
        candidate_id,
        property_id,
        period,
    }
}

/// Return the entry for the key, creating a PENDING/CASH row with zero
/// amounts if none exists. Never modifies an existing row.
pub async fn get_or_create<S>(
    store: &S,
    candidate: &Candidate,
    property: &Property,
    period: BillingPeriod,
    now: DateTime<Utc>,
) -> AppResult<PaymentLedgerEntry>
where
    S: LedgerRepository + ?Sized,
{
    let key = ledger_key(candidate.id, property.id, period);
    if let Some(existing) = store.find_ledger_entry(key).await? {
        return Ok(existing);
    }

    let fresh = PaymentLedgerEntry::pending(key, &candidate.room_no, now);
    let entry = store.insert_ledger_entry_if_absent(&fresh).await?;
    if entry.id == fresh.id {
        tracing::debug!(
            candidate_id = %candidate.id,
            property_id = %property.id,
            month = period.month(),
            year = period.year(),
            "Created pending ledger entry"
        );
    }
    Ok(entry)
}

/// Apply `update` to `entry` and normalize. Unknown methods keep the
/// previous method; unknown statuses fall back to PENDING.
pub fn apply_update(entry: &mut PaymentLedgerEntry, update: &LedgerUpdate, now: DateTime<Utc>) {
    if let Some(room) = non_blank(update.room_no.clone()) {
        entry.room_no = room;
    }

    if let Some(raw) = non_blank(update.payment_method.clone()) {
        match coerce(&raw, entry.payment_method) {
            Coerced::Parsed(method) => entry.payment_method = method,
            Coerced::Defaulted(kept) => tracing::warn!(
                entry_id = %entry.id,
                raw_method = %raw,
                kept = %kept,
                "Ignoring unknown payment method"
            ),
        }
    }

    if let Some(raw) = non_blank(update.status.clone()) {
        let status = coerce(&raw, PaymentStatus::Pending);
        if status.was_defaulted() {
            tracing::warn!(
                entry_id = %entry.id,
                raw_status = %raw,
                "Unknown payment status, recording PENDING"
            );
        }
        entry.status = status.value();
    }

    if let Some(advance) = update.advance {
        entry.advance = advance;
    }
    if let Some(amount_paid) = update.amount_paid {
        entry.amount_paid = amount_paid;
    }
    if let Some(balance) = update.balance {
        entry.balance = balance;
    }
    if let Some(payment_date) = update.payment_date {
        entry.payment_date = Some(payment_date);
    }
    if update.transaction_id.is_some() {
        entry.transaction_id = non_blank(update.transaction_id.clone());
    }
    if update.receipt_id.is_some() {
        entry.receipt_id = non_blank(update.receipt_id.clone());
    }

    entry.normalize(now);
}

/// Materialize the entry if needed, apply the update and persist it.
pub async fn update<S>(
    store: &S,
    candidate: &Candidate,
    property: &Property,
    period: BillingPeriod,
    changes: &LedgerUpdate,
    now: DateTime<Utc>,
) -> AppResult<PaymentLedgerEntry>
where
    S: LedgerRepository + ?Sized,
{
    let mut entry = get_or_create(store, candidate, property, period, now).await?;
    apply_update(&mut entry, changes, now);

    let saved = store
        .save_ledger_entry(&entry)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment record not found.".to_string()))?;

    tracing::info!(
        candidate_id = %candidate.id,
        property_id = %property.id,
        month = period.month(),
        year = period.year(),
        status = %saved.status,
        payment_method = %saved.payment_method,
        "Payment record updated"
    );
    Ok(saved)
}
