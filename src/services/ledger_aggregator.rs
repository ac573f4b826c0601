use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{BillingPeriod, PaymentLedgerEntry, PaymentStatus},
    repository::{LedgerRepository, LedgerTotals, StatusTally},
};

/// Status counts for a period. `pending` is derived so the three buckets
/// always add up to `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerCounts {
    pub total: u64,
    pub paid: u64,
    pub partial: u64,
    pub pending: u64,
}

impl LedgerCounts {
    pub fn from_tally(tally: StatusTally) -> Self {
        // Clamp so a torn read never yields paid + partial > total.
        let paid = tally.paid.min(tally.total);
        let partial = tally.partial.min(tally.total - paid);
        Self {
            total: tally.total,
            paid,
            partial,
            pending: tally.total - paid - partial,
        }
    }

    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a PaymentLedgerEntry>,
    {
        let tally = entries
            .into_iter()
            .fold(StatusTally::default(), |mut tally, entry| {
                tally.total += 1;
                match entry.status {
                    PaymentStatus::Paid => tally.paid += 1,
                    PaymentStatus::PartialPaid => tally.partial += 1,
                    PaymentStatus::Pending => {}
                }
                tally
            });
        Self::from_tally(tally)
    }
}

/// Advance, paid and balance sums for the property's period. Empty periods
/// yield zeros.
pub async fn totals<S>(
    store: &S,
    property_id: Uuid,
    period: BillingPeriod,
) -> AppResult<LedgerTotals>
where
    S: LedgerRepository + ?Sized,
{
    store.ledger_totals(property_id, period).await
}

pub async fn counts<S>(store: &S, property_id: Uuid, period: BillingPeriod) -> AppResult<LedgerCounts>
where
    S: LedgerRepository + ?Sized,
{
    let tally = store.ledger_status_tally(property_id, period).await?;
    Ok(LedgerCounts::from_tally(tally))
}
