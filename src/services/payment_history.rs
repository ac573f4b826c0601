//! The monthly payment sheet of a property.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{BillingPeriod, Candidate, PaymentLedgerEntry, Property},
    repository::{LedgerTotals, Store},
    schemas::PaymentHistoryQuery,
    services::{
        ledger_aggregator::{self, LedgerCounts},
        payment_ledger::get_or_create,
        room_ordering::sort_by_room,
        tenancy_window::residents_for,
    },
    tenancy::{assert_owned_property, OwnerContext},
};

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRow {
    pub candidate: Candidate,
    pub entry: PaymentLedgerEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentHistory {
    pub property: Property,
    pub period: BillingPeriod,
    pub rows: Vec<PaymentRow>,
    pub counts: LedgerCounts,
    pub totals: LedgerTotals,
}

async fn resolve_property<S>(
    store: &S,
    ctx: &OwnerContext,
    query: &PaymentHistoryQuery,
) -> AppResult<Property>
where
    S: Store + ?Sized,
{
    if let Some(property_id) = query.property_id {
        return assert_owned_property(store, ctx, property_id).await;
    }
    store
        .list_properties(ctx.owner_id, false)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("No active property found.".to_string()))
}

fn resolve_period(query: &PaymentHistoryQuery, today: NaiveDate) -> AppResult<BillingPeriod> {
    let current = BillingPeriod::containing(today);
    let month = query.month.unwrap_or(current.month());
    let year = query.year.unwrap_or(current.year());
    BillingPeriod::new(month, year)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid billing period {month}/{year}.")))
}

/// Build the sheet: residents of the period narrowed by the room filter, in
/// room order, each with its (possibly just created) ledger entry.
pub async fn view<S>(
    store: &S,
    ctx: &OwnerContext,
    query: &PaymentHistoryQuery,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> AppResult<PaymentHistory>
where
    S: Store + ?Sized,
{
    let property = resolve_property(store, ctx, query).await?;
    let period = resolve_period(query, today)?;

    let candidates = store.list_candidates(property.id).await?;
    let mut residents = residents_for(candidates, period, query.room.as_deref());
    sort_by_room(&mut residents, |candidate| Some(candidate.room_no.as_str()));

    let mut rows = Vec::with_capacity(residents.len());
    for candidate in residents {
        let entry = get_or_create(store, &candidate, &property, period, now).await?;
        rows.push(PaymentRow { candidate, entry });
    }

    let counts = LedgerCounts::from_entries(rows.iter().map(|row| &row.entry));
    let totals = ledger_aggregator::totals(store, property.id, period).await?;

    Ok(PaymentHistory {
        property,
        period,
        rows,
        counts,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::view;
    use crate::error::AppError;
    use crate::models::PaymentStatus;
    use crate::repository::{CandidateRepository, MemoryStore, PropertyRepository};
    use crate::schemas::PaymentHistoryQuery;
    use crate::services::payment_ledger::{update, LedgerUpdate};
    use crate::tenancy::OwnerContext;
    use crate::testing::{sample_candidate, sample_property};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 18).expect("valid date")
    }

    #[tokio::test]
    async fn materializes_entries_for_residents_in_room_order() {
        let store = MemoryStore::new();
        let ctx = OwnerContext::new(Uuid::new_v4());
        let property = sample_property(ctx.owner_id);
        store.insert_property(&property).await.unwrap();

        let mut rooms = Vec::new();
        for room in ["10", "A1", "2", "1"] {
            let candidate = sample_candidate(&property, room);
            store.insert_candidate(&candidate).await.unwrap();
            rooms.push(candidate);
        }
        let mut late = sample_candidate(&property, "3");
        late.joining_date = NaiveDate::from_ymd_opt(2024, 4, 2);
        store.insert_candidate(&late).await.unwrap();

        update(
            &store,
            &rooms[0],
            &property,
            crate::models::BillingPeriod::new(3, 2024).unwrap(),
            &LedgerUpdate {
                status: Some("PAID".to_string()),
                amount_paid: Some(6500.0),
                ..LedgerUpdate::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

        let sheet = view(&store, &ctx, &PaymentHistoryQuery::default(), today(), Utc::now())
            .await
            .unwrap();

        let order: Vec<&str> = sheet
            .rows
            .iter()
            .map(|row| row.candidate.room_no.as_str())
            .collect();
        assert_eq!(order, vec!["1", "2", "10", "A1"]);
        assert_eq!(store.ledger_len().await, 4);
        assert_eq!(sheet.counts.total, 4);
        assert_eq!(sheet.counts.paid, 1);
        assert_eq!(sheet.counts.pending, 3);
        assert_eq!(sheet.totals.paid, 6500.0);
        assert_eq!(sheet.rows[2].entry.status, PaymentStatus::Paid);

        let again = view(&store, &ctx, &PaymentHistoryQuery::default(), today(), Utc::now())
            .await
            .unwrap();
        assert_eq!(store.ledger_len().await, 4);
        assert_eq!(again.rows[0].entry.id, sheet.rows[0].entry.id);
    }

    #[tokio::test]
    async fn room_filter_narrows_the_sheet() {
        let store = MemoryStore::new();
        let ctx = OwnerContext::new(Uuid::new_v4());
        let property = sample_property(ctx.owner_id);
        store.insert_property(&property).await.unwrap();
        for room in ["101", "102", "201"] {
            store
                .insert_candidate(&sample_candidate(&property, room))
                .await
                .unwrap();
        }

        let query = PaymentHistoryQuery {
            property_id: Some(property.id),
            room: Some("10".to_string()),
            ..PaymentHistoryQuery::default()
        };
        let sheet = view(&store, &ctx, &query, today(), Utc::now()).await.unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(store.ledger_len().await, 2);
    }

    #[tokio::test]
    async fn rejects_invalid_month_and_missing_property() {
        let store = MemoryStore::new();
        let ctx = OwnerContext::new(Uuid::new_v4());
        assert!(matches!(
            view(&store, &ctx, &PaymentHistoryQuery::default(), today(), Utc::now()).await,
            Err(AppError::NotFound(_))
        ));

        let property = sample_property(ctx.owner_id);
        store.insert_property(&property).await.unwrap();
        let query = PaymentHistoryQuery {
            month: Some(13),
            ..PaymentHistoryQuery::default()
        };
        assert!(matches!(
            view(&store, &ctx, &query, today(), Utc::now()).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
