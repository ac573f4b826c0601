use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Property,
    repository::{RemovedCandidates, Store},
    schemas::CreatePropertyInput,
    tenancy::{assert_owned_property, OwnerContext},
};

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

pub async fn create<S>(
    store: &S,
    ctx: &OwnerContext,
    input: &CreatePropertyInput,
    now: DateTime<Utc>,
) -> AppResult<Property>
where
    S: Store + ?Sized,
{
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Property name is required.".to_string()));
    }
    let property = Property {
        id: Uuid::new_v4(),
        owner_id: ctx.owner_id,
        name: name.to_string(),
        address: trimmed(input.address.as_deref()),
        mobile: trimmed(input.mobile.as_deref()),
        email: trimmed(input.email.as_deref()),
        monthly_rent: input.monthly_rent,
        deleted: false,
        created_at: now,
    };
    store.insert_property(&property).await
}

pub async fn list_active<S>(store: &S, ctx: &OwnerContext) -> AppResult<Vec<Property>>
where
    S: Store + ?Sized,
{
    store.list_properties(ctx.owner_id, false).await
}

/// Soft-deleted properties, kept for history.
pub async fn list_deleted<S>(store: &S, ctx: &OwnerContext) -> AppResult<Vec<Property>>
where
    S: Store + ?Sized,
{
    store.list_properties(ctx.owner_id, true).await
}

pub async fn soft_delete<S>(store: &S, ctx: &OwnerContext, property_id: Uuid) -> AppResult<Property>
where
    S: Store + ?Sized,
{
    set_deleted(store, ctx, property_id, true).await
}

pub async fn restore<S>(store: &S, ctx: &OwnerContext, property_id: Uuid) -> AppResult<Property>
where
    S: Store + ?Sized,
{
    set_deleted(store, ctx, property_id, false).await
}

async fn set_deleted<S>(
    store: &S,
    ctx: &OwnerContext,
    property_id: Uuid,
    deleted: bool,
) -> AppResult<Property>
where
    S: Store + ?Sized,
{
    let mut property = assert_owned_property(store, ctx, property_id).await?;
    if !store.set_property_deleted(property.id, deleted).await? {
        return Err(AppError::NotFound("Property not found.".to_string()));
    }
    property.deleted = deleted;
    tracing::info!(property_id = %property.id, deleted, "Property visibility changed");
    Ok(property)
}

/// Remove every candidate of the property along with their ledger history.
pub async fn remove_candidates<S>(
    store: &S,
    ctx: &OwnerContext,
    property_id: Uuid,
) -> AppResult<RemovedCandidates>
where
    S: Store + ?Sized,
{
    let property = assert_owned_property(store, ctx, property_id).await?;
    let removed = store.remove_property_candidates(property.id).await?;
    tracing::info!(
        property_id = %property.id,
        candidates = removed.candidates,
        ledger_entries = removed.ledger_entries,
        "Removed property candidates"
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{create, list_active, list_deleted, remove_candidates, restore, soft_delete};
    use crate::error::AppError;
    use crate::models::BillingPeriod;
    use crate::repository::{CandidateRepository, MemoryStore};
    use crate::schemas::CreatePropertyInput;
    use crate::services::payment_ledger::get_or_create;
    use crate::tenancy::OwnerContext;
    use crate::testing::sample_candidate;

    fn input(name: &str) -> CreatePropertyInput {
        CreatePropertyInput {
            name: name.to_string(),
            address: Some("  ".to_string()),
            mobile: None,
            email: None,
            monthly_rent: 5000.0,
        }
    }

    #[tokio::test]
    async fn soft_delete_moves_property_to_trash_and_back() {
        let store = MemoryStore::new();
        let ctx = OwnerContext::new(Uuid::new_v4());
        let property = create(&store, &ctx, &input("Sea Breeze"), Utc::now())
            .await
            .unwrap();
        assert_eq!(property.address, None);

        soft_delete(&store, &ctx, property.id).await.unwrap();
        assert!(list_active(&store, &ctx).await.unwrap().is_empty());
        assert_eq!(list_deleted(&store, &ctx).await.unwrap().len(), 1);

        let restored = restore(&store, &ctx, property.id).await.unwrap();
        assert!(!restored.deleted);
        assert_eq!(list_active(&store, &ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn other_owners_cannot_touch_property() {
        let store = MemoryStore::new();
        let ctx = OwnerContext::new(Uuid::new_v4());
        let property = create(&store, &ctx, &input("Sea Breeze"), Utc::now())
            .await
            .unwrap();

        let stranger = OwnerContext::new(Uuid::new_v4());
        assert!(matches!(
            soft_delete(&store, &stranger, property.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(list_active(&store, &stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn removing_candidates_takes_ledger_history_along() {
        let store = MemoryStore::new();
        let ctx = OwnerContext::new(Uuid::new_v4());
        let property = create(&store, &ctx, &input("Sea Breeze"), Utc::now())
            .await
            .unwrap();
        let period = BillingPeriod::new(1, 2024).unwrap();
        for room in ["1", "2", "3"] {
            let candidate = sample_candidate(&property, room);
            store.insert_candidate(&candidate).await.unwrap();
            get_or_create(&store, &candidate, &property, period, Utc::now())
                .await
                .unwrap();
        }

        let removed = remove_candidates(&store, &ctx, property.id).await.unwrap();
        assert_eq!((removed.candidates, removed.ledger_entries), (3, 3));
        assert_eq!(store.ledger_len().await, 0);
    }
}
