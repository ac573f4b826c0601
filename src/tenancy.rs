//! Owner scoping. Every core operation receives an explicit [`OwnerContext`]
//! and resolves properties and candidates through it; nothing here reads
//! request state.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Candidate, Property},
    repository::{CandidateRepository, PropertyRepository},
};

/// The authenticated owner on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerContext {
    pub owner_id: Uuid,
}

impl OwnerContext {
    pub fn new(owner_id: Uuid) -> Self {
        Self { owner_id }
    }

    pub fn owns(&self, property: &Property) -> bool {
        property.owner_id == self.owner_id
    }
}

pub async fn find_owned_property<S>(
    store: &S,
    ctx: &OwnerContext,
    property_id: Uuid,
) -> AppResult<Option<Property>>
where
    S: PropertyRepository + ?Sized,
{
    Ok(store
        .find_property(property_id)
        .await?
        .filter(|property| ctx.owns(property)))
}

/// Another owner's property is reported exactly like a missing one.
pub async fn assert_owned_property<S>(
    store: &S,
    ctx: &OwnerContext,
    property_id: Uuid,
) -> AppResult<Property>
where
    S: PropertyRepository + ?Sized,
{
    find_owned_property(store, ctx, property_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Property not found.".to_string()))
}

/// Resolve a candidate together with its property, both scoped to the owner.
pub async fn find_owned_candidate<S>(
    store: &S,
    ctx: &OwnerContext,
    candidate_id: Uuid,
) -> AppResult<Option<(Candidate, Property)>>
where
    S: CandidateRepository + PropertyRepository + ?Sized,
{
    let Some(candidate) = store.find_candidate(candidate_id).await? else {
        return Ok(None);
    };
    let property = find_owned_property(store, ctx, candidate.property_id).await?;
    Ok(property.map(|property| (candidate, property)))
}

pub async fn assert_owned_candidate<S>(
    store: &S,
    ctx: &OwnerContext,
    candidate_id: Uuid,
) -> AppResult<(Candidate, Property)>
where
    S: CandidateRepository + PropertyRepository + ?Sized,
{
    find_owned_candidate(store, ctx, candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found.".to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{assert_owned_candidate, assert_owned_property, OwnerContext};
    use crate::error::AppError;
    use crate::models::{Candidate, Property};
    use crate::repository::{CandidateRepository, MemoryStore, PropertyRepository};

    fn property(owner_id: Uuid) -> Property {
        Property {
            id: Uuid::new_v4(),
            owner_id,
            name: "Lakeview".to_string(),
            address: None,
            mobile: None,
            email: None,
            monthly_rent: 0.0,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn foreign_property_is_not_found() {
        let store = MemoryStore::new();
        let home = property(Uuid::new_v4());
        store.insert_property(&home).await.unwrap();

        let stranger = OwnerContext::new(Uuid::new_v4());
        let error = assert_owned_property(&store, &stranger, home.id)
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::NotFound(_)));

        let owner = OwnerContext::new(home.owner_id);
        assert_eq!(
            assert_owned_property(&store, &owner, home.id).await.unwrap().id,
            home.id
        );
    }

    #[tokio::test]
    async fn candidate_resolves_through_owned_property() {
        let store = MemoryStore::new();
        let home = property(Uuid::new_v4());
        store.insert_property(&home).await.unwrap();
        let tenant = Candidate {
            id: Uuid::new_v4(),
            property_id: home.id,
            name: "Asha".to_string(),
            gender: None,
            age: None,
            dob: None,
            mobile: None,
            email: None,
            room_no: "12".to_string(),
            aadhaar: None,
            guardian_mobile: None,
            address: None,
            joining_date: None,
            vacate_date: None,
            created_at: Utc::now(),
        };
        store.insert_candidate(&tenant).await.unwrap();

        let owner = OwnerContext::new(home.owner_id);
        let (found, parent) = assert_owned_candidate(&store, &owner, tenant.id)
            .await
            .unwrap();
        assert_eq!((found.id, parent.id), (tenant.id, home.id));

        let stranger = OwnerContext::new(Uuid::new_v4());
        assert!(assert_owned_candidate(&store, &stranger, tenant.id)
            .await
            .is_err());
    }
}
