use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{non_blank, room_or_default, Candidate, DeletedCandidate},
    repository::Store,
    schemas::{EnrollCandidateInput, UpdateCandidateInput},
    services::room_ordering::sort_for_listing,
    tenancy::{assert_owned_candidate, assert_owned_property, OwnerContext},
};

/// Add a tenant to a property. No ledger entry is created here; entries
/// appear when a period is first viewed.
pub async fn enroll<S>(
    store: &S,
    ctx: &OwnerContext,
    property_id: Uuid,
    input: &EnrollCandidateInput,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> AppResult<Candidate>
where
    S: Store + ?Sized,
{
    let property = assert_owned_property(store, ctx, property_id).await?;
    if property.deleted {
        return Err(AppError::BadRequest(
            "Cannot enroll into a deleted property.".to_string(),
        ));
    }
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Candidate name is required.".to_string()));
    }

    let candidate = Candidate {
        id: Uuid::new_v4(),
        property_id: property.id,
        name: name.to_string(),
        gender: non_blank(input.gender.clone()),
        age: input.age,
        dob: input.dob,
        mobile: non_blank(input.mobile.clone()),
        email: non_blank(input.email.clone()),
        room_no: room_or_default(input.room_no.as_deref()),
        aadhaar: non_blank(input.aadhaar.clone()),
        guardian_mobile: non_blank(input.guardian_mobile.clone()),
        address: non_blank(input.address.clone()),
        joining_date: Some(input.joining_date.unwrap_or(today)),
        vacate_date: None,
        created_at: now,
    };
    let candidate = store.insert_candidate(&candidate).await?;
    tracing::info!(candidate_id = %candidate.id, property_id = %property.id, room_no = %candidate.room_no, "Candidate enrolled");
    Ok(candidate)
}

/// Overwrite the supplied fields. A blank room keeps the current room.
pub async fn update<S>(
    store: &S,
    ctx: &OwnerContext,
    candidate_id: Uuid,
    input: &UpdateCandidateInput,
) -> AppResult<Candidate>
where
    S: Store + ?Sized,
{
    let (mut candidate, _) = assert_owned_candidate(store, ctx, candidate_id).await?;

    if let Some(name) = non_blank(input.name.clone()) {
        candidate.name = name;
    }
    if let Some(room) = non_blank(input.room_no.clone()) {
        candidate.room_no = room;
    }
    if let Some(joined) = input.joining_date {
        candidate.joining_date = Some(joined);
    }
    if input.age.is_some() {
        candidate.age = input.age;
    }
    if input.dob.is_some() {
        candidate.dob = input.dob;
    }
    for (target, supplied) in [
        (&mut candidate.gender, &input.gender),
        (&mut candidate.mobile, &input.mobile),
        (&mut candidate.email, &input.email),
        (&mut candidate.aadhaar, &input.aadhaar),
        (&mut candidate.guardian_mobile, &input.guardian_mobile),
        (&mut candidate.address, &input.address),
    ] {
        if supplied.is_some() {
            *target = non_blank(supplied.clone());
        }
    }

    store
        .update_candidate(&candidate)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found.".to_string()))
}

pub async fn set_vacate_date<S>(
    store: &S,
    ctx: &OwnerContext,
    candidate_id: Uuid,
    vacate_date: Option<NaiveDate>,
) -> AppResult<Candidate>
where
    S: Store + ?Sized,
{
    let (mut candidate, _) = assert_owned_candidate(store, ctx, candidate_id).await?;
    candidate.vacate_date = vacate_date;
    store
        .update_candidate(&candidate)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found.".to_string()))
}

/// Archive the candidate, then remove the live row and its ledger entries.
pub async fn delete<S>(
    store: &S,
    ctx: &OwnerContext,
    candidate_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<DeletedCandidate>
where
    S: Store + ?Sized,
{
    let (candidate, _) = assert_owned_candidate(store, ctx, candidate_id).await?;
    let archive = DeletedCandidate::archive_of(&candidate, now);
    if !store.archive_and_delete_candidate(&archive).await? {
        return Err(AppError::NotFound("Candidate not found.".to_string()));
    }
    tracing::info!(candidate_id = %candidate.id, archive_id = %archive.id, "Candidate archived");
    Ok(archive)
}

/// Candidates of a property in listing order: integer rooms ascending,
/// everything else after them.
pub async fn list<S>(store: &S, ctx: &OwnerContext, property_id: Uuid) -> AppResult<Vec<Candidate>>
where
    S: Store + ?Sized,
{
    let property = assert_owned_property(store, ctx, property_id).await?;
    let mut candidates = store.list_candidates(property.id).await?;
    sort_for_listing(&mut candidates, |candidate| candidate.room_no.as_str());
    Ok(candidates)
}

pub async fn list_archive<S>(
    store: &S,
    ctx: &OwnerContext,
    property_id: Option<Uuid>,
) -> AppResult<Vec<DeletedCandidate>>
where
    S: Store + ?Sized,
{
    if let Some(property_id) = property_id {
        assert_owned_property(store, ctx, property_id).await?;
    }
    store.list_archived_candidates(ctx.owner_id, property_id).await
}
