use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::require_owner,
    error::AppResult,
    schemas::{validate_input, ArchiveQuery, UpdateCandidateInput, VacateInput},
    services::candidates,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/candidates/deleted", axum::routing::get(list_archived))
        .route(
            "/candidates/{candidate_id}",
            axum::routing::patch(update_candidate).delete(delete_candidate),
        )
        .route(
            "/candidates/{candidate_id}/vacate",
            axum::routing::post(set_vacate_date),
        )
}

async fn update_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateCandidateInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let ctx = require_owner(&state, &headers)?;
    let candidate = candidates::update(state.store.as_ref(), &ctx, candidate_id, &payload).await?;
    Ok(Json(json!(candidate)))
}

async fn set_vacate_date(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<VacateInput>,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let candidate =
        candidates::set_vacate_date(state.store.as_ref(), &ctx, candidate_id, payload.vacate_date)
            .await?;
    Ok(Json(json!(candidate)))
}

async fn delete_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let archive = candidates::delete(state.store.as_ref(), &ctx, candidate_id, Utc::now()).await?;
    Ok(Json(json!(archive)))
}

async fn list_archived(
    State(state): State<AppState>,
    Query(query): Query<ArchiveQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let rows = candidates::list_archive(state.store.as_ref(), &ctx, query.property_id).await?;
    Ok(Json(json!({ "data": rows })))
}
