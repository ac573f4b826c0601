use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::require_owner,
    error::AppResult,
    schemas::{validate_input, CreatePropertyInput, EnrollCandidateInput},
    services::{candidates, properties},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/properties",
            axum::routing::get(list_properties).post(create_property),
        )
        .route("/properties/deleted", axum::routing::get(list_deleted_properties))
        .route(
            "/properties/{property_id}/delete",
            axum::routing::post(delete_property),
        )
        .route(
            "/properties/{property_id}/restore",
            axum::routing::post(restore_property),
        )
        .route(
            "/properties/{property_id}/candidates",
            axum::routing::get(list_candidates)
                .post(enroll_candidate)
                .delete(remove_candidates),
        )
}

async fn list_properties(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let rows = properties::list_active(state.store.as_ref(), &ctx).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn list_deleted_properties(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let rows = properties::list_deleted(state.store.as_ref(), &ctx).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn create_property(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePropertyInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    validate_input(&payload)?;
    let ctx = require_owner(&state, &headers)?;
    let property = properties::create(state.store.as_ref(), &ctx, &payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(json!(property))))
}

async fn delete_property(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let property = properties::soft_delete(state.store.as_ref(), &ctx, property_id).await?;
    Ok(Json(json!(property)))
}

async fn restore_property(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let property = properties::restore(state.store.as_ref(), &ctx, property_id).await?;
    Ok(Json(json!(property)))
}

async fn list_candidates(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let rows = candidates::list(state.store.as_ref(), &ctx, property_id).await?;
    Ok(Json(json!({ "data": rows })))
}

async fn enroll_candidate(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<EnrollCandidateInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    validate_input(&payload)?;
    let ctx = require_owner(&state, &headers)?;
    let candidate = candidates::enroll(
        state.store.as_ref(),
        &ctx,
        property_id,
        &payload,
        state.config.today(),
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!(candidate))))
}

async fn remove_candidates(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let removed = properties::remove_candidates(state.store.as_ref(), &ctx, property_id).await?;
    Ok(Json(json!(removed)))
}
