use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    auth::require_owner,
    error::{AppError, AppResult},
    models::BillingPeriod,
    schemas::{validate_input, PaymentHistoryQuery, PaymentUpdateInput, SendReceiptInput},
    services::{payment_history, payment_ledger, receipts::ReceiptIssuer},
    state::AppState,
    tenancy::assert_owned_candidate,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/payments/history", axum::routing::get(payment_history_view))
        .route("/payments/update", axum::routing::post(update_payment))
        .route("/payments/send-receipt", axum::routing::post(send_receipt))
}

fn billing_period(month: u32, year: i32) -> AppResult<BillingPeriod> {
    BillingPeriod::new(month, year)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid billing period {month}/{year}.")))
}

async fn payment_history_view(
    State(state): State<AppState>,
    Query(query): Query<PaymentHistoryQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    validate_input(&query)?;
    let ctx = require_owner(&state, &headers)?;
    let history = payment_history::view(
        state.store.as_ref(),
        &ctx,
        &query,
        state.config.today(),
        Utc::now(),
    )
    .await?;
    Ok(Json(json!(history)))
}

async fn update_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentUpdateInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let ctx = require_owner(&state, &headers)?;
    let period = billing_period(payload.month, payload.year)?;

    let store = state.store.as_ref();
    let (candidate, property) = assert_owned_candidate(store, &ctx, payload.candidate_id).await?;
    if payload
        .property_id
        .is_some_and(|property_id| property_id != property.id)
    {
        return Err(AppError::NotFound(
            "Candidate not found in this property.".to_string(),
        ));
    }

    let entry = payment_ledger::update(
        store,
        &candidate,
        &property,
        period,
        &payload.changes(),
        Utc::now(),
    )
    .await?;
    Ok(Json(json!(entry)))
}

async fn send_receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SendReceiptInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let ctx = require_owner(&state, &headers)?;
    let period = billing_period(payload.month, payload.year)?;

    let issuer = ReceiptIssuer::new(
        state.store.as_ref(),
        state.documents.as_ref(),
        state.delivery.as_ref(),
    );
    let result = issuer
        .finalize_and_issue(
            &ctx,
            payload.candidate_id,
            payload.property_id,
            period,
            state.config.today(),
            Utc::now(),
        )
        .await;
    Ok(Json(json!(result)))
}
