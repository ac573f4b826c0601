use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    auth::require_owner,
    error::{AppError, AppResult},
    schemas::{validate_input, OpenBillingOrderInput, PaymentSuccessInput, RegisterOwnerInput},
    services::owners,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/owners/register", axum::routing::post(register_owner))
        .route("/owners/me/validity", axum::routing::get(account_validity))
        .route("/billing/orders", axum::routing::post(open_billing_order))
        .route(
            "/billing/payment-success",
            axum::routing::post(payment_success),
        )
}

async fn register_owner(
    State(state): State<AppState>,
    Json(payload): Json<RegisterOwnerInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    validate_input(&payload)?;
    let registration = owners::register(
        state.store.as_ref(),
        &payload,
        state.config.trial_days,
        state.config.today(),
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!(registration))))
}

async fn account_validity(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let ctx = require_owner(&state, &headers)?;
    let evaluation =
        owners::login_evaluation(state.store.as_ref(), &ctx, state.config.today()).await?;
    Ok(Json(json!(evaluation)))
}

async fn open_billing_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<OpenBillingOrderInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    validate_input(&payload)?;
    let ctx = require_owner(&state, &headers)?;
    let order =
        owners::open_billing_order(state.store.as_ref(), &ctx, &payload.order_id, Utc::now())
            .await?;
    Ok((StatusCode::CREATED, Json(json!(order))))
}

async fn payment_success(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentSuccessInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let ctx = require_owner(&state, &headers)?;
    let secret = state
        .config
        .payment_webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Dependency("Payment gateway is not configured.".to_string()))?;

    if !owners::verify_gateway_signature(
        &payload.order_id,
        &payload.payment_id,
        &payload.signature,
        secret,
    ) {
        tracing::warn!(owner_id = %ctx.owner_id, order_id = %payload.order_id, "Rejected payment signature");
        return Err(AppError::Unauthorized("Invalid payment signature.".to_string()));
    }

    let owner = owners::confirm_gateway_payment(
        state.store.as_ref(),
        &ctx,
        &payload.order_id,
        &payload.payment_id,
        &state.config.standard_plan_name,
        state.config.standard_plan_days,
        state.config.today(),
        Utc::now(),
    )
    .await?;
    Ok(Json(json!({
        "owner_id": owner.id,
        "subscribed": owner.subscribed,
        "plan": owner.subscription_plan,
        "subscription_start": owner.subscription_start,
        "subscription_end": owner.subscription_end,
    })))
}
