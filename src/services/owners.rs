use chrono::{DateTime, Days, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{BillingOrder, Owner, Property, TRIAL_PLAN},
    repository::Store,
    schemas::RegisterOwnerInput,
    services::account_validity::{evaluate_and_record, AccountValidity},
    tenancy::OwnerContext,
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub owner: Owner,
    pub property: Property,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginEvaluation {
    pub owner_id: Uuid,
    pub plan: Option<String>,
    pub subscribed: bool,
    #[serde(flatten)]
    pub validity: AccountValidity,
}

/// Create an owner on a fresh trial together with their first property.
pub async fn register<S>(
    store: &S,
    input: &RegisterOwnerInput,
    trial_days: i64,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> AppResult<Registration>
where
    S: Store + ?Sized,
{
    let email = input.email.trim().to_ascii_lowercase();
    let mobile = input.mobile.trim().to_string();

    if store.find_owner_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered.".to_string()));
    }
    if store.find_owner_by_mobile(&mobile).await?.is_some() {
        return Err(AppError::Conflict(
            "Mobile number is already registered.".to_string(),
        ));
    }

    let mpin_hash = match (input.mpin.as_deref(), input.mpin_hash.as_deref()) {
        (Some(_), Some(hash)) if !hash.trim().is_empty() => Some(hash.trim().to_string()),
        (Some(_), _) => {
            return Err(AppError::BadRequest(
                "MPIN hash is required when an MPIN is set.".to_string(),
            ))
        }
        (None, _) => None,
    };

    let trial_end = add_days(today, trial_days)?;
    let owner = Owner {
        id: Uuid::new_v4(),
        owner_name: input.owner_name.trim().to_string(),
        email,
        mobile,
        password_hash: input.password_hash.clone(),
        mpin_hash,
        trial_start_date: Some(today),
        trial_end_date: Some(trial_end),
        trial_expired: false,
        subscribed: false,
        subscription_plan: Some(TRIAL_PLAN.to_string()),
        subscription_start: None,
        subscription_end: None,
        created_at: now,
    };
    let owner = store.insert_owner(&owner).await?;

    let property = Property {
        id: Uuid::new_v4(),
        owner_id: owner.id,
        name: input.property_name.trim().to_string(),
        address: input
            .property_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(ToOwned::to_owned),
        mobile: Some(owner.mobile.clone()),
        email: Some(owner.email.clone()),
        monthly_rent: input.monthly_rent.unwrap_or(0.0),
        deleted: false,
        created_at: now,
    };
    let property = store.insert_property(&property).await?;

    tracing::info!(owner_id = %owner.id, trial_end = ?owner.trial_end_date, "Owner registered");
    Ok(Registration { owner, property })
}

/// Account validity as evaluated at login, including the one-time
/// trial-expiry write.
pub async fn login_evaluation<S>(
    store: &S,
    ctx: &OwnerContext,
    today: NaiveDate,
) -> AppResult<LoginEvaluation>
where
    S: Store + ?Sized,
{
    let owner = store
        .find_owner(ctx.owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Owner not found.".to_string()))?;
    let validity = evaluate_and_record(store, &owner, today).await?;
    Ok(LoginEvaluation {
        owner_id: owner.id,
        plan: owner.subscription_plan.clone(),
        subscribed: owner.subscribed,
        validity,
    })
}

/// Record a confirmed gateway payment as an active subscription.
pub async fn activate_subscription<S>(
    store: &S,
    ctx: &OwnerContext,
    plan: &str,
    duration_days: i64,
    today: NaiveDate,
) -> AppResult<Owner>
where
    S: Store + ?Sized,
{
    let end = add_days(today, duration_days)?;
    let owner = store
        .save_subscription(ctx.owner_id, plan, today, end)
        .await?
        .ok_or_else(|| AppError::NotFound("Owner not found.".to_string()))?;
    tracing::info!(owner_id = %owner.id, plan, subscription_end = %end, "Subscription activated");
    Ok(owner)
}

fn add_days(start: NaiveDate, days: i64) -> AppResult<NaiveDate> {
    u64::try_from(days.max(0))
        .ok()
        .and_then(|days| start.checked_add_days(Days::new(days)))
        .ok_or_else(|| AppError::BadRequest(format!("A {days}-day period is out of range.")))
}

/// Register a gateway order for the calling owner. Payment confirmations are
/// only accepted for orders opened this way.
pub async fn open_billing_order<S>(
    store: &S,
    ctx: &OwnerContext,
    order_id: &str,
    now: DateTime<Utc>,
) -> AppResult<BillingOrder>
where
    S: Store + ?Sized,
{
    if store.find_owner(ctx.owner_id).await?.is_none() {
        return Err(AppError::NotFound("Owner not found.".to_string()));
    }
    let order = BillingOrder {
        order_id: order_id.trim().to_string(),
        owner_id: ctx.owner_id,
        payment_id: None,
        created_at: now,
        paid_at: None,
    };
    let order = store.insert_billing_order(&order).await?;
    tracing::info!(owner_id = %ctx.owner_id, order_id = %order.order_id, "Billing order opened");
    Ok(order)
}

/// Consume a verified gateway payment: the order must belong to the caller
/// and each order and payment id is honoured once. Activates the plan.
#[allow(clippy::too_many_arguments)]
pub async fn confirm_gateway_payment<S>(
    store: &S,
    ctx: &OwnerContext,
    order_id: &str,
    payment_id: &str,
    plan: &str,
    duration_days: i64,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> AppResult<Owner>
where
    S: Store + ?Sized,
{
    let order_id = order_id.trim();
    let payment_id = payment_id.trim();
    let order = store
        .find_billing_order(order_id)
        .await?
        .filter(|order| order.owner_id == ctx.owner_id)
        .ok_or_else(|| AppError::NotFound("Billing order not found.".to_string()))?;
    if order.payment_id.is_some() {
        return Err(AppError::Conflict("Payment was already processed.".to_string()));
    }

    let claimed = store
        .claim_billing_order(order_id, payment_id, now)
        .await
        .map_err(|error| match error {
            AppError::Conflict(_) => {
                AppError::Conflict("Payment was already processed.".to_string())
            }
            other => other,
        })?;
    if claimed.is_none() {
        return Err(AppError::Conflict("Payment was already processed.".to_string()));
    }
    tracing::info!(owner_id = %ctx.owner_id, order_id, payment_id, "Gateway payment recorded");

    activate_subscription(store, ctx, plan, duration_days, today).await
}

/// Check a gateway signature: hex HMAC-SHA256 of `"{order_id}|{payment_id}"`.
pub fn verify_gateway_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());

    let Ok(expected) = hex_decode(signature.trim()) else {
        return false;
    };
    mac.verify_slice(&expected).is_ok()
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}
