use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
    tenancy::OwnerContext,
};

pub const DEV_OWNER_HEADER: &str = "x-owner-id";

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn parse_owner_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Unauthorized("Unauthorized: invalid owner id.".to_string()))
}

/// Resolve the calling owner from a bearer token, or from the dev header
/// when overrides are enabled outside production.
pub fn require_owner(state: &AppState, headers: &HeaderMap) -> AppResult<OwnerContext> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(raw) = headers
            .get(DEV_OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            return parse_owner_id(raw).map(OwnerContext::new);
        }
    }

    let token = bearer_token(headers).ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: missing bearer token.".to_string())
    })?;
    let secret = state.config.auth_jwt_secret.as_deref().ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: token verification is not configured.".to_string())
    })?;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|error| {
        tracing::debug!(error = %error, "Rejected bearer token");
        AppError::Unauthorized("Unauthorized: invalid or expired token.".to_string())
    })?
    .claims;

    parse_owner_id(&claims.sub).map(OwnerContext::new)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{HeaderMap, HeaderValue};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use uuid::Uuid;

    use super::{require_owner, DEV_OWNER_HEADER};
    use crate::config::AppConfig;
    use crate::repository::MemoryStore;
    use crate::services::mailer::DisabledDelivery;
    use crate::state::AppState;

    fn state(config: AppConfig) -> AppState {
        AppState::with_store(config, Arc::new(MemoryStore::new()), Arc::new(DisabledDelivery))
    }

    fn token(sub: &str, secret: &str) -> String {
        let exp = chrono::Utc::now().timestamp() + 600;
        encode(
            &Header::default(),
            &json!({ "sub": sub, "exp": exp }),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_signed_bearer_token() {
        let owner_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token(&owner_id.to_string(), "test-secret")))
                .unwrap(),
        );
        let ctx = require_owner(&state(AppConfig::for_tests()), &headers).unwrap();
        assert_eq!(ctx.owner_id, owner_id);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token(&Uuid::new_v4().to_string(), "nope")))
                .unwrap(),
        );
        assert!(require_owner(&state(AppConfig::for_tests()), &headers).is_err());
    }

    #[test]
    fn dev_header_only_works_when_enabled() {
        let owner_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            DEV_OWNER_HEADER,
            HeaderValue::from_str(&owner_id.to_string()).unwrap(),
        );
        let ctx = require_owner(&state(AppConfig::for_tests()), &headers).unwrap();
        assert_eq!(ctx.owner_id, owner_id);

        let mut production = AppConfig::for_tests();
        production.environment = "production".to_string();
        assert!(require_owner(&state(production), &headers).is_err());
    }
}
