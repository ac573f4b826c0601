use axum::{routing::get, Router};

use crate::state::AppState;

pub mod candidates;
pub mod health;
pub mod owners;
pub mod payments;
pub mod properties;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(owners::router())
        .merge(properties::router())
        .merge(candidates::router())
        .merge(payments::router())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use hmac::{Hmac, Mac};
    use serde_json::{json, Value};
    use sha2::Sha256;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::v1_router;
    use crate::auth::DEV_OWNER_HEADER;
    use crate::config::AppConfig;
    use crate::repository::MemoryStore;
    use crate::services::mailer::DisabledDelivery;
    use crate::state::AppState;

    fn app() -> Router {
        let state = AppState::with_store(
            AppConfig::for_tests(),
            Arc::new(MemoryStore::new()),
            Arc::new(DisabledDelivery),
        );
        v1_router().with_state(state)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        owner: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(owner_id) = owner {
            builder = builder.header(DEV_OWNER_HEADER, owner_id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, email: &str, mobile: &str) -> (Uuid, Uuid) {
        let (status, body) = call(
            app,
            Method::POST,
            "/owners/register",
            None,
            Some(json!({
                "owner_name": "Meera",
                "email": email,
                "mobile": mobile,
                "password_hash": "hash",
                "property_name": "Green Nest PG",
                "monthly_rent": 6500.0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let owner_id = body["owner"]["id"].as_str().unwrap().parse().unwrap();
        let property_id = body["property"]["id"].as_str().unwrap().parse().unwrap();
        (owner_id, property_id)
    }

    async fn enroll(app: &Router, owner_id: Uuid, property_id: Uuid, room: &str) -> Uuid {
        let (status, body) = call(
            app,
            Method::POST,
            &format!("/properties/{property_id}/candidates"),
            Some(owner_id),
            Some(json!({
                "name": format!("Tenant {room}"),
                "email": format!("tenant{room}@example.com"),
                "room_no": room,
                "joining_date": "2024-01-01"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn health_reports_memory_store() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn owner_routes_require_identity() {
        let app = app();
        let (status, _) = call(&app, Method::GET, "/properties", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = app();
        register(&app, "meera@example.com", "9876543210").await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/owners/register",
            None,
            Some(json!({
                "owner_name": "Other",
                "email": "MEERA@example.com",
                "mobile": "9123456780",
                "password_hash": "hash",
                "property_name": "Second"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn fresh_owner_is_on_trial() {
        let app = app();
        let (owner_id, _) = register(&app, "meera@example.com", "9876543210").await;
        let (status, body) = call(&app, Method::GET, "/owners/me/validity", Some(owner_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "TRIAL");
        assert_eq!(body["expired"], false);
        assert_eq!(body["plan"], "TRIAL");
    }

    fn gateway_signature(order_id: &str, payment_id: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"whsec").unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    async fn open_order(app: &Router, owner_id: Uuid, order_id: &str) -> StatusCode {
        let (status, _) = call(
            app,
            Method::POST,
            "/billing/orders",
            Some(owner_id),
            Some(json!({ "order_id": order_id })),
        )
        .await;
        status
    }

    async fn pay(app: &Router, owner_id: Uuid, order_id: &str, payment_id: &str) -> (StatusCode, Value) {
        call(
            app,
            Method::POST,
            "/billing/payment-success",
            Some(owner_id),
            Some(json!({
                "order_id": order_id,
                "payment_id": payment_id,
                "signature": gateway_signature(order_id, payment_id)
            })),
        )
        .await
    }

    #[tokio::test]
    async fn payment_success_checks_signature() {
        let app = app();
        let (owner_id, _) = register(&app, "meera@example.com", "9876543210").await;
        assert_eq!(open_order(&app, owner_id, "order_1").await, StatusCode::CREATED);

        let (status, _) = call(
            &app,
            Method::POST,
            "/billing/payment-success",
            Some(owner_id),
            Some(json!({"order_id": "order_1", "payment_id": "pay_1", "signature": "00ff"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = pay(&app, owner_id, "order_1", "pay_1").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["subscribed"], true);
        assert_eq!(body["plan"], "STANDARD");
    }

    #[tokio::test]
    async fn payment_without_an_order_is_not_found() {
        let app = app();
        let (owner_id, _) = register(&app, "meera@example.com", "9876543210").await;
        let (status, _) = pay(&app, owner_id, "order_9", "pay_9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn signed_payment_cannot_be_replayed() {
        let app = app();
        let (payer, _) = register(&app, "meera@example.com", "9876543210").await;
        let (other, _) = register(&app, "ravi@example.com", "9123456780").await;
        assert_eq!(open_order(&app, payer, "order_1").await, StatusCode::CREATED);
        assert_eq!(open_order(&app, other, "order_1").await, StatusCode::CONFLICT);

        let (status, _) = pay(&app, payer, "order_1", "pay_1").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = pay(&app, other, "order_1", "pay_1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, validity) = call(&app, Method::GET, "/owners/me/validity", Some(other), None).await;
        assert_eq!(validity["subscribed"], false);
        assert_eq!(validity["mode"], "TRIAL");

        let (status, _) = pay(&app, payer, "order_1", "pay_1").await;
        assert_eq!(status, StatusCode::CONFLICT);

        assert_eq!(open_order(&app, payer, "order_2").await, StatusCode::CREATED);
        let (status, _) = pay(&app, payer, "order_2", "pay_1").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn foreign_owner_cannot_see_candidates() {
        let app = app();
        let (owner_id, property_id) = register(&app, "meera@example.com", "9876543210").await;
        enroll(&app, owner_id, property_id, "101").await;
        let (intruder, _) = register(&app, "ravi@example.com", "9123456780").await;

        let uri = format!("/properties/{property_id}/candidates");
        let (status, _) = call(&app, Method::GET, &uri, Some(intruder), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, Method::GET, &uri, Some(owner_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_update_and_receipt_flow() {
        let app = app();
        let (owner_id, property_id) = register(&app, "meera@example.com", "9876543210").await;
        let tenant_ten = enroll(&app, owner_id, property_id, "10").await;
        enroll(&app, owner_id, property_id, "2").await;

        let history_uri = format!("/payments/history?property_id={property_id}&month=3&year=2024");
        let (status, body) = call(&app, Method::GET, &history_uri, Some(owner_id), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let rooms: Vec<&str> = body["rows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["entry"]["room_no"].as_str().unwrap())
            .collect();
        assert_eq!(rooms, vec!["2", "10"]);
        assert_eq!(body["counts"]["pending"], 2);

        let (status, _) = call(
            &app,
            Method::POST,
            "/payments/send-receipt",
            Some(owner_id),
            Some(json!({
                "candidate_id": tenant_ten,
                "property_id": property_id,
                "month": 3,
                "year": 2024
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::POST,
            "/payments/update",
            Some(owner_id),
            Some(json!({
                "candidate_id": tenant_ten,
                "property_id": property_id,
                "month": 3,
                "year": 2024,
                "status": "paid",
                "amount_paid": 6500.0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "PAID");
        assert_eq!(body["payment_method"], "CASH");

        let (status, body) = call(
            &app,
            Method::POST,
            "/payments/send-receipt",
            Some(owner_id),
            Some(json!({
                "candidate_id": tenant_ten,
                "property_id": property_id,
                "month": 3,
                "year": 2024
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true, "{body}");
        assert!(body["transaction_id"].as_str().unwrap().starts_with("CASH-"));
        assert!(body["receipt_id"].as_str().unwrap().starts_with("RCPT-"));

        let (_, body) = call(&app, Method::GET, &history_uri, Some(owner_id), None).await;
        assert_eq!(body["counts"]["paid"], 1);
        assert_eq!(body["totals"]["paid"], 6500.0);
    }

    #[tokio::test]
    async fn unpaid_period_is_not_payable() {
        let app = app();
        let (owner_id, property_id) = register(&app, "meera@example.com", "9876543210").await;
        let tenant = enroll(&app, owner_id, property_id, "5").await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/payments/send-receipt",
            Some(owner_id),
            Some(json!({
                "candidate_id": tenant,
                "property_id": property_id,
                "month": 4,
                "year": 2024
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert_eq!(body["reason"], "not payable");
    }

    #[tokio::test]
    async fn deleted_candidate_lands_in_archive() {
        let app = app();
        let (owner_id, property_id) = register(&app, "meera@example.com", "9876543210").await;
        let tenant = enroll(&app, owner_id, property_id, "7").await;

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/candidates/{tenant}"),
            Some(owner_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/candidates/deleted?property_id={property_id}"),
            Some(owner_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let archived = body["data"].as_array().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0]["room_no"], "7");
    }
}
