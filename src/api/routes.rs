use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::auth::auth_middleware;
use super::events::{sse_filtered, sse_handler};
use super::handlers::*;
use super::state::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        // Tickets
        .route("/v1/tickets", get(list_tickets).post(create_ticket))
        .route("/v1/tickets/by-number/:ticket_number", get(get_ticket_by_number))
        .route("/v1/tickets/:ticket_id", get(get_ticket).patch(update_ticket))
        .route("/v1/tickets/:ticket_id/permissions", get(get_permissions))

        // Lifecycle
        .route("/v1/tickets/:ticket_id/submit", post(submit_ticket))
        .route("/v1/tickets/:ticket_id/status", post(change_status))
        .route("/v1/tickets/:ticket_id/part-number", post(assign_part_number))
        .route("/v1/tickets/:ticket_id/npdi", post(initiate_npdi))
        .route("/v1/tickets/:ticket_id/complete", post(complete_ticket))
        .route("/v1/tickets/:ticket_id/history", get(get_history))

        // Comments
        .route("/v1/tickets/:ticket_id/comments", get(list_comments).post(create_comment))

        // Real-time updates (SSE)
        .route("/v1/stream", get(sse_handler))
        .route("/v1/stream/filtered", get(sse_filtered))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::db::Database;

    const TOKEN: &str = "test-token";
    const PM: (&str, &str) = ("pm@example.com", "PRODUCT_MANAGER");
    const OPS: (&str, &str) = ("ops@example.com", "PM_OPS");

    fn test_app() -> (Router, AppState) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = AppState::new(db, TOKEN.to_string());
        (create_router(state.clone()), state)
    }

    fn request(method: &str, uri: &str, actor: (&str, &str), body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-Pdm-Token", TOKEN)
            .header("X-Pdm-Actor-Email", actor.0)
            .header("X-Pdm-Actor-Role", actor.1);

        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn create(app: &Router) -> Value {
        let (status, body) = send(
            app,
            request(
                "POST",
                "/v1/tickets",
                PM,
                Some(json!({
                    "productName": "Sodium chloride",
                    "skuVariants": [{"type": "BULK"}],
                    "pricingData": {"listPrice": 42.0}
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    /// Drives a new ticket to IN_PROCESS with a base part number.
    async fn in_process(app: &Router) -> Value {
        let ticket = create(app).await;
        let id = ticket["id"].as_str().unwrap().to_string();

        let (status, _) = send(app, request("POST", &format!("/v1/tickets/{}/submit", id), PM, None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            app,
            request("POST", &format!("/v1/tickets/{}/status", id), OPS, Some(json!({"status": "IN_PROCESS"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app,
            request(
                "POST",
                &format!("/v1/tickets/{}/part-number", id),
                OPS,
                Some(json!({"baseNumber": "775-0001"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let (app, _) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/v1/tickets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mutations_require_actor_headers() {
        let (app, _) = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/tickets")
            .header("X-Pdm-Token", TOKEN)
            .header("content-type", "application/json")
            .body(Body::from(json!({"productName": "Urea"}).to_string()))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn create_and_fetch_ticket() {
        let (app, state) = test_app();
        let mut events = state.subscribe();
        let ticket = create(&app).await;

        assert_eq!(ticket["status"], "DRAFT");
        assert_eq!(ticket["version"], 1);
        assert!(matches!(events.try_recv(), Ok(crate::api::LiveEvent::TicketCreated { .. })));

        let id = ticket["id"].as_str().unwrap();
        let (status, fetched) = send(&app, request("GET", &format!("/v1/tickets/{}", id), PM, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["productName"], "Sodium chloride");

        let number = ticket["ticketNumber"].as_str().unwrap();
        let (status, by_number) =
            send(&app, request("GET", &format!("/v1/tickets/by-number/{}", number), PM, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_number["id"], ticket["id"]);
    }

    #[tokio::test]
    async fn list_rejects_unknown_status() {
        let (app, _) = test_app();
        create(&app).await;

        let (status, list) = send(&app, request("GET", "/v1/tickets?status=draft", PM, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, request("GET", "/v1/tickets?status=archived", PM, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn product_manager_cannot_change_status() {
        let (app, _) = test_app();
        let ticket = create(&app).await;
        let id = ticket["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/status", id), PM, Some(json!({"status": "CANCELED"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "PRECONDITION_FAILED");
    }

    #[tokio::test]
    async fn stale_version_is_rejected_before_guards() {
        let (app, _) = test_app();
        let ticket = create(&app).await;
        let id = ticket["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            request("PATCH", &format!("/v1/tickets/{}", id), PM, Some(json!({"productName": "NaCl", "version": 1}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/submit", id), PM, Some(json!({"version": 1}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
        assert_eq!(body["details"]["currentVersion"], 2);
    }

    #[tokio::test]
    async fn product_manager_locked_out_in_process() {
        let (app, _) = test_app();
        let ticket = in_process(&app).await;
        let id = ticket["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            request("PATCH", &format!("/v1/tickets/{}", id), PM, Some(json!({"productName": "Changed"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "PRECONDITION_FAILED");

        let (_, perms) = send(
            &app,
            request("GET", &format!("/v1/tickets/{}/permissions?mode=edit", id), PM, None),
        )
        .await;
        assert_eq!(perms["canEditTicket"], false);
        assert_eq!(perms["reminders"]["locked"], true);
        assert_eq!(perms["validTargets"], json!([]));
    }

    #[tokio::test]
    async fn permissions_for_ops_in_edit_mode() {
        let (app, _) = test_app();
        let ticket = in_process(&app).await;
        let id = ticket["id"].as_str().unwrap();

        let (status, perms) = send(
            &app,
            request("GET", &format!("/v1/tickets/{}/permissions?mode=edit", id), OPS, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(perms["canEditTicket"], true);
        assert_eq!(perms["canEditPricing"], true);
        assert_eq!(perms["canEditQuality"], true);
        assert_eq!(perms["sections"]["quality_attributes"], false);
        assert_eq!(perms["reminders"]["npdiFormAvailable"], true);

        let (_, perms) = send(
            &app,
            request("GET", &format!("/v1/tickets/{}/permissions?mode=sku_assignment", id), OPS, None),
        )
        .await;
        assert_eq!(perms["canEditPricing"], false);
        assert_eq!(perms["sections"]["sku_variants"], true);

        let (status, _) = send(
            &app,
            request("GET", &format!("/v1/tickets/{}/permissions?mode=bogus", id), OPS, None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn npdi_initiation_renames_ticket() {
        let (app, state) = test_app();
        let ticket = in_process(&app).await;
        let id = ticket["id"].as_str().unwrap().to_string();
        let old_number = ticket["ticketNumber"].as_str().unwrap().to_string();
        let mut events = state.subscribe();

        let (status, saved) = send(
            &app,
            request(
                "POST",
                &format!("/v1/tickets/{}/npdi", id),
                OPS,
                Some(json!({"trackingNumber": " 100000000000000778902025 "})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["status"], "NPDI_INITIATED");
        assert_eq!(saved["ticketNumber"], "100000000000000778902025");
        assert_eq!(saved["npdiTracking"]["trackingNumber"], "100000000000000778902025");

        let mut saw_rename = false;
        while let Ok(event) = events.try_recv() {
            if let crate::api::LiveEvent::NpdiInitiated { previous_ticket_number, .. } = event {
                assert_eq!(previous_ticket_number, old_number);
                saw_rename = true;
            }
        }
        assert!(saw_rename);

        let (status, _) =
            send(&app, request("GET", &format!("/v1/tickets/by-number/{}", old_number), OPS, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // A second initiation is refused
        let (status, body) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/npdi", id), OPS, Some(json!({"trackingNumber": "X-2"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "PRECONDITION_FAILED");

        let (_, history) = send(&app, request("GET", &format!("/v1/tickets/{}/history", id), OPS, None)).await;
        let last = history.as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["action"], "NPDI_INITIATED");
        assert_eq!(last["details"]["previousTicketNumber"], old_number);
    }

    #[tokio::test]
    async fn blank_tracking_number_is_validation_error() {
        let (app, _) = test_app();
        let ticket = in_process(&app).await;
        let id = ticket["id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/npdi", id), OPS, Some(json!({"trackingNumber": "   "}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (_, fetched) = send(&app, request("GET", &format!("/v1/tickets/{}", id), OPS, None)).await;
        assert_eq!(fetched["status"], "IN_PROCESS");
        assert_eq!(fetched["version"], ticket["version"]);
    }

    #[tokio::test]
    async fn completion_requires_confirmation() {
        let (app, _) = test_app();
        let ticket = in_process(&app).await;
        let id = ticket["id"].as_str().unwrap();

        send(
            &app,
            request("POST", &format!("/v1/tickets/{}/npdi", id), OPS, Some(json!({"trackingNumber": "NPDI-1"}))),
        )
        .await;

        let (status, _) = send(&app, request("POST", &format!("/v1/tickets/{}/complete", id), OPS, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, done) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/complete", id), OPS, Some(json!({"confirmed": true}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "COMPLETED");
    }

    #[tokio::test]
    async fn completed_npdi_ticket_stays_closed() {
        let (app, _) = test_app();
        let ticket = in_process(&app).await;
        let id = ticket["id"].as_str().unwrap();

        send(
            &app,
            request("POST", &format!("/v1/tickets/{}/npdi", id), OPS, Some(json!({"trackingNumber": "NPDI-1"}))),
        )
        .await;
        let (status, _) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/complete", id), OPS, Some(json!({"confirmed": true}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/status", id), OPS, Some(json!({"status": "IN_PROCESS"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "PRECONDITION_FAILED");

        let (status, body) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/npdi", id), OPS, Some(json!({"trackingNumber": "NPDI-2"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "PRECONDITION_FAILED");

        let (_, perms) = send(
            &app,
            request("GET", &format!("/v1/tickets/{}/permissions?mode=edit", id), OPS, None),
        )
        .await;
        assert_eq!(perms["validTargets"], json!([]));

        let (_, saved) = send(&app, request("GET", &format!("/v1/tickets/{}", id), OPS, None)).await;
        assert_eq!(saved["status"], "COMPLETED");
        assert_eq!(saved["ticketNumber"], "NPDI-1");
    }

    #[tokio::test]
    async fn detailed_health_reports_ticket_count() {
        let (app, _) = test_app();
        create(&app).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health/detailed").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["database"], "connected");
        assert_eq!(body["ticketCount"], 1);
    }

    #[tokio::test]
    async fn comments_round_trip() {
        let (app, _) = test_app();
        let ticket = create(&app).await;
        let id = ticket["id"].as_str().unwrap();

        let (status, comment) = send(
            &app,
            request("POST", &format!("/v1/tickets/{}/comments", id), OPS, Some(json!({"body": "Which grade?"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["authorRole"], "PM_OPS");

        let (_, comments) = send(&app, request("GET", &format!("/v1/tickets/{}/comments", id), PM, None)).await;
        assert_eq!(comments.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, request("GET", "/v1/tickets/missing/comments", PM, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
