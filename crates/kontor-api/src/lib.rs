pub mod auth;
pub mod chat;
pub mod elster;
pub mod error;
pub mod history;
pub mod livekit;
pub mod marketing;
pub mod middleware;
pub mod partner_check;
pub mod payments;
pub mod profile;
pub mod signal;
pub mod stripe;

use std::sync::Arc;

use axum::{
    Json, Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use serde_json::json;

use kontor_check::CounterpartyChecker;
use kontor_db::Database;
use kontor_model::ModelRouter;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Registrations with this email get the admin role.
    pub admin_email: Option<String>,
    pub router: ModelRouter,
    pub checker: CounterpartyChecker,
    pub http: reqwest::Client,
    pub stripe: StripeConfig,
    pub livekit: Option<LiveKitConfig>,
    pub signal: SignalConfig,
}

/// Platform-level Stripe settings (our own account, for subscriptions).
/// Distinct from the per-user API keys stored via /api/stripe/connect.
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub price_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

pub struct LiveKitConfig {
    pub api_key: String,
    pub api_secret: String,
    pub url: Option<String>,
}

pub struct SignalConfig {
    pub cli_path: String,
    pub sender_number: Option<String>,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Full REST surface. Webhooks stay public (Stripe authenticates them via
/// signature, not via our JWTs).
pub fn api_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/health", get(health))
        .route("/api/stripe/webhook", post(stripe::webhook))
        .route("/api/payments/webhook", post(payments::webhook))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/{module}/chat", post(chat::module_chat))
        .route("/api/partner_check/check", post(partner_check::check))
        .route("/api/history/threads", get(history::list_threads))
        .route("/api/history/threads/{module}", get(history::module_history))
        .route("/api/profile", get(profile::get_profile).post(profile::save_profile))
        .route("/api/stripe/connect", post(stripe::connect))
        .route("/api/stripe/status", get(stripe::status))
        .route("/api/stripe/transactions", get(stripe::transactions))
        .route(
            "/api/stripe/transactions/{id}/claim-expense",
            post(stripe::claim_expense),
        )
        .route(
            "/api/payments/create-checkout-session",
            post(payments::create_checkout_session),
        )
        .route("/api/payments/customers", get(payments::customers))
        .route("/api/elster/connect", post(elster::connect))
        .route("/api/elster/status", get(elster::status))
        .route("/api/elster/submissions", get(elster::list_submissions))
        .route("/api/elster/submissions/{id}", get(elster::get_submission))
        .route("/api/elster/submit", post(elster::submit))
        .route(
            "/api/elster/frequency",
            get(elster::get_frequency).put(elster::set_frequency),
        )
        .route(
            "/api/marketing/channels",
            get(marketing::list_channels)
                .post(marketing::add_channel)
                .delete(marketing::delete_channel),
        )
        .route(
            "/api/marketing/topics",
            get(marketing::list_topics)
                .post(marketing::add_topic)
                .delete(marketing::delete_topic),
        )
        .route(
            "/api/marketing/posts",
            get(marketing::list_posts)
                .post(marketing::add_post)
                .delete(marketing::delete_post),
        )
        .route("/api/livekit/rooms", post(livekit::create_room))
        .route("/api/signal/send", post(signal::send_message))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use kontor_check::FixtureRegistry;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        Arc::new(AppStateInner {
            db,
            jwt_secret: "test-secret".into(),
            admin_email: Some("admin@kontor.test".into()),
            router: ModelRouter::new(),
            checker: CounterpartyChecker::new(Arc::new(FixtureRegistry)),
            http: reqwest::Client::new(),
            stripe: StripeConfig {
                secret_key: None,
                webhook_secret: None,
                price_id: None,
                success_url: "http://localhost/success".into(),
                cancel_url: "http://localhost/cancel".into(),
            },
            livekit: None,
            signal: SignalConfig {
                cli_path: "signal-cli".into(),
                sender_number: None,
            },
        })
    }

    async fn request(
        app: &Router,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn post_json(
        app: &Router,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let (status, bytes) = request(app, "POST", path, token, Some(body)).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get_json(app: &Router, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let (status, bytes) = request(app, "GET", path, token, None).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register_and_login(app: &Router, email: &str) -> String {
        let (status, body) = post_json(
            app,
            "/api/auth/register",
            None,
            serde_json::json!({ "email": email, "password": "secret123" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn register_then_login_roundtrip() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;
        assert!(!token.is_empty());

        let (status, body) = post_json(
            &app,
            "/api/auth/login",
            None,
            serde_json::json!({ "email": "mia@example.com", "password": "secret123" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "mia@example.com");
        assert_eq!(body["user"]["role"], "user");
        assert!(body["token"].as_str().unwrap().contains('.'));
    }

    #[tokio::test]
    async fn wrong_password_is_401_with_error_envelope() {
        let app = api_router(test_state());
        register_and_login(&app, "mia@example.com").await;

        let (status, body) = post_json(
            &app,
            "/api/auth/login",
            None,
            serde_json::json!({ "email": "mia@example.com", "password": "wrong" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], 401);
        assert!(body["error"]["message"].as_str().unwrap().len() > 0);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let app = api_router(test_state());
        register_and_login(&app, "mia@example.com").await;

        let (status, body) = post_json(
            &app,
            "/api/auth/register",
            None,
            serde_json::json!({ "email": "Mia@Example.com", "password": "other456" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 400);
    }

    #[tokio::test]
    async fn admin_email_gets_admin_role() {
        let app = api_router(test_state());
        let (status, body) = post_json(
            &app,
            "/api/auth/register",
            None,
            serde_json::json!({ "email": "admin@kontor.test", "password": "secret123" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let app = api_router(test_state());
        let (status, body) = get_json(&app, "/api/history/threads", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], 401);
    }

    #[tokio::test]
    async fn chat_streams_reply_and_persists_both_messages() {
        let state = test_state();
        let app = api_router(state.clone());
        let token = register_and_login(&app, "mia@example.com").await;

        // No providers configured, so the canned fallback comes back.
        let (status, bytes) = request(
            &app,
            "POST",
            "/api/accounting/chat",
            Some(&token),
            Some(serde_json::json!({ "message": "Wie hoch ist die Umsatzsteuer?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.trim(), kontor_model::FALLBACK_REPLY);

        let user = state.db.get_user_by_email("mia@example.com").unwrap().unwrap();
        let thread = state.db.latest_thread(&user.id, "accounting").unwrap().unwrap();
        let messages = state.db.get_thread_messages(&thread.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "ai");
        let metadata: Value =
            serde_json::from_str(messages[1].metadata.as_deref().unwrap()).unwrap();
        assert_eq!(metadata["model"], "fallback");
    }

    #[tokio::test]
    async fn chat_rejects_unknown_module_and_empty_message() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, body) = post_json(
            &app,
            "/api/payroll/chat",
            Some(&token),
            serde_json::json!({ "message": "hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 400);

        let (status, _) = post_json(
            &app,
            "/api/accounting/chat",
            Some(&token),
            serde_json::json!({ "message": "   " }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn partner_check_endpoint_returns_verdict() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, body) = post_json(
            &app,
            "/api/partner_check/check",
            Some(&token),
            serde_json::json!({ "name": "Tset GmbH", "vat_id": "DE123456789" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_status"], "verified");
        assert_eq!(body["official_name"], "Test GmbH");
        assert_eq!(body["checks"]["vat_validation"]["valid"], true);
    }

    #[tokio::test]
    async fn history_covers_chat_turns() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, body) = get_json(&app, "/api/history/threads/accounting", Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

        request(
            &app,
            "POST",
            "/api/accounting/chat",
            Some(&token),
            Some(serde_json::json!({ "message": "Hallo" })),
        )
        .await;

        let (status, body) = get_json(&app, "/api/history/threads/accounting", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["content"], "Hallo");

        let (status, body) = get_json(&app, "/api/history/threads", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threads"].as_array().unwrap().len(), 1);
        assert_eq!(body["threads"][0]["module"], "accounting");
    }

    #[tokio::test]
    async fn profile_roundtrip() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, _) = get_json(&app, "/api/profile", Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = post_json(
            &app,
            "/api/profile",
            Some(&token),
            serde_json::json!({
                "companyName": "Mia Consulting",
                "vatId": "DE123456789",
                "address": "Hauptstr. 1, Berlin",
                "country": "Germany"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (status, body) = get_json(&app, "/api/profile", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["companyName"], "Mia Consulting");
    }

    #[tokio::test]
    async fn elster_submit_requires_connected_account() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, body) = post_json(
            &app,
            "/api/elster/submit",
            Some(&token),
            serde_json::json!({ "period": "Q1 2025", "transactionIds": [] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 400);
    }

    #[tokio::test]
    async fn elster_connect_and_submit_flow() {
        let state = test_state();
        let app = api_router(state.clone());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, _) = post_json(
            &app,
            "/api/elster/connect",
            Some(&token),
            serde_json::json!({ "taxId": "12345678901" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let user = state.db.get_user_by_email("mia@example.com").unwrap().unwrap();
        let tx_id = uuid::Uuid::new_v4().to_string();
        state
            .db
            .insert_transaction(&tx_id, &user.id, None, "2025-02-01", "Invoice 7", 119.0, "EUR", Some(19.0))
            .unwrap();

        let (status, body) = post_json(
            &app,
            "/api/elster/submit",
            Some(&token),
            serde_json::json!({ "period": "Q1 2025", "transactionIds": [tx_id] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["submission"]["period"], "Q1 2025");
        assert_eq!(body["submission"]["status"], "processing");
        assert!(body["transferTicket"].as_str().unwrap().len() > 0);

        // Second submission for the same period is refused
        let (status, _) = post_json(
            &app,
            "/api/elster/submit",
            Some(&token),
            serde_json::json!({ "period": "Q1 2025", "transactionIds": [] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn marketing_channel_crud() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, body) = post_json(
            &app,
            "/api/marketing/channels",
            Some(&token),
            serde_json::json!({ "platform": "linkedin", "url": "https://linkedin.com/company/mia" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let channel_id = body["channel"]["id"].as_str().unwrap().to_string();

        let (_, body) = get_json(&app, "/api/marketing/channels", Some(&token)).await;
        assert_eq!(body["channels"].as_array().unwrap().len(), 1);

        let (status, _) = request(
            &app,
            "DELETE",
            &format!("/api/marketing/channels?id={}", channel_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&app, "/api/marketing/channels", Some(&token)).await;
        assert!(body["channels"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn claiming_unknown_expense_is_404() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, body) = post_json(
            &app,
            "/api/stripe/transactions/nope/claim-expense",
            Some(&token),
            serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 404);
    }

    #[tokio::test]
    async fn payments_customers_is_admin_only() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, body) = get_json(&app, "/api/payments/customers", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], 403);
    }

    #[tokio::test]
    async fn livekit_unconfigured_is_400() {
        let app = api_router(test_state());
        let token = register_and_login(&app, "mia@example.com").await;

        let (status, _) = post_json(
            &app,
            "/api/livekit/rooms",
            Some(&token),
            serde_json::json!({ "room_name": "standup" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = api_router(test_state());
        let (status, body) = get_json(&app, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
