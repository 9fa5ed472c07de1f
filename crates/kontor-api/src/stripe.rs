use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use kontor_db::models::TransactionRow;
use kontor_types::api::Claims;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub api_key: String,
}

/// Link a user's own Stripe account. The key is validated against the
/// Stripe API before it is stored.
pub async fn connect(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<Json<Value>> {
    let api_key = req.api_key.trim();
    if api_key.is_empty() {
        return Err(ApiError::bad_request("API key is required"));
    }

    let response = state
        .http
        .get("https://api.stripe.com/v1/account")
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|e| ApiError::Internal(anyhow!("Stripe account lookup failed: {}", e)))?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::bad_request("Invalid Stripe API key"));
    }
    if !response.status().is_success() {
        return Err(ApiError::Internal(anyhow!(
            "Stripe account lookup returned {}",
            response.status()
        )));
    }

    state.db.upsert_stripe_account(&claims.sub, api_key)?;
    info!("Stripe account connected for user {}", claims.sub);
    Ok(Json(json!({ "success": true })))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let connected = state
        .db
        .get_stripe_account(&claims.sub)?
        .is_some_and(|a| a.is_connected);
    Ok(Json(json!({ "connected": connected })))
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let connected = state
        .db
        .get_stripe_account(&claims.sub)?
        .is_some_and(|a| a.is_connected);
    if !connected {
        return Err(ApiError::bad_request("Stripe account not connected"));
    }

    let rows = state.db.list_transactions(
        &claims.sub,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )?;
    let transactions: Vec<Value> = rows.iter().map(transaction_json).collect();
    Ok(Json(json!({ "transactions": transactions })))
}

pub async fn claim_expense(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let row = state
        .db
        .mark_expense_claimed(&claims.sub, &transaction_id)?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;
    Ok(Json(json!({ "success": true, "transaction": transaction_json(&row) })))
}

/// Incoming charge events. Authenticated by the `Stripe-Signature` HMAC,
/// not by a JWT.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<Value>> {
    let event = verify_webhook(&state, &headers, &body)?;

    let event_type = event["type"].as_str().unwrap_or_default();
    match event_type {
        "charge.succeeded" => {
            let object = &event["data"]["object"];
            record_charge(&state, object)?;
        }
        "charge.refunded" => {
            info!("Charge refunded: {}", event["data"]["object"]["id"]);
        }
        other => {
            info!("Ignoring Stripe event type {}", other);
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// Parse `Stripe-Signature: t=...,v1=...` and check the HMAC-SHA256 of
/// `"{t}.{payload}"` against the configured webhook secret.
pub fn verify_webhook(state: &AppState, headers: &HeaderMap, payload: &str) -> ApiResult<Value> {
    let secret = state
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Webhook secret not configured"))?;

    let header = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Stripe-Signature header"))?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for item in header.split(',') {
        match item.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp =
        timestamp.ok_or_else(|| ApiError::bad_request("Malformed Stripe-Signature header"))?;
    if signatures.is_empty() {
        return Err(ApiError::bad_request("Malformed Stripe-Signature header"));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(anyhow!("HMAC init failed: {}", e)))?;
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());

    let verified = signatures.iter().any(|sig| {
        hex::decode(sig)
            .is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if !verified {
        warn!("Stripe webhook signature mismatch");
        return Err(ApiError::bad_request("Invalid webhook signature"));
    }

    serde_json::from_str(payload)
        .map_err(|_| ApiError::bad_request("Webhook payload is not valid JSON"))
}

fn record_charge(state: &AppState, object: &Value) -> ApiResult<()> {
    // Only charges tagged with one of our users are recorded
    let Some(user_id) = object["metadata"]["user_id"].as_str() else {
        info!("Charge without user_id metadata, skipping");
        return Ok(());
    };

    let amount = object["amount"].as_f64().unwrap_or(0.0) / 100.0;
    let currency = object["currency"]
        .as_str()
        .unwrap_or("eur")
        .to_uppercase();
    let description = object["description"].as_str().unwrap_or("Stripe charge");
    let stripe_id = object["id"].as_str();
    let date = object["created"]
        .as_i64()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y-%m-%d")
        .to_string();

    state.db.insert_transaction(
        &Uuid::new_v4().to_string(),
        user_id,
        stripe_id,
        &date,
        description,
        amount,
        &currency,
        None,
    )?;
    info!("Recorded charge {} for user {}", stripe_id.unwrap_or("?"), user_id);
    Ok(())
}

pub(crate) fn transaction_json(row: &TransactionRow) -> Value {
    json!({
        "id": row.id,
        "stripeId": row.stripe_id,
        "date": row.date,
        "description": row.description,
        "amount": row.amount,
        "currency": row.currency,
        "status": row.status,
        "taxAmount": row.tax_amount,
        "isExpenseClaimed": row.is_expense_claimed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, payload: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn state_with_secret(secret: &str) -> AppState {
        use crate::{AppStateInner, SignalConfig, StripeConfig};
        use kontor_check::{CounterpartyChecker, FixtureRegistry};
        use kontor_model::ModelRouter;
        use std::sync::Arc;

        Arc::new(AppStateInner {
            db: kontor_db::Database::open_in_memory().unwrap(),
            jwt_secret: "test".into(),
            admin_email: None,
            router: ModelRouter::new(),
            checker: CounterpartyChecker::new(Arc::new(FixtureRegistry)),
            http: reqwest::Client::new(),
            stripe: StripeConfig {
                secret_key: None,
                webhook_secret: Some(secret.to_string()),
                price_id: None,
                success_url: String::new(),
                cancel_url: String::new(),
            },
            livekit: None,
            signal: SignalConfig {
                cli_path: "signal-cli".into(),
                sender_number: None,
            },
        })
    }

    #[test]
    fn valid_signature_is_accepted() {
        let state = state_with_secret("whsec_test");
        let payload = r#"{"type":"charge.succeeded"}"#;
        let signature = sign("whsec_test", "1700000000", payload);

        let mut headers = HeaderMap::new();
        headers.insert(
            "Stripe-Signature",
            format!("t=1700000000,v1={}", signature).parse().unwrap(),
        );

        let event = verify_webhook(&state, &headers, payload).unwrap();
        assert_eq!(event["type"], "charge.succeeded");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let state = state_with_secret("whsec_test");
        let signature = sign("whsec_test", "1700000000", r#"{"type":"charge.succeeded"}"#);

        let mut headers = HeaderMap::new();
        headers.insert(
            "Stripe-Signature",
            format!("t=1700000000,v1={}", signature).parse().unwrap(),
        );

        let result = verify_webhook(&state, &headers, r#"{"type":"charge.refunded"}"#);
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn missing_header_is_rejected() {
        let state = state_with_secret("whsec_test");
        let result = verify_webhook(&state, &HeaderMap::new(), "{}");
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
