use anyhow::anyhow;
use axum::{Extension, Json, extract::State, http::HeaderMap};
use serde_json::{Value, json};
use tracing::info;

use kontor_types::api::Claims;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::require_admin;
use crate::stripe::verify_webhook;

/// Start a subscription checkout on the platform's own Stripe account.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let (Some(secret_key), Some(price_id)) =
        (state.stripe.secret_key.as_deref(), state.stripe.price_id.as_deref())
    else {
        return Err(ApiError::bad_request("Stripe is not configured"));
    };

    let params = [
        ("mode", "subscription"),
        ("client_reference_id", claims.sub.as_str()),
        ("success_url", state.stripe.success_url.as_str()),
        ("cancel_url", state.stripe.cancel_url.as_str()),
        ("line_items[0][price]", price_id),
        ("line_items[0][quantity]", "1"),
        ("subscription_data[metadata][user_id]", claims.sub.as_str()),
    ];
    let response = state
        .http
        .post("https://api.stripe.com/v1/checkout/sessions")
        .bearer_auth(secret_key)
        .form(&params)
        .send()
        .await
        .map_err(|e| ApiError::Internal(anyhow!("Checkout session request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Internal(anyhow!(
            "Checkout session creation returned {}: {}",
            status,
            body
        )));
    }

    let session: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Internal(anyhow!("Malformed checkout session reply: {}", e)))?;
    Ok(Json(json!({ "id": session["id"], "url": session["url"] })))
}

/// Subscription lifecycle events from the platform account.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<Value>> {
    let event = verify_webhook(&state, &headers, &body)?;

    let event_type = event["type"].as_str().unwrap_or_default();
    match event_type {
        "checkout.session.completed" => {
            if let Some(user_id) = event["data"]["object"]["client_reference_id"].as_str() {
                state.db.set_subscription_status(user_id, "active")?;
                info!("Subscription activated for user {}", user_id);
            }
        }
        "customer.subscription.deleted" => {
            if let Some(user_id) = event["data"]["object"]["metadata"]["user_id"].as_str() {
                state.db.set_subscription_status(user_id, "canceled")?;
                info!("Subscription canceled for user {}", user_id);
            }
        }
        "customer.subscription.updated" => {
            let object = &event["data"]["object"];
            let status = object["status"].as_str().unwrap_or_default();
            if matches!(status, "canceled" | "unpaid") {
                if let Some(user_id) = object["metadata"]["user_id"].as_str() {
                    state.db.set_subscription_status(user_id, "canceled")?;
                }
            }
        }
        other => {
            info!("Ignoring payment event type {}", other);
        }
    }

    Ok(Json(json!({ "status": "success" })))
}

/// Admin-only passthrough of the platform's Stripe customer list.
pub async fn customers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    require_admin(&claims)?;

    let Some(secret_key) = state.stripe.secret_key.as_deref() else {
        return Err(ApiError::bad_request("Stripe is not configured"));
    };

    let response = state
        .http
        .get("https://api.stripe.com/v1/customers?limit=100")
        .bearer_auth(secret_key)
        .send()
        .await
        .map_err(|e| ApiError::Internal(anyhow!("Customer list request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(ApiError::Internal(anyhow!(
            "Customer list returned {}",
            response.status()
        )));
    }

    let list: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Internal(anyhow!("Malformed customer list reply: {}", e)))?;
    Ok(Json(json!({ "customers": list["data"] })))
}
