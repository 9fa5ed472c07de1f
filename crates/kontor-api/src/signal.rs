use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::warn;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub recipient: String,
    pub message: String,
}

/// Send a Signal message by shelling out to signal-cli. Upstream failures
/// (missing binary, unregistered number) surface as 400s with the tool's
/// own error text.
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Json<Value>> {
    let Some(sender) = &state.signal.sender_number else {
        return Err(ApiError::bad_request("Signal sender number is not configured"));
    };
    let recipient = req.recipient.trim();
    if recipient.is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::bad_request("recipient and message are required"));
    }

    let output = Command::new(&state.signal.cli_path)
        .arg("-a")
        .arg(sender)
        .arg("send")
        .arg("-m")
        .arg(&req.message)
        .arg(recipient)
        .output()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to run signal-cli: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("signal-cli failed: {}", stderr.trim());
        return Err(ApiError::bad_request(format!(
            "signal-cli failed: {}",
            stderr.trim()
        )));
    }

    Ok(Json(json!({ "success": true })))
}
