use axum::{Extension, Json, extract::State};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use kontor_types::api::Claims;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

const TOKEN_LIFETIME_SECS: usize = 6 * 3600;

#[derive(Debug, Deserialize)]
pub struct RoomRequest {
    pub room_name: String,
    pub identity: Option<String>,
}

#[derive(Debug, Serialize)]
struct VideoGrant {
    room: String,
    #[serde(rename = "roomJoin")]
    room_join: bool,
}

/// LiveKit access tokens are HS256 JWTs with the API key as issuer and a
/// room-scoped video grant.
#[derive(Debug, Serialize)]
struct LiveKitClaims {
    iss: String,
    sub: String,
    exp: usize,
    nbf: usize,
    video: VideoGrant,
}

pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RoomRequest>,
) -> ApiResult<Json<Value>> {
    let Some(config) = &state.livekit else {
        return Err(ApiError::bad_request("LiveKit is not configured"));
    };
    let room = req.room_name.trim().to_string();
    if room.is_empty() {
        return Err(ApiError::bad_request("Room name is required"));
    }
    let identity = req.identity.unwrap_or_else(|| claims.sub.clone());

    let now = chrono::Utc::now().timestamp() as usize;
    let token_claims = LiveKitClaims {
        iss: config.api_key.clone(),
        sub: identity.clone(),
        exp: now + TOKEN_LIFETIME_SECS,
        nbf: now.saturating_sub(10),
        video: VideoGrant {
            room: room.clone(),
            room_join: true,
        },
    };
    let token = encode(
        &Header::default(),
        &token_claims,
        &EncodingKey::from_secret(config.api_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("LiveKit token signing failed: {}", e)))?;

    Ok(Json(json!({
        "room": room,
        "identity": identity,
        "token": token,
        "url": config.url,
    })))
}
