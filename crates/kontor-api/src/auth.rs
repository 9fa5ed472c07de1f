use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use kontor_types::api::{AuthResponse, AuthUser, Claims, LoginRequest, RegisterRequest};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

const TOKEN_LIFETIME_MINUTES: i64 = 60;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    if req.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }

    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::bad_request("Email address already registered"));
    }

    // Argon2id with a per-user salt
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow!("Password hashing failed: {}", e)))?
        .to_string();

    let role = if state.admin_email.as_deref() == Some(email.as_str()) {
        "admin"
    } else {
        "user"
    };
    let user_id = Uuid::new_v4().to_string();
    state.db.create_user(&user_id, &email, &password_hash, role)?;
    info!("Registered user {} ({})", email, role);

    let token = create_token(&state.jwt_secret, &user_id, role)?;
    Ok(Json(AuthResponse {
        token,
        user: AuthUser {
            id: user_id,
            email,
            role: role.to_string(),
            last_login: None,
        },
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();

    // Same message for unknown email and bad password
    let user = state
        .db
        .get_user_by_email(&email)?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| ApiError::Internal(anyhow!("Stored hash unreadable: {}", e)))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::unauthorized("Invalid email or password"))?;

    state.db.touch_last_login(&user.id)?;
    let fresh = state
        .db
        .get_user_by_id(&user.id)?
        .ok_or_else(|| ApiError::Internal(anyhow!("User vanished during login")))?;

    let token = create_token(&state.jwt_secret, &user.id, &user.role)?;
    Ok(Json(AuthResponse {
        token,
        user: AuthUser {
            id: fresh.id,
            email: fresh.email,
            role: fresh.role,
            last_login: fresh.last_login_at,
        },
    }))
}

fn create_token(secret: &str, user_id: &str, role: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::minutes(TOKEN_LIFETIME_MINUTES)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
