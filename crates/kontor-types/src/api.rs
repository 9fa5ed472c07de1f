use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// JWT claims shared between the auth endpoints (encoding) and the REST
/// middleware (decoding). Canonical definition lives here in kontor-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: String,
    #[serde(rename = "lastLogin", skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AuthUser,
}

// -- Chat --

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Optional provider override ("gemini" or "openai").
    pub model_type: Option<String>,
}

// -- Chat history --

#[derive(Debug, Serialize)]
pub struct ThreadSummary {
    pub id: String,
    pub module: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: String,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadHistory {
    pub thread: ThreadSummary,
    pub messages: Vec<MessageView>,
}
