use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde_json::json;

use kontor_db::models::{MessageRow, ThreadRow};
use kontor_types::Module;
use kontor_types::api::{Claims, MessageView, ThreadHistory, ThreadSummary};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn list_threads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let threads = state.db.list_threads(&claims.sub)?;
    let summaries: Vec<ThreadSummary> = threads.into_iter().map(summary).collect();
    Ok(Json(json!({ "threads": summaries })))
}

/// Conversation transcript for the user's current thread in one module,
/// oldest message first.
pub async fn module_history(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ThreadHistory>> {
    let module = Module::from_name(&module)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown module: {}", module)))?;

    let thread = state
        .db
        .latest_thread(&claims.sub, module.as_str())?
        .ok_or_else(|| ApiError::not_found("No conversation found for this module"))?;
    let messages = state
        .db
        .get_thread_messages(&thread.id)?
        .into_iter()
        .map(view)
        .collect();

    Ok(Json(ThreadHistory {
        thread: summary(thread),
        messages,
    }))
}

fn summary(thread: ThreadRow) -> ThreadSummary {
    ThreadSummary {
        id: thread.id,
        module: thread.module,
        created_at: thread.created_at,
        updated_at: thread.updated_at,
    }
}

fn view(message: MessageRow) -> MessageView {
    // Metadata is stored as a JSON string; unparseable blobs are dropped
    // rather than failing the whole transcript.
    let metadata = message
        .metadata
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok());
    MessageView {
        id: message.id,
        role: message.role,
        content: message.content,
        metadata,
        created_at: message.created_at,
    }
}
