use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
};
use serde_json::json;
use tracing::debug;

use kontor_model::RouterReply;
use kontor_types::Module;
use kontor_types::api::{ChatRequest, Claims};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::partner_check;

/// How many prior messages feed the prompt.
const CONTEXT_WINDOW: u32 = 10;
/// Per-word delay of the simulated token stream.
const STREAM_DELAY_MS: u64 = 30;

/// One chat turn: persist the user message, generate a reply over the
/// module's provider chain, persist the reply, stream it back word by word
/// as plain text.
pub async fn module_chat(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Response> {
    let module = Module::from_name(&module)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown module: {}", module)))?;
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message must not be empty"));
    }

    let user_id = claims.sub.clone();
    let thread_state = state.clone();
    let user_message = message.clone();
    let (thread_id, context) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let thread = thread_state
            .db
            .get_or_create_thread(&user_id, module.as_str())?;
        let context: Vec<(String, String)> = thread_state
            .db
            .get_recent_messages(&thread.id, CONTEXT_WINDOW)?
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect();
        thread_state
            .db
            .append_message(&thread.id, "user", &user_message, None)?;
        Ok((thread.id, context))
    })
    .await
    .map_err(anyhow::Error::from)??;

    let reply = if module == Module::PartnerCheck {
        // Compliance answers come from the local check pipeline, not an LLM
        partner_check::chat_reply(&state, &claims.sub, &message)?
    } else {
        state
            .router
            .respond(module, &message, &context, req.model_type.as_deref())
            .await
    };
    debug!("Module {} replied via {}", module, reply.model);

    let metadata = reply_metadata(&reply);
    let append_state = state.clone();
    let reply_text = reply.text.clone();
    let append_thread = thread_id.clone();
    tokio::task::spawn_blocking(move || {
        append_state
            .db
            .append_message(&append_thread, "ai", &reply_text, Some(&metadata))
    })
    .await
    .map_err(anyhow::Error::from)??;

    Ok(stream_words(reply.text)?)
}

fn reply_metadata(reply: &RouterReply) -> String {
    let mut map = serde_json::Map::new();
    map.insert("model".into(), json!(reply.model));
    if let Some(serde_json::Value::Object(extra)) = &reply.metadata {
        for (k, v) in extra {
            map.insert(k.clone(), v.clone());
        }
    }
    serde_json::Value::Object(map).to_string()
}

/// Word-by-word plain-text stream with an artificial typing delay.
fn stream_words(text: String) -> anyhow::Result<Response> {
    let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    let stream = async_stream::stream! {
        for (i, word) in words.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(STREAM_DELAY_MS)).await;
            }
            yield Ok::<_, Infallible>(format!("{} ", word));
        }
    };

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))?;
    Ok(response)
}
