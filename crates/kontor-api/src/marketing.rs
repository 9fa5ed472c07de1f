use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use kontor_db::models::{ChannelRow, PostRow, TopicRow};
use kontor_types::api::Claims;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: String,
}

// -- Channels --

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let channels: Vec<Value> = state
        .db
        .list_channels(&claims.sub)?
        .iter()
        .map(channel_json)
        .collect();
    Ok(Json(json!({ "channels": channels })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRequest {
    pub platform: String,
    pub url: String,
    pub api_credentials: Option<String>,
}

pub async fn add_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChannelRequest>,
) -> ApiResult<Json<Value>> {
    let platform = req.platform.trim();
    let url = req.url.trim();
    if platform.is_empty() || url.is_empty() {
        return Err(ApiError::bad_request("platform and url are required"));
    }

    let id = Uuid::new_v4().to_string();
    state
        .db
        .insert_channel(&id, &claims.sub, platform, url, req.api_credentials.as_deref())?;
    Ok(Json(json!({
        "channel": {
            "id": id,
            "platform": platform,
            "url": url,
            "apiCredentials": req.api_credentials,
        }
    })))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    state.db.delete_channel(&claims.sub, &query.id)?;
    Ok(Json(json!({ "success": true })))
}

// -- Topics --

pub async fn list_topics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let topics: Vec<Value> = state
        .db
        .list_topics(&claims.sub)?
        .iter()
        .map(topic_json)
        .collect();
    Ok(Json(json!({ "topics": topics })))
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub topic: String,
}

pub async fn add_topic(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TopicRequest>,
) -> ApiResult<Json<Value>> {
    let topic = req.topic.trim();
    if topic.is_empty() {
        return Err(ApiError::bad_request("topic is required"));
    }

    let id = Uuid::new_v4().to_string();
    state.db.insert_topic(&id, &claims.sub, topic)?;
    Ok(Json(json!({ "topic": { "id": id, "topic": topic } })))
}

pub async fn delete_topic(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    state.db.delete_topic(&claims.sub, &query.id)?;
    Ok(Json(json!({ "success": true })))
}

// -- Posts --

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let posts: Vec<Value> = state
        .db
        .list_posts(&claims.sub)?
        .iter()
        .map(post_json)
        .collect();
    Ok(Json(json!({ "posts": posts })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequest {
    pub content: String,
    pub channel_id: Option<String>,
    pub topic_id: Option<String>,
    pub scheduled_at: Option<String>,
}

pub async fn add_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostRequest>,
) -> ApiResult<Json<Value>> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("content is required"));
    }

    let id = Uuid::new_v4().to_string();
    state.db.insert_post(
        &id,
        &claims.sub,
        req.channel_id.as_deref(),
        req.topic_id.as_deref(),
        content,
        req.scheduled_at.as_deref(),
    )?;
    Ok(Json(json!({
        "post": {
            "id": id,
            "content": content,
            "channelId": req.channel_id,
            "topicId": req.topic_id,
            "scheduledAt": req.scheduled_at,
        }
    })))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    state.db.delete_post(&claims.sub, &query.id)?;
    Ok(Json(json!({ "success": true })))
}

fn channel_json(row: &ChannelRow) -> Value {
    json!({
        "id": row.id,
        "platform": row.platform,
        "url": row.url,
        "apiCredentials": row.api_credentials,
    })
}

fn topic_json(row: &TopicRow) -> Value {
    json!({ "id": row.id, "topic": row.topic })
}

fn post_json(row: &PostRow) -> Value {
    json!({
        "id": row.id,
        "content": row.content,
        "status": row.status,
        "channelId": row.channel_id,
        "topicId": row.topic_id,
        "scheduledAt": row.scheduled_at,
    })
}
