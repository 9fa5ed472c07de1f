use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};

use kontor_db::models::ProfileRow;
use kontor_types::api::Claims;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub company_name: String,
    pub vat_id: String,
    pub address: String,
    pub country: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub company_name: String,
    pub vat_id: String,
    pub address: String,
    pub country: String,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state
        .db
        .get_profile(&claims.sub)?
        .ok_or_else(|| ApiError::not_found("No profile found"))?;
    Ok(Json(response(profile)))
}

pub async fn save_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let fields = [
        req.company_name.trim(),
        req.vat_id.trim(),
        req.address.trim(),
        req.country.trim(),
    ];
    if fields.iter().any(|f| f.is_empty()) {
        return Err(ApiError::bad_request(
            "companyName, vatId, address and country are all required",
        ));
    }

    let profile = state
        .db
        .upsert_profile(&claims.sub, fields[0], fields[1], fields[2], fields[3])?;
    Ok(Json(response(profile)))
}

fn response(profile: ProfileRow) -> ProfileResponse {
    ProfileResponse {
        company_name: profile.company_name,
        vat_id: profile.vat_id,
        address: profile.address,
        country: profile.country,
    }
}
