use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use kontor_db::models::{SubmissionRow, TransactionRow};
use kontor_types::api::Claims;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub tax_id: String,
    pub form_data: Option<FormData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub full_name: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub bank_name: Option<String>,
    pub iban: Option<String>,
}

pub async fn connect(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<Json<Value>> {
    let tax_id = req.tax_id.trim();
    // German Steuer-Identifikationsnummer: exactly 11 digits
    if tax_id.len() != 11 || !tax_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("Tax ID must be exactly 11 digits"));
    }

    let form = req.form_data.unwrap_or(FormData {
        full_name: None,
        street_address: None,
        city: None,
        postal_code: None,
        bank_name: None,
        iban: None,
    });
    state.db.upsert_elster_account(
        &claims.sub,
        tax_id,
        form.full_name.as_deref(),
        form.street_address.as_deref(),
        form.city.as_deref(),
        form.postal_code.as_deref(),
        form.bank_name.as_deref(),
        form.iban.as_deref(),
    )?;
    info!("ELSTER account connected for user {}", claims.sub);
    Ok(Json(json!({ "success": true })))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    match state.db.get_elster_account(&claims.sub)? {
        Some(account) if account.is_connected => Ok(Json(json!({
            "connected": true,
            "frequency": account.frequency,
        }))),
        _ => Ok(Json(json!({ "connected": false }))),
    }
}

pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let rows = state.db.list_submissions(&claims.sub)?;
    let submissions: Vec<Value> = rows
        .iter()
        .map(|(sub, tx_ids)| submission_json(sub, tx_ids))
        .collect();
    Ok(Json(json!({ "submissions": submissions })))
}

pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let (sub, tx_ids) = state
        .db
        .get_submission(&claims.sub, &id)?
        .ok_or_else(|| ApiError::not_found("Submission not found"))?;
    Ok(Json(json!({ "submission": submission_json(&sub, &tx_ids) })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub period: String,
    pub transaction_ids: Vec<String>,
}

/// Prepare and file a VAT declaration for one period. One submission per
/// period; the schema enforces it and we pre-check for a friendlier error.
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<Json<Value>> {
    let period = req.period.trim();
    if period.is_empty() {
        return Err(ApiError::bad_request("Period is required"));
    }

    let account = state
        .db
        .get_elster_account(&claims.sub)?
        .filter(|a| a.is_connected)
        .ok_or_else(|| ApiError::bad_request("ELSTER account not connected"))?;

    if state.db.find_submission_by_period(&claims.sub, period)?.is_some() {
        return Err(ApiError::bad_request(
            "A submission for this period already exists",
        ));
    }

    let transactions = state
        .db
        .get_transactions_by_ids(&claims.sub, &req.transaction_ids)?;
    if transactions.len() != req.transaction_ids.len() {
        return Err(ApiError::bad_request(
            "One or more transaction ids are unknown",
        ));
    }

    let declaration = prepare_vat_declaration(&account.tax_id, period, &transactions);
    let transfer_ticket = file_declaration(&declaration);
    info!(
        "Filed VAT declaration for user {} period {} (ticket {})",
        claims.sub, period, transfer_ticket
    );

    let submission = state.db.create_submission(
        &Uuid::new_v4().to_string(),
        &claims.sub,
        period,
        "processing",
        &req.transaction_ids,
    )?;

    Ok(Json(json!({
        "submission": submission_json(&submission, &req.transaction_ids),
        "declaration": declaration,
        "transferTicket": transfer_ticket,
    })))
}

pub async fn get_frequency(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let frequency = state
        .db
        .get_elster_account(&claims.sub)?
        .map(|a| a.frequency)
        .unwrap_or_else(|| "quarterly".to_string());
    Ok(Json(json!({ "frequency": frequency })))
}

#[derive(Debug, Deserialize)]
pub struct FrequencyRequest {
    pub frequency: String,
}

pub async fn set_frequency(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FrequencyRequest>,
) -> ApiResult<Json<Value>> {
    if !matches!(req.frequency.as_str(), "quarterly" | "annually") {
        return Err(ApiError::bad_request(
            "Frequency must be 'quarterly' or 'annually'",
        ));
    }
    if !state.db.set_elster_frequency(&claims.sub, &req.frequency)? {
        return Err(ApiError::bad_request("ELSTER account not connected"));
    }
    Ok(Json(json!({ "frequency": req.frequency })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VatDeclaration {
    pub tax_id: String,
    pub period: String,
    pub total_revenue: f64,
    pub output_tax: f64,
    pub deductible_input_tax: f64,
    pub payable_amount: f64,
}

/// Aggregate the period's transactions into declaration figures. Income
/// contributes output tax; claimed expenses contribute deductible input
/// tax.
fn prepare_vat_declaration(
    tax_id: &str,
    period: &str,
    transactions: &[TransactionRow],
) -> VatDeclaration {
    let mut total_revenue = 0.0;
    let mut output_tax = 0.0;
    let mut deductible_input_tax = 0.0;

    for tx in transactions {
        let tax = tx.tax_amount.unwrap_or(0.0);
        if tx.amount >= 0.0 {
            total_revenue += tx.amount;
            output_tax += tax;
        } else if tx.is_expense_claimed {
            deductible_input_tax += tax.abs();
        }
    }

    VatDeclaration {
        tax_id: tax_id.to_string(),
        period: period.to_string(),
        total_revenue: round2(total_revenue),
        output_tax: round2(output_tax),
        deductible_input_tax: round2(deductible_input_tax),
        payable_amount: round2(output_tax - deductible_input_tax),
    }
}

/// Hand the declaration to the tax authority. Stands in for a real ERIC
/// binding; returns the transfer ticket the authority would issue.
fn file_declaration(declaration: &VatDeclaration) -> String {
    format!(
        "et-{}-{}",
        declaration.period.replace(char::is_whitespace, ""),
        Uuid::new_v4().simple()
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn submission_json(submission: &SubmissionRow, transaction_ids: &[String]) -> Value {
    json!({
        "id": submission.id,
        "period": submission.period,
        "status": submission.status,
        "timestamp": submission.timestamp,
        "transactionIds": transaction_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(amount: f64, tax: Option<f64>, claimed: bool) -> TransactionRow {
        TransactionRow {
            id: Uuid::new_v4().to_string(),
            user_id: "u".into(),
            stripe_id: None,
            date: "2025-02-01".into(),
            description: "test".into(),
            amount,
            currency: "EUR".into(),
            status: "completed".into(),
            tax_amount: tax,
            is_expense_claimed: claimed,
        }
    }

    #[test]
    fn declaration_sums_output_and_input_tax() {
        let transactions = vec![
            tx(119.0, Some(19.0), false),
            tx(238.0, Some(38.0), false),
            tx(-59.5, Some(-9.5), true),
            tx(-100.0, Some(-16.0), false), // unclaimed expense is ignored
        ];
        let decl = prepare_vat_declaration("12345678901", "Q1 2025", &transactions);
        assert_eq!(decl.total_revenue, 357.0);
        assert_eq!(decl.output_tax, 57.0);
        assert_eq!(decl.deductible_input_tax, 9.5);
        assert_eq!(decl.payable_amount, 47.5);
    }

    #[test]
    fn empty_period_yields_zero_declaration() {
        let decl = prepare_vat_declaration("12345678901", "Q3 2025", &[]);
        assert_eq!(decl.payable_amount, 0.0);
    }

    #[test]
    fn transfer_ticket_embeds_period() {
        let decl = prepare_vat_declaration("12345678901", "Q1 2025", &[]);
        let ticket = file_declaration(&decl);
        assert!(ticket.starts_with("et-Q12025-"));
    }
}
