use std::fmt::Write as _;
use std::sync::LazyLock;

use axum::{Extension, Json, extract::State};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use kontor_check::{CheckerProfile, OverallStatus, Verdict};
use kontor_model::RouterReply;
use kontor_types::api::Claims;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub name: Option<String>,
    pub vat_id: Option<String>,
    pub country_code: Option<String>,
}

/// Structured counterparty check. The same pipeline backs the module's
/// chat endpoint via [`chat_reply`].
pub async fn check(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CheckRequest>,
) -> ApiResult<Json<Verdict>> {
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("Company name is required"))?;

    let profile = checker_profile(&state, &claims.sub)?;
    let verdict = state.checker.check(
        name,
        req.vat_id.as_deref().map(str::trim).filter(|v| !v.is_empty()),
        req.country_code.as_deref(),
        profile,
    );
    Ok(Json(verdict))
}

/// Chat-facing entry: pull company name and VAT id out of free text, run
/// the check, render a German markdown report. When nothing extractable is
/// found, reply with usage guidance instead of a verdict.
pub fn chat_reply(state: &AppState, user_id: &str, message: &str) -> ApiResult<RouterReply> {
    let (name, vat_id) = extract_company_info(message);
    let Some(name) = name else {
        return Ok(RouterReply {
            text: HELP_TEXT.to_string(),
            model: "partner-check".to_string(),
            metadata: None,
        });
    };

    let profile = checker_profile(state, user_id)?;
    let verdict = state.checker.check(&name, vat_id.as_deref(), None, profile);
    let text = format_check_result(&verdict);
    Ok(RouterReply {
        text,
        model: "partner-check".to_string(),
        metadata: Some(json!({ "overall_status": verdict.overall_status })),
    })
}

fn checker_profile(state: &AppState, user_id: &str) -> ApiResult<Option<CheckerProfile>> {
    let profile = state.db.get_profile(user_id)?.map(|p| CheckerProfile {
        company_name: p.company_name,
        vat_id: p.vat_id,
        country: p.country,
        address: p.address,
    });
    Ok(profile)
}

const HELP_TEXT: &str = "Ich konnte keinen Firmennamen in Ihrer Nachricht erkennen. \
Bitte nennen Sie den Namen des Geschäftspartners, z.B. \"Prüfe die Beispiel GmbH\" \
oder geben Sie zusätzlich die USt-IdNr. an (z.B. DE123456789).";

// The tail must be digits; allowing letters there makes any long
// capitalized word look like a VAT id.
static VAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z]{2}[0-9]{7,12})\b").expect("static pattern"));
// Name heuristics work on runs of capitalized words so that surrounding
// prose ("Bitte prüfe die ...") stays out of the capture.
static LABELED_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[Ff]irma|[Uu]nternehmen|[Cc]ompany|[Pp]artner)\s*:?\s+((?:[A-ZÄÖÜ][\w&.\-]*\s*){1,6})")
        .expect("static pattern")
});
static SUFFIX_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:[A-ZÄÖÜ][\w&.\-]*\s+){1,5}(?:GmbH|AG|SE|KG|OHG|UG|Ltd|Inc|SARL))\b")
        .expect("static pattern")
});

/// Best-effort extraction of (company name, VAT id) from chat text.
fn extract_company_info(message: &str) -> (Option<String>, Option<String>) {
    let vat_id = VAT_RE.captures(message).map(|c| c[1].to_uppercase());

    let name = LABELED_NAME_RE
        .captures(message)
        .or_else(|| SUFFIX_NAME_RE.captures(message))
        .map(|c| c[1].trim().to_string())
        .or_else(|| {
            // A short message that starts with a capital is probably just
            // the company name itself.
            let trimmed = message.trim();
            let is_short = trimmed.split_whitespace().count() <= 5;
            let starts_upper = trimmed.chars().next().is_some_and(char::is_uppercase);
            (is_short && starts_upper && VAT_RE.find(trimmed).is_none_or(|m| m.as_str() != trimmed))
                .then(|| trimmed.to_string())
        });

    (name, vat_id)
}

fn status_line(status: OverallStatus) -> &'static str {
    match status {
        OverallStatus::Verified => "✅ Verifiziert",
        OverallStatus::Warning => "⚠️ Warnung",
        OverallStatus::Sanctioned => "❌ Sanktioniert",
        OverallStatus::Unknown => "ℹ️ Unbekannt",
    }
}

/// German markdown report over a verdict, shown verbatim in the chat UI.
fn format_check_result(verdict: &Verdict) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Prüfergebnis für {}", verdict.counterparty_name);
    if let Some(official) = &verdict.official_name {
        if official != &verdict.counterparty_name {
            let _ = writeln!(out, "Offizieller Name laut Register: **{}**", official);
        }
    }
    let _ = writeln!(out, "\n**Gesamtstatus:** {}\n", status_line(verdict.overall_status));

    let vat = &verdict.checks.vat_validation;
    let _ = writeln!(out, "### USt-IdNr.-Prüfung");
    if vat.valid {
        let _ = writeln!(
            out,
            "- Gültig: {}{}",
            vat.country_code, vat.vat_number
        );
        if let Some(company) = &vat.company_name {
            let _ = writeln!(out, "- Registrierter Name: {}", company);
        }
    } else {
        let reason = vat.error.as_deref().unwrap_or("Ungültig");
        let _ = writeln!(out, "- Nicht verifiziert: {}", reason);
    }

    let sanctions = &verdict.checks.sanctions_check;
    let _ = writeln!(out, "\n### Sanktionslisten");
    if sanctions.is_sanctioned {
        for m in &sanctions.matches {
            let _ = writeln!(
                out,
                "- Treffer: {} ({}, gelistet {})",
                m.entity_name, m.list_name, m.date_listed
            );
        }
    } else {
        let _ = writeln!(out, "- Keine Treffer");
    }

    let judicial = &verdict.checks.judicial_check;
    let _ = writeln!(out, "\n### Gerichtsverfahren");
    if judicial.case_count == 0 {
        let _ = writeln!(out, "- Keine bekannten Verfahren");
    } else {
        let _ = writeln!(out, "- {} bekannte(s) Verfahren:", judicial.case_count);
        for case in judicial.cases.iter().take(3) {
            let _ = writeln!(
                out,
                "  - {} ({}, {}): {} [{}]",
                case.case_number, case.court, case.date_filed, case.description, case.status
            );
        }
        if judicial.case_count > 3 {
            let _ = writeln!(out, "  - ... und {} weitere", judicial.case_count - 3);
        }
    }

    let summary = match verdict.overall_status {
        OverallStatus::Verified => {
            "Der Geschäftspartner wurde erfolgreich verifiziert. Es liegen keine Auffälligkeiten vor."
        }
        OverallStatus::Warning => {
            "Es liegen Auffälligkeiten vor. Eine vertiefte Prüfung vor Vertragsabschluss wird empfohlen."
        }
        OverallStatus::Sanctioned => {
            "Achtung: Der Geschäftspartner steht auf einer Sanktionsliste. Von einer Geschäftsbeziehung wird dringend abgeraten."
        }
        OverallStatus::Unknown => {
            "Ohne USt-IdNr. ist keine vollständige Verifizierung möglich. Bitte ergänzen Sie die USt-IdNr. des Partners."
        }
    };
    let _ = writeln!(out, "\n**Zusammenfassung:** {}", summary);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_vat_and_suffix_name() {
        let (name, vat) =
            extract_company_info("Bitte prüfe die Acme Trading GmbH mit USt-IdNr. DE123456789");
        assert_eq!(name.as_deref(), Some("Acme Trading GmbH"));
        assert_eq!(vat.as_deref(), Some("DE123456789"));
    }

    #[test]
    fn extracts_labeled_name() {
        let (name, _) = extract_company_info("Firma: Beispiel Handel KG bitte checken");
        assert!(name.as_deref().is_some_and(|n| n.starts_with("Beispiel Handel")));
    }

    #[test]
    fn short_message_is_taken_as_name() {
        let (name, vat) = extract_company_info("Global Imports Ltd");
        assert_eq!(name.as_deref(), Some("Global Imports Ltd"));
        assert!(vat.is_none());
    }

    #[test]
    fn long_prose_without_company_yields_nothing() {
        let (name, vat) = extract_company_info(
            "ich würde gerne wissen wie so eine prüfung überhaupt funktioniert und was dabei geprüft wird",
        );
        assert!(name.is_none());
        assert!(vat.is_none());
    }

    #[test]
    fn report_mentions_status_and_summary() {
        use std::sync::Arc;
        let checker = kontor_check::CounterpartyChecker::new(Arc::new(kontor_check::FixtureRegistry));
        let verdict = checker.check("Tset GmbH", Some("DE123456789"), None, None);
        let report = format_check_result(&verdict);
        assert!(report.contains("✅ Verifiziert"));
        assert!(report.contains("Offizieller Name laut Register: **Test GmbH**"));
        assert!(report.contains("Zusammenfassung"));
    }
}
