use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::judicial::{self, JudicialResult};
use crate::sanctions::{self, SanctionsResult};
use crate::vat::{VatRegistry, VatValidation, VatValidator};

/// Identity of the party requesting the check, attached to the verdict for
/// audit context. Never used for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerProfile {
    pub company_name: String,
    pub vat_id: String,
    pub country: String,
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Sanctioned,
    Warning,
    Verified,
    Unknown,
}

#[derive(Debug, Serialize)]
pub struct CheckResults {
    pub vat_validation: VatValidation,
    pub sanctions_check: SanctionsResult,
    pub judicial_check: JudicialResult,
}

#[derive(Debug, Serialize)]
pub struct Verdict {
    pub counterparty_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,
    pub check_date: String,
    pub overall_status: OverallStatus,
    pub checks: CheckResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checker_info: Option<CheckerProfile>,
}

pub struct CounterpartyChecker {
    vat: VatValidator,
}

impl CounterpartyChecker {
    pub fn new(registry: Arc<dyn VatRegistry>) -> Self {
        Self {
            vat: VatValidator::new(registry),
        }
    }

    /// Run the full pipeline: VAT validation, then sanctions and judicial
    /// screening against the registrant name when the VAT lookup produced
    /// one (a correct VAT id corrects a misspelled input name).
    ///
    /// Status precedence is strict: sanctioned > warning > verified >
    /// unknown. Sanctions dominate regardless of VAT and judicial findings.
    pub fn check(
        &self,
        name: &str,
        vat_id: Option<&str>,
        country_code: Option<&str>,
        checker_profile: Option<CheckerProfile>,
    ) -> Verdict {
        // Derive the country from the VAT prefix when not supplied. The
        // boundary check keeps a multi-byte leading char from panicking
        // the slice.
        let country_code = country_code.map(str::to_uppercase).or_else(|| {
            vat_id
                .filter(|v| v.len() >= 2 && v.is_char_boundary(2))
                .map(|v| v[..2].to_uppercase())
        });

        let vat_validation = match vat_id {
            Some(vat_id) => self.vat.validate(vat_id),
            None => VatValidation {
                valid: false,
                country_code: country_code.clone().unwrap_or_default(),
                vat_number: String::new(),
                request_date: Utc::now().to_rfc3339(),
                company_name: None,
                company_address: None,
                error: Some("No VAT ID provided".into()),
            },
        };

        let official_name = vat_validation
            .valid
            .then(|| vat_validation.company_name.clone())
            .flatten()
            .filter(|n| !n.is_empty());
        let name_for_checks = official_name.as_deref().unwrap_or(name);

        let sanctions_check = sanctions::check_sanctions(name_for_checks, country_code.as_deref());
        let judicial_check = judicial::check_judicial_cases(name_for_checks, country_code.as_deref());

        let overall_status = if sanctions_check.is_sanctioned {
            OverallStatus::Sanctioned
        } else if (vat_id.is_some() && !vat_validation.valid) || judicial_check.case_count > 0 {
            OverallStatus::Warning
        } else if vat_id.is_some() && vat_validation.valid {
            OverallStatus::Verified
        } else {
            OverallStatus::Unknown
        };

        Verdict {
            counterparty_name: name.to_string(),
            official_name,
            check_date: Utc::now().to_rfc3339(),
            overall_status,
            checks: CheckResults {
                vat_validation,
                sanctions_check,
                judicial_check,
            },
            checker_info: checker_profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vat::{FixtureRegistry, RegistryError, VatRecord};

    fn checker() -> CounterpartyChecker {
        CounterpartyChecker::new(Arc::new(FixtureRegistry))
    }

    #[test]
    fn sanctions_dominate_valid_vat() {
        // Registry that maps the test VAT id to a sanctioned registrant name
        struct SanctionedRegistry;
        impl VatRegistry for SanctionedRegistry {
            fn lookup(&self, _: &str, _: &str) -> Result<Option<VatRecord>, RegistryError> {
                Ok(Some(VatRecord {
                    company_name: "Sanctioned Entity".into(),
                    company_address: "Nowhere 1".into(),
                }))
            }
        }

        let checker = CounterpartyChecker::new(Arc::new(SanctionedRegistry));
        let verdict = checker.check("Sanctioned Entity", Some("DE123456789"), None, None);
        assert!(verdict.checks.vat_validation.valid);
        assert_eq!(verdict.checks.judicial_check.case_count, 0);
        assert_eq!(verdict.overall_status, OverallStatus::Sanctioned);
    }

    #[test]
    fn invalid_vat_yields_warning() {
        let verdict = checker().check("Mustermann GmbH", Some("DE000000000"), None, None);
        assert_eq!(verdict.overall_status, OverallStatus::Warning);
    }

    #[test]
    fn judicial_cases_yield_warning_even_with_valid_vat() {
        struct LitigiousRegistry;
        impl VatRegistry for LitigiousRegistry {
            fn lookup(&self, _: &str, _: &str) -> Result<Option<VatRecord>, RegistryError> {
                Ok(Some(VatRecord {
                    company_name: "Tech Solutions GmbH".into(),
                    company_address: "München".into(),
                }))
            }
        }

        let checker = CounterpartyChecker::new(Arc::new(LitigiousRegistry));
        let verdict = checker.check("Tech Solutions", Some("DE123456789"), None, None);
        assert!(verdict.checks.vat_validation.valid);
        assert!(verdict.checks.judicial_check.case_count > 0);
        assert_eq!(verdict.overall_status, OverallStatus::Warning);
    }

    #[test]
    fn valid_vat_and_clean_record_is_verified() {
        let verdict = checker().check("Test GmbH", Some("DE123456789"), None, None);
        assert_eq!(verdict.overall_status, OverallStatus::Verified);
        assert_eq!(verdict.official_name.as_deref(), Some("Test GmbH"));
    }

    #[test]
    fn no_vat_and_clean_record_is_unknown() {
        let verdict = checker().check("Mustermann GmbH", None, None, None);
        assert_eq!(verdict.overall_status, OverallStatus::Unknown);
        assert_eq!(
            verdict.checks.vat_validation.error.as_deref(),
            Some("No VAT ID provided")
        );
    }

    #[test]
    fn official_name_corrects_misspelled_input() {
        // Caller misspells the name; the valid VAT lookup substitutes the
        // registrant name for the downstream checks.
        let verdict = checker().check("Tst Gmb", Some("DE123456789"), None, None);
        assert_eq!(verdict.counterparty_name, "Tst Gmb");
        assert_eq!(verdict.official_name.as_deref(), Some("Test GmbH"));
        assert_eq!(verdict.checks.judicial_check.entity_name, "Test GmbH");
    }

    #[test]
    fn country_code_derived_from_vat_prefix() {
        let verdict = checker().check("Anything", Some("de123456789"), None, None);
        assert_eq!(verdict.checks.vat_validation.country_code, "DE");
    }

    #[test]
    fn multibyte_vat_prefix_is_a_warning_not_a_panic() {
        // The slice that derives the country from the first two bytes must
        // tolerate ids starting with a multi-byte char.
        for vat_id in ["€123456789", "日本123", "ä1"] {
            let verdict = checker().check("Mustermann GmbH", Some(vat_id), None, None);
            assert_eq!(verdict.overall_status, OverallStatus::Warning, "{:?}", vat_id);
            assert!(!verdict.checks.vat_validation.valid);
        }
    }

    #[test]
    fn checker_profile_is_echoed_not_scored() {
        let profile = CheckerProfile {
            company_name: "Requester AG".into(),
            vat_id: "DE111111111".into(),
            country: "DE".into(),
            address: "Berlin".into(),
        };
        let verdict = checker().check("Test GmbH", Some("DE123456789"), None, Some(profile));
        assert_eq!(verdict.overall_status, OverallStatus::Verified);
        assert_eq!(
            verdict.checker_info.as_ref().map(|p| p.company_name.as_str()),
            Some("Requester AG")
        );
    }
}
