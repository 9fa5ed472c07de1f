use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// A registry record for a valid VAT number.
#[derive(Debug, Clone)]
pub struct VatRecord {
    pub company_name: String,
    pub company_address: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Lookup seam for the external VAT registry (VIES in production). The
/// default implementation is a fixture table; a real client can be slotted
/// in without touching the aggregator.
pub trait VatRegistry: Send + Sync {
    /// `Ok(None)` means the number is known to be unregistered;
    /// `Err` means the registry could not be reached at all.
    fn lookup(&self, country_code: &str, number: &str) -> Result<Option<VatRecord>, RegistryError>;
}

/// Outcome of validating one VAT identifier. Both malformed input and a
/// faulted registry yield `valid: false` with an error reason; callers
/// treat either as "could not verify", never as "confirmed invalid".
#[derive(Debug, Clone, Serialize)]
pub struct VatValidation {
    pub valid: bool,
    pub country_code: String,
    pub vat_number: String,
    pub request_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VatValidation {
    fn invalid(country_code: &str, vat_number: &str, reason: &str) -> Self {
        Self {
            valid: false,
            country_code: country_code.to_string(),
            vat_number: vat_number.to_string(),
            request_date: Utc::now().to_rfc3339(),
            company_name: None,
            company_address: None,
            error: Some(reason.to_string()),
        }
    }
}

pub struct VatValidator {
    registry: std::sync::Arc<dyn VatRegistry>,
}

impl VatValidator {
    pub fn new(registry: std::sync::Arc<dyn VatRegistry>) -> Self {
        Self { registry }
    }

    /// Validate a VAT identifier of form `<2-letter country><digits>`,
    /// e.g. `DE123456789`.
    pub fn validate(&self, vat_id: &str) -> VatValidation {
        let vat_id = vat_id.trim();
        // Byte length check alone is not enough: a multi-byte first char
        // would make the prefix split below panic.
        if vat_id.len() < 3 || !vat_id.is_char_boundary(2) {
            return VatValidation::invalid("", "", "Invalid VAT number format");
        }

        let (country_raw, number) = vat_id.split_at(2);
        let country_code = country_raw.to_uppercase();
        if !country_raw.chars().all(|c| c.is_ascii_alphabetic()) {
            return VatValidation::invalid(&country_code, number, "Invalid VAT number format");
        }

        match self.registry.lookup(&country_code, number) {
            Ok(Some(record)) => VatValidation {
                valid: true,
                country_code,
                vat_number: number.to_string(),
                request_date: Utc::now().to_rfc3339(),
                company_name: Some(record.company_name),
                company_address: Some(record.company_address),
                error: None,
            },
            Ok(None) => {
                VatValidation::invalid(&country_code, number, "VAT number not found or invalid")
            }
            Err(e) => {
                error!("VAT registry error for {}{}: {}", country_code, number, e);
                VatValidation::invalid(&country_code, number, "Validation service error")
            }
        }
    }
}

/// Fixture registry covering the known test numbers. Stands in for VIES
/// until a real client is wired up.
#[derive(Default)]
pub struct FixtureRegistry;

impl VatRegistry for FixtureRegistry {
    fn lookup(&self, country_code: &str, number: &str) -> Result<Option<VatRecord>, RegistryError> {
        let record = match (country_code, number) {
            ("DE", "123456789") => Some(VatRecord {
                company_name: "Test GmbH".into(),
                company_address: "Test Street 1, 10115 Berlin, Germany".into(),
            }),
            ("FR", "12345678901") => Some(VatRecord {
                company_name: "Test SARL".into(),
                company_address: "1 Rue de Test, 75001 Paris, France".into(),
            }),
            ("GB", "123456789") => Some(VatRecord {
                company_name: "Test Ltd".into(),
                company_address: "Test Road 1, London, UK".into(),
            }),
            _ => None,
        };
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn validator() -> VatValidator {
        VatValidator::new(Arc::new(FixtureRegistry))
    }

    #[test]
    fn known_numbers_are_valid_with_company_name() {
        let v = validator();
        for vat_id in ["DE123456789", "FR12345678901", "GB123456789"] {
            let result = v.validate(vat_id);
            assert!(result.valid, "{} should be valid", vat_id);
            assert!(!result.company_name.as_deref().unwrap_or("").is_empty());
        }
    }

    #[test]
    fn unknown_numbers_are_invalid() {
        let v = validator();
        for vat_id in ["DE999999999", "ATU12345678", "PL0000000000"] {
            let result = v.validate(vat_id);
            assert!(!result.valid);
            assert!(result.error.is_some());
        }
    }

    #[test]
    fn malformed_input_is_invalid_not_panic() {
        let v = validator();
        for vat_id in ["", "D", "DE", "12345", "1E234"] {
            let result = v.validate(vat_id);
            assert!(!result.valid, "{:?} must be invalid", vat_id);
            assert!(result.error.is_some());
        }
    }

    #[test]
    fn multibyte_prefix_is_invalid_not_panic() {
        let v = validator();
        for vat_id in ["€123456789", "ä123456789", "Dé123456789", "日本123"] {
            let result = v.validate(vat_id);
            assert!(!result.valid, "{:?} must be invalid", vat_id);
            assert_eq!(result.error.as_deref(), Some("Invalid VAT number format"));
        }
    }

    #[test]
    fn registry_failure_reads_as_could_not_verify() {
        struct DownRegistry;
        impl VatRegistry for DownRegistry {
            fn lookup(&self, _: &str, _: &str) -> Result<Option<VatRecord>, RegistryError> {
                Err(RegistryError::Unavailable("timeout".into()))
            }
        }

        let v = VatValidator::new(Arc::new(DownRegistry));
        let result = v.validate("DE123456789");
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("Validation service error"));
    }
}
