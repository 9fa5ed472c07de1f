//! Counterparty risk checks: VAT validation, sanctions screening and
//! judicial-case lookup, aggregated into a single verdict.

pub mod counterparty;
pub mod judicial;
pub mod sanctions;
pub mod vat;

pub use counterparty::{CheckerProfile, CounterpartyChecker, OverallStatus, Verdict};
pub use vat::{FixtureRegistry, VatRegistry, VatValidation};
