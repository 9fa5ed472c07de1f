use std::fmt;

use serde::{Deserialize, Serialize};

/// The four business modules. Each one owns its own prompt context and
/// conversation thread per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Accounting,
    PartnerCheck,
    Secretary,
    Marketing,
}

impl Module {
    pub const ALL: [Module; 4] = [
        Module::Accounting,
        Module::PartnerCheck,
        Module::Secretary,
        Module::Marketing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Module::Accounting => "accounting",
            Module::PartnerCheck => "partner_check",
            Module::Secretary => "secretary",
            Module::Marketing => "marketing",
        }
    }

    pub fn from_name(name: &str) -> Option<Module> {
        match name {
            "accounting" => Some(Module::Accounting),
            "partner_check" => Some(Module::PartnerCheck),
            "secretary" => Some(Module::Secretary),
            "marketing" => Some(Module::Marketing),
            _ => None,
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrip() {
        for module in Module::ALL {
            assert_eq!(Module::from_name(module.as_str()), Some(module));
        }
        assert_eq!(Module::from_name("payroll"), None);
    }
}
