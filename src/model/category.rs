//! Message categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::i18n::{self, Lang};

/// The closed set of labels a message can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Invoices,
    Protocol,
    Urgent,
    OfficialCertifiedMail,
    Notifications,
    General,
}

impl Category {
    /// Every category, in built-in rule priority order.
    pub const ALL: [Category; 6] = [
        Category::Invoices,
        Category::Protocol,
        Category::Urgent,
        Category::OfficialCertifiedMail,
        Category::Notifications,
        Category::General,
    ];

    /// Stable label written to reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Invoices => "Invoices",
            Self::Protocol => "Protocol",
            Self::Urgent => "Urgent",
            Self::OfficialCertifiedMail => "OfficialCertifiedMail",
            Self::Notifications => "Notifications",
            Self::General => "General",
        }
    }

    /// Human-readable name in the current UI language.
    pub fn display_name(self) -> &'static str {
        match (self, i18n::lang()) {
            (Self::Invoices, Lang::En) => "Invoices",
            (Self::Invoices, Lang::It) => "Fatture",
            (Self::Protocol, Lang::En) => "Protocol",
            (Self::Protocol, Lang::It) => "Protocollo",
            (Self::Urgent, Lang::En) => "Urgent",
            (Self::Urgent, Lang::It) => "Urgente",
            (Self::OfficialCertifiedMail, Lang::En) => "Official certified mail",
            (Self::OfficialCertifiedMail, Lang::It) => "PEC Ufficiale",
            (Self::Notifications, Lang::En) => "Notifications",
            (Self::Notifications, Lang::It) => "Notifiche",
            (Self::General, Lang::En) => "General",
            (Self::General, Lang::It) => "Generale",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts the report label, case-insensitively, with or without separators
    /// (`"official-certified-mail"` and `"OfficialCertifiedMail"` are equal).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|c| c.label().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}
