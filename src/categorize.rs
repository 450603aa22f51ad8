//! Rule-based message categorization.
//!
//! A [`Categorizer`] is an ordered list of rules. Each rule tests one field
//! (subject or sender) for any of a set of substrings; the first matching rule
//! decides the category. When nothing matches the message is
//! [`Category::General`].
//!
//! The built-in table targets Italian PEC traffic:
//!
//! | Priority | Category                | Field   | Contains                        |
//! |----------|-------------------------|---------|---------------------------------|
//! | 1        | `Invoices`              | subject | `fattura`, `invoice`            |
//! | 2        | `Protocol`              | subject | `protocollo`, `prot.`           |
//! | 3        | `Urgent`                | subject | `urgente`, `importante`         |
//! | 4        | `OfficialCertifiedMail` | sender  | `@pec.`, `@legalmail.`          |
//! | 5        | `Notifications`         | subject | `notifica`                      |

use serde::{Deserialize, Serialize};

use crate::model::category::Category;

/// Which header a rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Subject,
    Sender,
}

/// One `(predicate, category)` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub category: Category,
    pub field: Field,
    /// Substrings, matched case-insensitively. Any one is enough.
    pub contains: Vec<String>,
}

impl Rule {
    pub fn new(category: Category, field: Field, needles: &[&str]) -> Self {
        Self {
            category,
            field,
            contains: needles.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Test the rule against already-lowercased inputs.
    fn matches(&self, subject: &str, sender: &str) -> bool {
        let haystack = match self.field {
            Field::Subject => subject,
            Field::Sender => sender,
        };
        self.contains
            .iter()
            .any(|needle| !needle.is_empty() && haystack.contains(&needle.to_lowercase()))
    }
}

/// Ordered rule table with a fixed [`Category::General`] fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorizer {
    rules: Vec<Rule>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl Categorizer {
    /// A categorizer using exactly `rules`, in order.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// User rules evaluated before the built-in table.
    pub fn with_custom_rules(custom: Vec<Rule>) -> Self {
        let mut rules = custom;
        rules.extend(default_rules());
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// File a message. Absent headers should be passed as empty strings.
    pub fn categorize(&self, subject: &str, sender: &str) -> Category {
        let subject = subject.to_lowercase();
        let sender = sender.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&subject, &sender))
            .map(|rule| rule.category)
            .unwrap_or(Category::General)
    }
}

/// The built-in rule table, in priority order.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(Category::Invoices, Field::Subject, &["fattura", "invoice"]),
        Rule::new(Category::Protocol, Field::Subject, &["protocollo", "prot."]),
        Rule::new(Category::Urgent, Field::Subject, &["urgente", "importante"]),
        Rule::new(
            Category::OfficialCertifiedMail,
            Field::Sender,
            &["@pec.", "@legalmail."],
        ),
        Rule::new(Category::Notifications, Field::Subject, &["notifica"]),
    ]
}

/// Categorize with the built-in table.
pub fn categorize(subject: &str, sender: &str) -> Category {
    Categorizer::default().categorize(subject, sender)
}
