//! Built-in detection categories.
//!
//! Each category is described by one entry in [`CATEGORIES`]; the redaction
//! engine walks that table in order, so adding a category is a matter of
//! adding a variant and a descriptor.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A built-in kind of sensitive data.
///
/// Variants are declared in processing order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Category {
    /// Email addresses.
    Email,
    /// Phone numbers (North American format with optional country code).
    Phone,
    /// 16-digit payment card numbers.
    CreditCard,
    /// US Social Security Numbers.
    Ssn,
    /// IPv4 addresses.
    Ipv4,
}

/// Static description of a built-in category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDescriptor {
    /// The category this descriptor belongs to.
    pub category: Category,

    /// Stable identifier used in summaries, storage and cache keys.
    pub name: &'static str,

    /// Human-readable description of what the category matches.
    pub description: &'static str,

    /// Regex used when the rule set carries no override.
    pub default_pattern: &'static str,

    /// Placeholder used by the default rule set.
    pub default_replacement: &'static str,
}

/// All built-in categories, in processing order.
pub const CATEGORIES: &[CategoryDescriptor] = &[
    CategoryDescriptor {
        category: Category::Email,
        name: "email",
        description: "Email addresses",
        default_pattern: r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
        default_replacement: "security@example.com",
    },
    CategoryDescriptor {
        category: Category::Phone,
        name: "phone",
        description: "Phone numbers with optional country code",
        default_pattern: r"(?:\+[0-9]{1,3}[\s-]?)?\(?[0-9]{3}\)?[\s.-]?[0-9]{3}[\s.-]?[0-9]{4}",
        default_replacement: "+1-555-123-4567",
    },
    CategoryDescriptor {
        category: Category::CreditCard,
        name: "credit_card",
        description: "Card numbers written as four groups of four digits",
        default_pattern: r"\b(?:[0-9]{4}[- ]?){3}[0-9]{4}\b",
        default_replacement: "XXXX-XXXX-XXXX-XXXX",
    },
    CategoryDescriptor {
        category: Category::Ssn,
        name: "ssn",
        description: "US Social Security Numbers",
        default_pattern: r"\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b",
        default_replacement: "XXX-XX-XXXX",
    },
    CategoryDescriptor {
        category: Category::Ipv4,
        name: "ipv4",
        description: "Dotted-quad IPv4 addresses",
        default_pattern: r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
        default_replacement: "0.0.0.0",
    },
];

impl Category {
    /// Every category, in processing order.
    pub const ALL: [Self; 5] = [
        Self::Email,
        Self::Phone,
        Self::CreditCard,
        Self::Ssn,
        Self::Ipv4,
    ];

    /// The static descriptor for this category.
    #[must_use]
    pub fn descriptor(self) -> &'static CategoryDescriptor {
        &CATEGORIES[self as usize]
    }

    /// Stable identifier of this category.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CATEGORIES
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(s))
            .map(|d| d.category)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}
