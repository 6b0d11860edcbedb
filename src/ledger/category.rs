use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Closed set of expense categories for a trip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Transport,
    Lodging,
    Food,
    Activities,
    Shopping,
    Emergency,
    Communication,
    Other,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 8] = [
        ExpenseCategory::Transport,
        ExpenseCategory::Lodging,
        ExpenseCategory::Food,
        ExpenseCategory::Activities,
        ExpenseCategory::Shopping,
        ExpenseCategory::Emergency,
        ExpenseCategory::Communication,
        ExpenseCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseCategory::Transport => "transport",
            ExpenseCategory::Lodging => "lodging",
            ExpenseCategory::Food => "food",
            ExpenseCategory::Activities => "activities",
            ExpenseCategory::Shopping => "shopping",
            ExpenseCategory::Emergency => "emergency",
            ExpenseCategory::Communication => "communication",
            ExpenseCategory::Other => "other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised for category names outside the enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl FromStr for ExpenseCategory {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        ExpenseCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCategory(value.to_string()))
    }
}
