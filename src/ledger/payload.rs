//! Loosely-typed wire shape of an expense as submitted by the request layer.
//!
//! Every field is optional so that a missing value surfaces as a validation
//! violation instead of a deserialisation error. See
//! [`crate::validation::validate_payload`] for turning it into an [`Expense`].
//!
//! [`Expense`]: super::Expense

use serde::{Deserialize, Serialize};

/// Amounts arrive either as JSON numbers or as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    pub fn as_text(&self) -> String {
        match self {
            AmountInput::Number(number) => number.to_string(),
            AmountInput::Text(text) => text.clone(),
        }
    }
}

impl From<&str> for AmountInput {
    fn from(text: &str) -> Self {
        AmountInput::Text(text.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SplitPayload {
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub amount_owed: Option<AmountInput>,
    #[serde(default)]
    pub amount_paid: Option<AmountInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpensePayload {
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    pub payer_id: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub splits: Option<Vec<SplitPayload>>,
}

impl ExpensePayload {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
