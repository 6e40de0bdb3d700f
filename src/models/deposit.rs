//! Vice-bank ledger entry: one deposit logged against a conversion rule.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A single deposit recorded against an `Action` on a date.
///
/// `conversion_rate` is copied from the rule at deposit time and never
/// re-derived, so later rule edits do not reprice historical deposits. The
/// action name and unit are denormalized for the same reason: deleting the
/// rule leaves the ledger readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: String,
    pub vb_user_id: String,
    /// Zoned timestamp, ISO-8601 with offset on the wire
    pub date: DateTime<FixedOffset>,
    pub deposit_quantity: f64,
    pub conversion_rate: f64,
    pub action_id: String,
    pub action_name: String,
    pub conversion_unit: String,
}

impl Deposit {
    /// Tokens this deposit earned at the rate frozen when it was created.
    pub fn tokens_earned(&self) -> f64 {
        self.deposit_quantity * self.conversion_rate
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.deposit_quantity < 0.0 {
            return Err(AppError::Validation(
                "Deposit depositQuantity must not be negative".to_string(),
            ));
        }
        if self.conversion_rate < 0.0 {
            return Err(AppError::Validation(
                "Deposit conversionRate must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Strict parse from a JSON value: shape and semantic checks.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let deposit: Deposit = serde_json::from_value(value)?;
        deposit.validate()?;
        Ok(deposit)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
