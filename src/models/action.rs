//! Vice-bank conversion rule: a named rule converting a quantity of some
//! real-world unit into tokens.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A conversion rule owned by a vice bank user.
///
/// Every `deposits_per` units of deposited quantity earn `tokens_per` tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub vb_user_id: String,
    pub name: String,
    /// Unit label for deposited quantities, e.g. "minutes"
    pub conversion_unit: String,
    pub deposits_per: f64,
    pub tokens_per: f64,
    /// Minimum quantity accepted per single deposit
    pub min_deposit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_deposit: Option<f64>,
}

impl Action {
    /// Tokens earned per unit of deposited quantity.
    ///
    /// Callers resolve this once when a deposit is created; the deposit keeps
    /// the resolved rate and is never re-priced against a later rule edit.
    pub fn conversion_rate(&self) -> f64 {
        self.tokens_per / self.deposits_per
    }

    /// Semantic validation beyond field presence.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.deposits_per > 0.0) {
            return Err(AppError::Validation(
                "Action depositsPer must be greater than zero".to_string(),
            ));
        }
        if !(self.tokens_per > 0.0) {
            return Err(AppError::Validation(
                "Action tokensPer must be greater than zero".to_string(),
            ));
        }
        if self.min_deposit < 0.0 {
            return Err(AppError::Validation(
                "Action minDeposit must not be negative".to_string(),
            ));
        }
        if let Some(max) = self.max_deposit {
            if max < self.min_deposit {
                return Err(AppError::Validation(
                    "Action maxDeposit must not be less than minDeposit".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Strict parse from a JSON value: shape and semantic checks.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let action: Action = serde_json::from_value(value)?;
        action.validate()?;
        Ok(action)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
