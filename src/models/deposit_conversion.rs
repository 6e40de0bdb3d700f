//! Action-bank conversion rule, persisted as a bare JSON array.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// An action-bank rule converting deposited quantity into tokens.
///
/// Same accounting shape as the vice-bank `Action`, but owned by a plain
/// account (`user_id`) and carrying a `rate_name` label instead of a
/// conversion unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositConversion {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub rate_name: String,
    pub deposits_per: f64,
    pub tokens_per: f64,
    pub min_deposit: f64,
    pub max_deposit: f64,
}

impl DepositConversion {
    /// Tokens earned per unit of deposited quantity.
    pub fn conversion_rate(&self) -> f64 {
        self.tokens_per / self.deposits_per
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.deposits_per > 0.0) {
            return Err(AppError::Validation(
                "DepositConversion depositsPer must be greater than zero".to_string(),
            ));
        }
        if !(self.tokens_per > 0.0) {
            return Err(AppError::Validation(
                "DepositConversion tokensPer must be greater than zero".to_string(),
            ));
        }
        if self.min_deposit < 0.0 {
            return Err(AppError::Validation(
                "DepositConversion minDeposit must not be negative".to_string(),
            ));
        }
        if self.max_deposit < self.min_deposit {
            return Err(AppError::Validation(
                "DepositConversion maxDeposit must not be less than minDeposit".to_string(),
            ));
        }
        Ok(())
    }

    /// Strict parse from a JSON value: shape and semantic checks.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let conversion: DepositConversion = serde_json::from_value(value)?;
        conversion.validate()?;
        Ok(conversion)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
