//! Vice bank user: the owner of rules, deposits, and a running token balance.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A vice bank participant.
///
/// `current_tokens` is the single source of truth for the balance. It is
/// maintained incrementally: callers apply the `tokens_added` deltas returned
/// by ledger mutations via `update_user`. It is never recomputed from the
/// deposit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViceBankUser {
    pub id: String,
    /// The owning account
    pub user_id: String,
    pub name: String,
    pub current_tokens: f64,
}

impl ViceBankUser {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation(
                "ViceBankUser name is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Strict parse from a JSON value: shape and semantic checks.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let user: ViceBankUser = serde_json::from_value(value)?;
        user.validate()?;
        Ok(user)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
