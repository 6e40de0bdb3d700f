//! Action-bank ledger entry for recurring tasks, with a bucketing frequency.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// How often a recurring task may be credited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            _ => None,
        }
    }
}

/// A deposit bound to a recurring task rather than a conversion rule lookup.
///
/// Tasks award a flat `conversion_rate` per completion; `frequency` drives
/// the period-bucket duplicate check before tokens are credited again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeposit {
    pub id: String,
    pub user_id: String,
    pub date: DateTime<FixedOffset>,
    pub task_id: String,
    pub task_name: String,
    pub conversion_rate: f64,
    pub frequency: Frequency,
}

impl TaskDeposit {
    /// Flat token award frozen when the deposit was created.
    pub fn tokens_earned(&self) -> f64 {
        self.conversion_rate
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.conversion_rate < 0.0 {
            return Err(AppError::Validation(
                "TaskDeposit conversionRate must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Strict parse from a JSON value: shape and semantic checks.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let deposit: TaskDeposit = serde_json::from_value(value)?;
        deposit.validate()?;
        Ok(deposit)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
