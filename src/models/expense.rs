//! Budget expense value objects.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// When a recurring expense falls due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExpenseTarget {
    /// Due on a fixed day of the week (0 = Sunday .. 6 = Saturday)
    #[serde(rename_all = "camelCase")]
    Weekly { day_of_week: u8 },
    /// Due on a day of the month; -1 means the last day
    #[serde(rename_all = "camelCase")]
    Monthly { day_of_month: i8 },
    /// Due on explicit days of the month
    #[serde(rename_all = "camelCase")]
    Dated { dates: Vec<u8> },
}

impl ExpenseTarget {
    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            ExpenseTarget::Weekly { day_of_week } => {
                if *day_of_week > 6 {
                    return Err(AppError::Validation(
                        "ExpenseTarget dayOfWeek must be in 0..=6".to_string(),
                    ));
                }
            }
            ExpenseTarget::Monthly { day_of_month } => {
                if *day_of_month != -1 && !(1..=31).contains(day_of_month) {
                    return Err(AppError::Validation(
                        "ExpenseTarget dayOfMonth must be 1..=31 or -1".to_string(),
                    ));
                }
            }
            ExpenseTarget::Dated { dates } => {
                if dates.is_empty() {
                    return Err(AppError::Validation(
                        "ExpenseTarget dates must not be empty".to_string(),
                    ));
                }
                if dates.iter().any(|d| !(1..=31).contains(d)) {
                    return Err(AppError::Validation(
                        "ExpenseTarget dates must all be in 1..=31".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Strict parse from a JSON value: shape and semantic checks.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let target: ExpenseTarget = serde_json::from_value(value)?;
        target.validate()?;
        Ok(target)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A recurring budget expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub budget_id: String,
    pub category_id: String,
    pub description: String,
    pub amount: f64,
    pub expense_target: ExpenseTarget,
}

impl Expense {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.amount > 0.0) {
            return Err(AppError::Validation(
                "Expense amount must be greater than zero".to_string(),
            ));
        }
        self.expense_target.validate()
    }

    /// Strict parse from a JSON value: shape and semantic checks.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let expense: Expense = serde_json::from_value(value)?;
        expense.validate()?;
        Ok(expense)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Expense {
        Expense {
            id: "e-1".to_string(),
            budget_id: "b-1".to_string(),
            category_id: "c-1".to_string(),
            description: "Rent".to_string(),
            amount: 1200.0,
            expense_target: ExpenseTarget::Monthly { day_of_month: 1 },
        }
    }

    #[test]
    fn test_round_trip_all_target_variants() {
        let targets = vec![
            ExpenseTarget::Weekly { day_of_week: 3 },
            ExpenseTarget::Monthly { day_of_month: -1 },
            ExpenseTarget::Dated {
                dates: vec![1, 15],
            },
        ];
        for target in targets {
            let mut expense = sample();
            expense.expense_target = target;
            let parsed = Expense::from_json(expense.to_json()).unwrap();
            assert_eq!(parsed, expense);
        }
    }

    #[test]
    fn test_target_wire_shape_is_tagged() {
        let value = ExpenseTarget::Weekly { day_of_week: 3 }.to_json();
        assert_eq!(value, json!({"type": "weekly", "dayOfWeek": 3}));
    }

    #[test]
    fn test_rejects_bad_day_of_week() {
        let value = json!({"type": "weekly", "dayOfWeek": 9});
        assert!(ExpenseTarget::from_json(value).is_err());
    }

    #[test]
    fn test_rejects_zero_amount() {
        let mut expense = sample();
        expense.amount = 0.0;
        assert!(Expense::from_json(expense.to_json()).is_err());
    }
}
