use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    Advance,
    Repayment,
    SalaryPayment,
    SalaryDeduction,
}

impl TransactionType {
    /// Signed effect of `amount` on the outstanding advance balance.
    /// Amounts are magnitudes; the direction comes from the type alone.
    pub fn balance_effect(self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Advance => amount,
            TransactionType::Repayment | TransactionType::SalaryDeduction => -amount,
            TransactionType::SalaryPayment => Decimal::ZERO,
        }
    }
}

impl TryFrom<String> for TransactionType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Transfer,
    Check,
    Card,
    Other,
}

impl TryFrom<String> for PaymentMethod {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One row of the employee transaction log. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeTransaction {
    pub id: u64,
    pub employee_id: u64,

    #[schema(value_type = String, format = "date", example = "2024-03-05")]
    pub transaction_date: NaiveDate,

    #[sqlx(try_from = "String")]
    pub transaction_type: TransactionType,

    /// Rows imported from the previous store may lack an amount; those count as 0.
    #[schema(value_type = Option<f64>, example = 200.0)]
    pub amount: Option<Decimal>,

    #[sqlx(try_from = "String")]
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl EmployeeTransaction {
    pub fn amount(&self) -> Decimal {
        self.amount.unwrap_or_default()
    }
}

const SELECT_TRANSACTION: &str = r#"
    SELECT id, employee_id, transaction_date, transaction_type, amount,
           payment_method, notes, created_at
    FROM employee_transactions
"#;

impl EmployeeTransaction {
    /// The whole log, most recent first.
    pub async fn all(pool: &MySqlPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EmployeeTransaction>(&format!(
            "{SELECT_TRANSACTION} ORDER BY transaction_date DESC, id DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn for_employee(
        pool: &MySqlPool,
        employee_id: u64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EmployeeTransaction>(&format!(
            "{SELECT_TRANSACTION} WHERE employee_id = ? ORDER BY transaction_date DESC, id DESC"
        ))
        .bind(employee_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn balance_effect_follows_type() {
        let amount = Decimal::from(120);

        assert_eq!(TransactionType::Advance.balance_effect(amount), amount);
        assert_eq!(TransactionType::Repayment.balance_effect(amount), -amount);
        assert_eq!(TransactionType::SalaryDeduction.balance_effect(amount), -amount);
        assert_eq!(
            TransactionType::SalaryPayment.balance_effect(amount),
            Decimal::ZERO
        );
    }

    #[test]
    fn type_names_match_the_stored_values() {
        assert_eq!(TransactionType::SalaryDeduction.as_ref(), "salary_deduction");
        assert_eq!(
            TransactionType::from_str("salary_payment").unwrap(),
            TransactionType::SalaryPayment
        );
        assert_eq!(
            serde_json::from_str::<TransactionType>("\"repayment\"").unwrap(),
            TransactionType::Repayment
        );
        assert!(TransactionType::try_from("loan".to_string()).is_err());
    }

    #[test]
    fn payment_method_defaults_to_cash() {
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::try_from("check".to_string()).unwrap(), PaymentMethod::Check);
    }
}
