use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::ledger::SalaryProfile;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmployeeRole {
    Admin,
    Commercial,
    Stock,
    TruckDriver,
    DeliveryDriver,
    Custom,
}

impl TryFrom<String> for EmployeeRole {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl TryFrom<String> for EmployeeStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Karim Benali",
        "phone": "0550123456",
        "email": null,
        "address": "Oran",
        "national_id": null,
        "monthly_salary": 3000.0,
        "advance_limit": 500.0,
        "hire_date": "2024-01-01",
        "role": "delivery_driver",
        "custom_role": null,
        "status": "active",
        "created_at": "2024-01-01T08:00:00Z",
        "updated_at": "2024-01-01T08:00:00Z"
    })
)]
pub struct Employee {
    pub id: u64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,

    #[schema(value_type = Option<f64>, example = 3000.0)]
    pub monthly_salary: Option<Decimal>,

    /// 0 or null means no ceiling
    #[schema(value_type = Option<f64>, example = 500.0)]
    pub advance_limit: Option<Decimal>,

    #[schema(value_type = Option<String>, format = "date", example = "2024-01-01")]
    pub hire_date: Option<NaiveDate>,

    #[sqlx(try_from = "String")]
    pub role: EmployeeRole,
    pub custom_role: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: EmployeeStatus,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl SalaryProfile for Employee {
    fn employee_id(&self) -> u64 {
        self.id
    }

    fn monthly_salary(&self) -> Decimal {
        self.monthly_salary.unwrap_or_default()
    }

    fn advance_limit(&self) -> Decimal {
        self.advance_limit.unwrap_or_default()
    }
}

const SELECT_EMPLOYEE: &str = r#"
    SELECT id, name, phone, email, address, national_id, monthly_salary, advance_limit,
           hire_date, role, custom_role, status, created_at, updated_at
    FROM employees
"#;

impl Employee {
    pub async fn find(pool: &MySqlPool, id: u64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Employee>(&format!("{SELECT_EMPLOYEE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Every employee, newest first.
    pub async fn all(pool: &MySqlPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Employee>(&format!("{SELECT_EMPLOYEE} ORDER BY created_at DESC, id DESC"))
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn roles_use_snake_case_names() {
        assert_eq!(
            EmployeeRole::from_str("truck_driver").unwrap(),
            EmployeeRole::TruckDriver
        );
        assert_eq!(EmployeeRole::DeliveryDriver.as_ref(), "delivery_driver");
        assert_eq!(
            serde_json::to_value(EmployeeRole::Custom).unwrap(),
            serde_json::json!("custom")
        );
        assert!(EmployeeRole::try_from("driver".to_string()).is_err());
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(
            EmployeeStatus::try_from("inactive".to_string()).unwrap(),
            EmployeeStatus::Inactive
        );
        assert_eq!(EmployeeStatus::Active.to_string(), "active");
    }
}
