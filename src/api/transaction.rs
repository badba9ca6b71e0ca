use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    ledger::{
        AdvanceLimitWarning, SalaryProfile, YearMonth, balance_of, check_advance_limit,
        compute_advance_balances, projected_balance,
    },
    model::{
        employee::Employee,
        employee_transaction::{EmployeeTransaction, PaymentMethod, TransactionType},
    },
    utils::money::validate_money,
};

#[derive(Deserialize, ToSchema)]
pub struct CreateTransaction {
    pub transaction_type: TransactionType,
    /// Defaults to today (UTC)
    #[schema(example = "2024-03-05", format = "date", value_type = Option<String>)]
    pub transaction_date: Option<NaiveDate>,
    /// Strictly positive magnitude; the direction comes from the type
    #[schema(value_type = f64, example = 200.0)]
    pub amount: Decimal,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct TransactionQuery {
    /// Only transactions dated in this month (YYYY-MM)
    #[param(value_type = Option<String>, example = "2024-03")]
    pub month: Option<YearMonth>,
}

/// What recording a transaction would do to the advance balance.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceProjection {
    pub employee_id: u64,
    #[schema(value_type = f64)]
    pub current_balance: Decimal,
    #[schema(value_type = f64)]
    pub projected_balance: Decimal,
    /// 0 means no ceiling
    #[schema(value_type = f64)]
    pub advance_limit: Decimal,
    /// Set when an advance would exceed the limit. Never blocks the transaction.
    pub warning: Option<AdvanceLimitWarning>,
}

#[derive(Serialize, ToSchema)]
pub struct TransactionCreated {
    pub message: String,
    pub transaction_id: u64,
    pub projection: BalanceProjection,
}

#[derive(Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub employee_id: u64,
    #[schema(value_type = Option<String>, example = "2024-03")]
    pub month: Option<YearMonth>,
    pub data: Vec<EmployeeTransaction>,
}

fn validate_amount(amount: Decimal) -> ApiResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::bad_request("amount must be greater than zero"));
    }
    validate_money("amount", amount)
}

/// Recomputes the employee's balance from the full history and projects the new transaction onto it.
fn project(
    employee: &Employee,
    history: &[EmployeeTransaction],
    txn_type: TransactionType,
    amount: Decimal,
) -> BalanceProjection {
    let current = balance_of(&compute_advance_balances(history), employee.id);
    let limit = employee.advance_limit();

    BalanceProjection {
        employee_id: employee.id,
        current_balance: current,
        projected_balance: projected_balance(current, txn_type, amount),
        advance_limit: limit,
        warning: check_advance_limit(current, limit, txn_type, amount),
    }
}

async fn load_employee(pool: &MySqlPool, employee_id: u64) -> ApiResult<Employee> {
    Employee::find(pool, employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch employee");
            ApiError::Internal
        })?
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

async fn load_history(pool: &MySqlPool, employee_id: u64) -> ApiResult<Vec<EmployeeTransaction>> {
    EmployeeTransaction::for_employee(pool, employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch employee transactions");
            ApiError::Internal
        })
}

/// Record an employee transaction
///
/// An advance that takes the balance above the employee's limit is still
/// recorded; the response carries a warning instead.
#[utoipa::path(
    post,
    path = "/api/employee/{employee_id}/transactions",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = CreateTransaction,
    responses(
        (status = 201, description = "Transaction recorded", body = TransactionCreated),
        (status = 400, description = "Amount missing or not positive"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
#[instrument(skip(auth, pool, payload), fields(transaction_type = %payload.transaction_type))]
pub async fn create_transaction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateTransaction>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();
    validate_amount(payload.amount)?;

    let employee = load_employee(pool.get_ref(), employee_id).await?;
    let history = load_history(pool.get_ref(), employee_id).await?;
    let projection = project(&employee, &history, payload.transaction_type, payload.amount);

    if let Some(warning) = &projection.warning {
        warn!(
            employee_id,
            projected = %warning.projected_balance,
            limit = %warning.advance_limit,
            "Advance limit exceeded, recording anyway"
        );
    }

    let transaction_date = payload
        .transaction_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let notes = payload
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let result = sqlx::query(
        r#"
        INSERT INTO employee_transactions
            (employee_id, transaction_date, transaction_type, amount, payment_method, notes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(transaction_date)
    .bind(payload.transaction_type.as_ref())
    .bind(payload.amount)
    .bind(payload.payment_method.as_ref())
    .bind(notes)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to record employee transaction");
        ApiError::Internal
    })?;

    let transaction_id = result.last_insert_id();
    info!(
        employee_id,
        transaction_id,
        amount = %payload.amount,
        recorded_by = auth.user_id,
        "Employee transaction recorded"
    );

    Ok(HttpResponse::Created().json(TransactionCreated {
        message: "Transaction recorded".to_string(),
        transaction_id,
        projection,
    }))
}

/// Preview a transaction without recording it
#[utoipa::path(
    post,
    path = "/api/employee/{employee_id}/transactions/preview",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = CreateTransaction,
    responses(
        (status = 200, description = "Projected balance and advisory", body = BalanceProjection),
        (status = 400, description = "Amount missing or not positive"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn preview_transaction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateTransaction>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();
    validate_amount(payload.amount)?;

    let employee = load_employee(pool.get_ref(), employee_id).await?;
    let history = load_history(pool.get_ref(), employee_id).await?;

    Ok(HttpResponse::Ok().json(project(
        &employee,
        &history,
        payload.transaction_type,
        payload.amount,
    )))
}

/// Transaction history of one employee, most recent first
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}/transactions",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        TransactionQuery
    ),
    responses(
        (status = 200, description = "Transaction history", body = TransactionListResponse),
        (status = 400, description = "Malformed month"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Transactions"
)]
pub async fn list_transactions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<TransactionQuery>,
) -> ApiResult<impl Responder> {
    let employee_id = path.into_inner();

    // employees may read their own history
    if auth.employee_id != Some(employee_id) {
        auth.require_admin()?;
    }

    load_employee(pool.get_ref(), employee_id).await?;
    let mut data = load_history(pool.get_ref(), employee_id).await?;

    if let Some(month) = query.month {
        data.retain(|t| month.contains(t.transaction_date));
    }

    Ok(HttpResponse::Ok().json(TransactionListResponse {
        employee_id,
        month: query.month,
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::{EmployeeRole, EmployeeStatus};

    fn d(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn employee(limit: Option<i64>) -> Employee {
        Employee {
            id: 1,
            name: "Karim".into(),
            phone: "0550".into(),
            email: None,
            address: None,
            national_id: None,
            monthly_salary: Some(d(3000)),
            advance_limit: limit.map(d),
            hire_date: None,
            role: EmployeeRole::DeliveryDriver,
            custom_role: None,
            status: EmployeeStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn txn(txn_type: TransactionType, on: &str, amount: i64) -> EmployeeTransaction {
        EmployeeTransaction {
            id: 0,
            employee_id: 1,
            transaction_date: NaiveDate::parse_from_str(on, "%Y-%m-%d").unwrap(),
            transaction_type: txn_type,
            amount: Some(d(amount)),
            payment_method: PaymentMethod::Cash,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn history() -> Vec<EmployeeTransaction> {
        vec![
            txn(TransactionType::Advance, "2024-03-05", 200),
            txn(TransactionType::Repayment, "2024-03-20", 50),
            txn(TransactionType::SalaryDeduction, "2024-03-25", 100),
        ]
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(validate_amount(d(0)).is_err());
        assert!(validate_amount(d(-3)).is_err());
        assert!(validate_amount(Decimal::new(1, 2)).is_ok());
    }

    #[test]
    fn amount_must_fit_the_money_column() {
        // would be stored as 0.00
        assert!(validate_amount(Decimal::new(1, 3)).is_err());
        assert!(validate_amount(Decimal::new(100_000_000_000, 0)).is_err());
        assert!(validate_amount(Decimal::new(999_999_999_999, 2)).is_ok());
    }

    #[test]
    fn projection_warns_on_advance_over_limit() {
        let p = project(&employee(Some(500)), &history(), TransactionType::Advance, d(600));

        assert_eq!(p.current_balance, d(50));
        assert_eq!(p.projected_balance, d(650));
        assert_eq!(p.advance_limit, d(500));
        assert_eq!(p.warning.unwrap().excess, d(150));
    }

    #[test]
    fn projection_without_limit_never_warns() {
        let p = project(&employee(None), &history(), TransactionType::Advance, d(10_000));

        assert_eq!(p.advance_limit, Decimal::ZERO);
        assert!(p.warning.is_none());
    }

    #[test]
    fn repayment_projection_lowers_the_balance() {
        let p = project(&employee(Some(500)), &history(), TransactionType::Repayment, d(50));

        assert_eq!(p.projected_balance, d(0));
        assert!(p.warning.is_none());
    }

    #[test]
    fn payload_defaults_payment_method() {
        let payload: CreateTransaction = serde_json::from_value(serde_json::json!({
            "transaction_type": "advance",
            "amount": 120.5
        }))
        .unwrap();

        assert_eq!(payload.payment_method, PaymentMethod::Cash);
        assert!(payload.transaction_date.is_none());
        assert_eq!(payload.amount, Decimal::new(1205, 1));
    }

    #[test]
    fn month_query_rejects_malformed_values() {
        let ok: TransactionQuery = serde_json::from_value(serde_json::json!({ "month": "2024-03" })).unwrap();
        assert_eq!(ok.month, YearMonth::new(2024, 3));

        let bad = serde_json::from_value::<TransactionQuery>(serde_json::json!({ "month": "March" }));
        assert!(bad.is_err());
    }
}
