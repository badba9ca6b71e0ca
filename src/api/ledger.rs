use actix_web::{HttpResponse, Responder, web};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    ledger::{
        MonthlySummary, NetSalaryPolicy, SalaryProfile, YearMonth, balance_of,
        compute_advance_balances, compute_monthly_summaries, compute_monthly_summaries_with,
        is_over_limit,
    },
    model::{employee::Employee, employee_transaction::EmployeeTransaction},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeBalance {
    pub employee_id: u64,
    pub name: String,
    #[schema(value_type = f64)]
    pub balance: Decimal,
    #[schema(value_type = f64)]
    pub advance_limit: Decimal,
    pub over_limit: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeMonthSummary {
    pub employee_id: u64,
    pub name: String,
    #[schema(value_type = f64)]
    pub monthly_salary: Decimal,
    pub summary: MonthlySummary,
    /// All-time balance, not limited to the month
    #[schema(value_type = f64)]
    pub balance: Decimal,
    pub over_limit: bool,
}

#[derive(Serialize, ToSchema)]
pub struct MonthSummaryResponse {
    #[schema(value_type = String, example = "2024-03")]
    pub month: YearMonth,
    pub include_repayments: bool,
    pub data: Vec<EmployeeMonthSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct MyLedgerResponse {
    #[schema(value_type = String, example = "2024-03")]
    pub month: YearMonth,
    pub employee: EmployeeMonthSummary,
    #[schema(value_type = f64)]
    pub advance_limit: Decimal,
    /// That month's transactions, most recent first
    pub transactions: Vec<EmployeeTransaction>,
}

#[derive(Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Defaults to the current month
    #[param(value_type = Option<String>, example = "2024-03")]
    pub month: Option<YearMonth>,
    /// Take repayments off the net salary (default true)
    pub include_repayments: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
pub struct MyLedgerQuery {
    #[param(value_type = Option<String>, example = "2024-03")]
    pub month: Option<YearMonth>,
}

async fn load_snapshot(pool: &MySqlPool) -> ApiResult<(Vec<Employee>, Vec<EmployeeTransaction>)> {
    let employees = Employee::all(pool).await.map_err(|e| {
        error!(error = %e, "Failed to fetch employees");
        ApiError::Internal
    })?;
    let transactions = EmployeeTransaction::all(pool).await.map_err(|e| {
        error!(error = %e, "Failed to fetch employee transactions");
        ApiError::Internal
    })?;

    debug!(
        employees = employees.len(),
        transactions = transactions.len(),
        "Loaded ledger snapshot"
    );
    Ok((employees, transactions))
}

fn balance_rows(employees: &[Employee], transactions: &[EmployeeTransaction]) -> Vec<EmployeeBalance> {
    let balances = compute_advance_balances(transactions);

    employees
        .iter()
        .map(|emp| {
            let balance = balance_of(&balances, emp.id);
            EmployeeBalance {
                employee_id: emp.id,
                name: emp.name.clone(),
                balance,
                advance_limit: emp.advance_limit(),
                over_limit: is_over_limit(balance, emp.advance_limit()),
            }
        })
        .collect()
}

fn summary_rows(
    employees: &[Employee],
    transactions: &[EmployeeTransaction],
    month: YearMonth,
    policy: NetSalaryPolicy,
) -> Vec<EmployeeMonthSummary> {
    let balances = compute_advance_balances(transactions);
    let summaries = compute_monthly_summaries_with(employees, transactions, month, policy);

    employees
        .iter()
        .map(|emp| {
            let balance = balance_of(&balances, emp.id);
            EmployeeMonthSummary {
                employee_id: emp.id,
                name: emp.name.clone(),
                monthly_salary: emp.monthly_salary(),
                summary: summaries.get(&emp.id).copied().unwrap_or_default(),
                balance,
                over_limit: is_over_limit(balance, emp.advance_limit()),
            }
        })
        .collect()
}

/// Outstanding advance balance of every employee
#[utoipa::path(
    get,
    path = "/api/ledger/balances",
    responses(
        (status = 200, description = "One row per employee, newest employee first", body = [EmployeeBalance]),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn balances(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let (employees, transactions) = load_snapshot(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(balance_rows(&employees, &transactions)))
}

/// Monthly salary summary of every employee
#[utoipa::path(
    get,
    path = "/api/ledger/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Totals and net salary per employee", body = MonthSummaryResponse),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let month = query.month.unwrap_or_else(YearMonth::current);
    let policy = NetSalaryPolicy {
        include_repayments: query
            .include_repayments
            .unwrap_or(NetSalaryPolicy::default().include_repayments),
    };

    let (employees, transactions) = load_snapshot(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(MonthSummaryResponse {
        month,
        include_repayments: policy.include_repayments,
        data: summary_rows(&employees, &transactions, month, policy),
    }))
}

/// Balance and month summary of the caller's own employee record
#[utoipa::path(
    get,
    path = "/api/me/ledger",
    params(MyLedgerQuery),
    responses(
        (status = 200, description = "Own ledger", body = MyLedgerResponse),
        (status = 403, description = "Account not linked to an employee"),
        (status = 404, description = "Linked employee no longer exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Ledger"
)]
pub async fn my_ledger(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyLedgerQuery>,
) -> ApiResult<impl Responder> {
    let employee_id = auth.require_employee_profile()?;
    let month = query.month.unwrap_or_else(YearMonth::current);

    let employee = Employee::find(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;
    let history = EmployeeTransaction::for_employee(pool.get_ref(), employee_id).await?;

    let advance_limit = employee.advance_limit();
    let balance = balance_of(&compute_advance_balances(&history), employee_id);
    let summaries = compute_monthly_summaries(std::slice::from_ref(&employee), &history, month);

    let row = EmployeeMonthSummary {
        employee_id,
        name: employee.name.clone(),
        monthly_salary: employee.monthly_salary(),
        summary: summaries.get(&employee_id).copied().unwrap_or_default(),
        balance,
        over_limit: is_over_limit(balance, advance_limit),
    };

    let transactions = history
        .into_iter()
        .filter(|t| month.contains(t.transaction_date))
        .collect();

    Ok(HttpResponse::Ok().json(MyLedgerResponse {
        month,
        employee: row,
        advance_limit,
        transactions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        employee::{EmployeeRole, EmployeeStatus},
        employee_transaction::{PaymentMethod, TransactionType},
    };
    use chrono::{NaiveDate, Utc};

    fn d(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn employee(id: u64, name: &str, salary: Option<i64>, limit: Option<i64>) -> Employee {
        Employee {
            id,
            name: name.into(),
            phone: "0550".into(),
            email: None,
            address: None,
            national_id: None,
            monthly_salary: salary.map(d),
            advance_limit: limit.map(d),
            hire_date: None,
            role: EmployeeRole::Stock,
            custom_role: None,
            status: EmployeeStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn txn(employee_id: u64, txn_type: TransactionType, on: &str, amount: i64) -> EmployeeTransaction {
        EmployeeTransaction {
            id: 0,
            employee_id,
            transaction_date: NaiveDate::parse_from_str(on, "%Y-%m-%d").unwrap(),
            transaction_type: txn_type,
            amount: Some(d(amount)),
            payment_method: PaymentMethod::Cash,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn snapshot() -> (Vec<Employee>, Vec<EmployeeTransaction>) {
        let employees = vec![
            employee(1, "Karim", Some(3000), Some(500)),
            employee(2, "Sofiane", None, None),
        ];
        let transactions = vec![
            txn(1, TransactionType::Advance, "2024-03-05", 200),
            txn(1, TransactionType::Repayment, "2024-03-20", 50),
            txn(1, TransactionType::SalaryDeduction, "2024-03-25", 100),
            txn(1, TransactionType::Advance, "2024-04-01", 600),
        ];
        (employees, transactions)
    }

    #[test]
    fn balances_cover_every_employee() {
        let (employees, transactions) = snapshot();
        let rows = balance_rows(&employees, &transactions);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].balance, d(650));
        assert!(rows[0].over_limit);
        assert_eq!(rows[1].balance, Decimal::ZERO);
        assert_eq!(rows[1].advance_limit, Decimal::ZERO);
        assert!(!rows[1].over_limit);
    }

    #[test]
    fn summary_is_scoped_to_the_month_but_balance_is_not() {
        let (employees, transactions) = snapshot();
        let march = "2024-03".parse().unwrap();
        let rows = summary_rows(&employees, &transactions, march, NetSalaryPolicy::default());

        let karim = &rows[0];
        assert_eq!(karim.summary.advances, d(200));
        assert_eq!(karim.summary.net_salary, d(2650));
        assert_eq!(karim.balance, d(650));

        // no salary on file reads as 0
        let sofiane = &rows[1];
        assert_eq!(sofiane.monthly_salary, Decimal::ZERO);
        assert_eq!(sofiane.summary, MonthlySummary::default());
    }

    #[test]
    fn summary_honours_the_repayment_policy() {
        let (employees, transactions) = snapshot();
        let march = "2024-03".parse().unwrap();
        let policy = NetSalaryPolicy {
            include_repayments: false,
        };

        let rows = summary_rows(&employees, &transactions, march, policy);
        assert_eq!(rows[0].summary.net_salary, d(2700));
    }

    #[test]
    fn summary_query_parses_month_and_flag() {
        let q: SummaryQuery = serde_json::from_value(serde_json::json!({
            "month": "2024-04",
            "include_repayments": false
        }))
        .unwrap();

        assert_eq!(q.month, YearMonth::new(2024, 4));
        assert_eq!(q.include_repayments, Some(false));
    }
}
