//! Advance balances and monthly salary summaries.
//!
//! Everything here is a pure function over a snapshot of the transaction log.
//! Nothing is cached: callers fetch the log and recompute on every read, so two
//! calls with the same input always give the same output.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::employee_transaction::{EmployeeTransaction, TransactionType};

/// The salary fields the aggregator reads from an employee record.
pub trait SalaryProfile {
    fn employee_id(&self) -> u64;
    fn monthly_salary(&self) -> Decimal;
    /// 0 means unlimited.
    fn advance_limit(&self) -> Decimal;
}

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidYearMonth(String);

impl fmt::Display for InvalidYearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid month {:?}, expected YYYY-MM", self.0)
    }
}

impl std::error::Error for InvalidYearMonth {}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(Utc::now().date_naive())
    }

    /// Same test as matching the date's ISO text against the `YYYY-MM-` prefix.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for YearMonth {
    type Err = InvalidYearMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidYearMonth(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;

        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = InvalidYearMonth;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Running advance balance per employee over the whole log:
/// Σ advance − Σ repayment − Σ salary_deduction.
///
/// Input order does not matter. An employee with at least one transaction of
/// any type gets an entry; everybody else is absent, which reads as 0 through
/// [`balance_of`].
pub fn compute_advance_balances(transactions: &[EmployeeTransaction]) -> BTreeMap<u64, Decimal> {
    let mut balances = BTreeMap::new();

    for txn in transactions {
        let balance = balances.entry(txn.employee_id).or_insert(Decimal::ZERO);
        *balance += txn.transaction_type.balance_effect(txn.amount());
    }

    balances
}

pub fn balance_of(balances: &BTreeMap<u64, Decimal>, employee_id: u64) -> Decimal {
    balances.get(&employee_id).copied().unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthlySummary {
    #[schema(value_type = f64)]
    pub advances: Decimal,
    #[schema(value_type = f64)]
    pub repayments: Decimal,
    #[schema(value_type = f64)]
    pub salary_deductions: Decimal,
    /// Recorded for display, never netted against the salary.
    #[schema(value_type = f64)]
    pub salary_payments: Decimal,
    #[schema(value_type = f64)]
    pub net_salary: Decimal,
}

impl MonthlySummary {
    fn add(&mut self, txn_type: TransactionType, amount: Decimal) {
        match txn_type {
            TransactionType::Advance => self.advances += amount,
            TransactionType::Repayment => self.repayments += amount,
            TransactionType::SalaryDeduction => self.salary_deductions += amount,
            TransactionType::SalaryPayment => self.salary_payments += amount,
        }
    }
}

/// Which movements are taken off the base salary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetSalaryPolicy {
    pub include_repayments: bool,
}

impl Default for NetSalaryPolicy {
    fn default() -> Self {
        Self {
            include_repayments: true,
        }
    }
}

impl NetSalaryPolicy {
    pub fn net_salary(&self, monthly_salary: Decimal, summary: &MonthlySummary) -> Decimal {
        let mut net = monthly_salary - summary.salary_deductions - summary.advances;
        if self.include_repayments {
            net -= summary.repayments;
        }
        net
    }
}

/// Per-employee totals for `month` with the default policy:
/// net_salary = monthly_salary − salary_deductions − repayments − advances.
pub fn compute_monthly_summaries<E: SalaryProfile>(
    employees: &[E],
    transactions: &[EmployeeTransaction],
    month: YearMonth,
) -> BTreeMap<u64, MonthlySummary> {
    compute_monthly_summaries_with(employees, transactions, month, NetSalaryPolicy::default())
}

/// Every employee in `employees` gets an entry, zeroed when nothing falls in
/// the month. Transactions for employees missing from the list are ignored.
pub fn compute_monthly_summaries_with<E: SalaryProfile>(
    employees: &[E],
    transactions: &[EmployeeTransaction],
    month: YearMonth,
    policy: NetSalaryPolicy,
) -> BTreeMap<u64, MonthlySummary> {
    let mut by_employee: BTreeMap<u64, MonthlySummary> = BTreeMap::new();

    for txn in transactions
        .iter()
        .filter(|t| month.contains(t.transaction_date))
    {
        by_employee
            .entry(txn.employee_id)
            .or_default()
            .add(txn.transaction_type, txn.amount());
    }

    employees
        .iter()
        .map(|emp| {
            let mut summary = by_employee
                .get(&emp.employee_id())
                .copied()
                .unwrap_or_default();
            summary.net_salary = policy.net_salary(emp.monthly_salary(), &summary);
            (emp.employee_id(), summary)
        })
        .collect()
}

/// Balance after applying one more transaction.
pub fn projected_balance(current: Decimal, txn_type: TransactionType, amount: Decimal) -> Decimal {
    current + txn_type.balance_effect(amount)
}

pub fn is_over_limit(balance: Decimal, advance_limit: Decimal) -> bool {
    advance_limit > Decimal::ZERO && balance > advance_limit
}

/// Raised when a new advance would take the balance above the employee's ceiling.
/// Advisory only: the transaction is still recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct AdvanceLimitWarning {
    #[schema(value_type = f64)]
    pub current_balance: Decimal,
    #[schema(value_type = f64)]
    pub projected_balance: Decimal,
    #[schema(value_type = f64)]
    pub advance_limit: Decimal,
    #[schema(value_type = f64)]
    pub excess: Decimal,
}

impl fmt::Display for AdvanceLimitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "advance limit exceeded: balance would be {} against a limit of {}",
            self.projected_balance, self.advance_limit
        )
    }
}

/// Only advances trigger the check, and only when a limit is set.
pub fn check_advance_limit(
    current_balance: Decimal,
    advance_limit: Decimal,
    txn_type: TransactionType,
    amount: Decimal,
) -> Option<AdvanceLimitWarning> {
    if txn_type != TransactionType::Advance {
        return None;
    }

    let projected = projected_balance(current_balance, txn_type, amount);
    is_over_limit(projected, advance_limit).then(|| AdvanceLimitWarning {
        current_balance,
        projected_balance: projected,
        advance_limit,
        excess: projected - advance_limit,
    })
}
