use crate::api::employee::{
    CreateEmployee, EmployeeListResponse, EmployeeStats, UpdateEmployee,
};
use crate::api::ledger::{EmployeeBalance, EmployeeMonthSummary, MonthSummaryResponse, MyLedgerResponse};
use crate::api::transaction::{
    BalanceProjection, CreateTransaction, TransactionCreated, TransactionListResponse,
};
use crate::auth::auth::AuthUser;
use crate::auth::handlers::TokenPair;
use crate::ledger::{AdvanceLimitWarning, MonthlySummary};
use crate::model::employee::{Employee, EmployeeRole, EmployeeStatus};
use crate::model::employee_transaction::{EmployeeTransaction, PaymentMethod, TransactionType};
use crate::model::role::Role;
use crate::models::{LoginReqDto, UserReq};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ba9alino HR API",
        version = "1.0.0",
        description = r#"
## Employee advances and salaries

Tracks cash advances handed to employees, their repayments and salary
deductions, and derives from that log:

- the **outstanding advance balance** of each employee
- a **monthly summary** with the resulting net salary

Recording an advance that takes an employee above their advance limit is
allowed; the response carries a warning instead of an error.

### Security
Endpoints under `/api` need a **JWT Bearer** access token. Most of them are
reserved to admins; employees can read their own ledger through `/api/me/ledger`.

### Money
Amounts are decimal numbers in the shop's currency.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::register,
        crate::auth::handlers::me,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::employee_stats,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::transaction::create_transaction,
        crate::api::transaction::preview_transaction,
        crate::api::transaction::list_transactions,

        crate::api::ledger::balances,
        crate::api::ledger::summary,
        crate::api::ledger::my_ledger
    ),
    components(
        schemas(
            LoginReqDto,
            UserReq,
            TokenPair,
            AuthUser,
            Role,
            CreateEmployee,
            UpdateEmployee,
            Employee,
            EmployeeRole,
            EmployeeStatus,
            EmployeeListResponse,
            EmployeeStats,
            CreateTransaction,
            TransactionType,
            PaymentMethod,
            EmployeeTransaction,
            BalanceProjection,
            TransactionCreated,
            TransactionListResponse,
            AdvanceLimitWarning,
            MonthlySummary,
            EmployeeBalance,
            EmployeeMonthSummary,
            MonthSummaryResponse,
            MyLedgerResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and user accounts"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Transactions", description = "Advances, repayments and salary movements"),
        (name = "Ledger", description = "Advance balances and monthly salary summaries"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_ledger_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/auth/login",
            "/api/employee/{employee_id}/transactions",
            "/api/employee/{employee_id}/transactions/preview",
            "/api/ledger/balances",
            "/api/ledger/summary",
            "/api/me/ledger",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
