use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::employee::{Employee, EmployeeRole, EmployeeStatus},
    utils::{
        db_utils::{build_update_sql, execute_update},
        money::validate_money,
    },
};

const UPDATABLE_COLUMNS: &[&str] = &[
    "name",
    "phone",
    "email",
    "address",
    "national_id",
    "monthly_salary",
    "advance_limit",
    "hire_date",
    "role",
    "custom_role",
    "status",
];

const NON_NULL_COLUMNS: &[&str] = &["name", "phone", "role", "status"];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Karim Benali")]
    pub name: String,
    #[schema(example = "0550123456")]
    pub phone: String,
    #[schema(example = "karim@ba9alino.dz", format = "email", nullable = true)]
    pub email: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    #[schema(value_type = Option<f64>, example = 3000.0)]
    pub monthly_salary: Option<Decimal>,
    /// 0 or omitted means no ceiling
    #[schema(value_type = Option<f64>, example = 500.0)]
    pub advance_limit: Option<Decimal>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default = "default_role")]
    pub role: EmployeeRole,
    /// Required when role is `custom`
    pub custom_role: Option<String>,
    #[serde(default = "default_status")]
    pub status: EmployeeStatus,
}

fn default_role() -> EmployeeRole {
    EmployeeRole::DeliveryDriver
}

fn default_status() -> EmployeeStatus {
    EmployeeStatus::Active
}

/// Same fields as [`CreateEmployee`], all optional. Only used to type-check an update payload.
#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmployee {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub monthly_salary: Option<Decimal>,
    #[schema(value_type = Option<f64>)]
    pub advance_limit: Option<Decimal>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub hire_date: Option<NaiveDate>,
    pub role: Option<EmployeeRole>,
    pub custom_role: Option<String>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 20)]
    pub per_page: Option<u32>,
    /// Case-insensitive match on name or phone
    pub search: Option<String>,
    pub role: Option<EmployeeRole>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub admins: i64,
}

fn require_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Option<Decimal>) -> ApiResult<()> {
    match value {
        Some(v) if v < Decimal::ZERO => {
            Err(ApiError::bad_request(format!("{field} must not be negative")))
        }
        Some(v) => validate_money(field, v),
        None => Ok(()),
    }
}

fn require_custom_role(role: Option<EmployeeRole>, custom_role: Option<&str>) -> ApiResult<()> {
    if role == Some(EmployeeRole::Custom) && custom_role.is_none_or(|r| r.trim().is_empty()) {
        return Err(ApiError::bad_request(
            "custom_role is required when role is custom",
        ));
    }
    Ok(())
}

fn validate_new(payload: &CreateEmployee) -> ApiResult<()> {
    require_text("name", &payload.name)?;
    require_text("phone", &payload.phone)?;
    require_custom_role(Some(payload.role), payload.custom_role.as_deref())?;
    require_non_negative("monthly_salary", payload.monthly_salary)?;
    require_non_negative("advance_limit", payload.advance_limit)?;
    Ok(())
}

/// Type-checks a partial update and applies the same rules as creation
/// to whichever fields are present.
fn validate_update(body: &Value) -> ApiResult<&serde_json::Map<String, Value>> {
    let obj = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if let Some(column) = NON_NULL_COLUMNS
        .iter()
        .find(|c| obj.get(**c).is_some_and(Value::is_null))
    {
        return Err(ApiError::bad_request(format!("{column} cannot be null")));
    }

    let typed: UpdateEmployee = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::bad_request(format!("Invalid payload: {e}")))?;

    if let Some(name) = &typed.name {
        require_text("name", name)?;
    }
    if let Some(phone) = &typed.phone {
        require_text("phone", phone)?;
    }
    require_non_negative("monthly_salary", typed.monthly_salary)?;
    require_non_negative("advance_limit", typed.advance_limit)?;

    Ok(obj)
}

/// The custom role rule holds for the record as it will read after the update:
/// fields missing from the payload keep their stored value.
fn require_custom_role_after(existing: &Employee, fields: &Map<String, Value>) -> ApiResult<()> {
    let role: EmployeeRole = match fields.get("role").and_then(Value::as_str) {
        Some(role) => role
            .parse()
            .map_err(|_| ApiError::bad_request(format!("Unknown role '{role}'")))?,
        None => existing.role,
    };
    let custom_role = match fields.get("custom_role") {
        Some(value) => value.as_str(),
        None => existing.custom_role.as_deref(),
    };

    require_custom_role(Some(role), custom_role)
}

/// 1-based page, page size clamped to 1..=100, row offset. The offset is u64 so any u32 page fits.
fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    let offset = u64::from(page - 1) * u64::from(per_page);
    (page, per_page, offset)
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Create employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "phone is required"
        })),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;
    validate_new(&payload)?;

    // a custom label only makes sense on the custom role
    let custom_role = match payload.role {
        EmployeeRole::Custom => blank_to_none(&payload.custom_role),
        _ => None,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (name, phone, email, address, national_id, monthly_salary, advance_limit,
             hire_date, role, custom_role, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.phone.trim())
    .bind(blank_to_none(&payload.email))
    .bind(blank_to_none(&payload.address))
    .bind(blank_to_none(&payload.national_id))
    .bind(payload.monthly_salary)
    .bind(payload.advance_limit)
    .bind(payload.hire_date)
    .bind(payload.role.as_ref())
    .bind(custom_role)
    .bind(payload.status.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create employee");
        ApiError::Internal
    })?;

    let id = result.last_insert_id();
    info!(employee_id = id, created_by = auth.user_id, "Employee created");

    let employee = Employee::find(pool.get_ref(), id)
        .await?
        .ok_or(ApiError::Internal)?;

    Ok(HttpResponse::Created().json(employee))
}

/// List employees
#[utoipa::path(
    get,
    path = "/api/employee",
    params(
        ("page" = Option<u32>, Query, description = "Page number, starting at 1"),
        ("per_page" = Option<u32>, Query, description = "Items per page (1-100)"),
        ("search" = Option<String>, Query, description = "Search by name or phone"),
        ("role" = Option<EmployeeRole>, Query, description = "Filter by role"),
        ("status" = Option<EmployeeStatus>, Query, description = "Filter by status")
    ),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let (page, per_page, offset) = page_window(query.page, query.per_page);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(LOWER(name) LIKE ? OR LOWER(phone) LIKE ?)");
        let like = format!("%{}%", search.to_lowercase());
        bindings.push(like.clone());
        bindings.push(like);
    }

    if let Some(role) = query.role {
        conditions.push("role = ?");
        bindings.push(role.to_string());
    }

    if let Some(status) = query.status {
        conditions.push("status = ?");
        bindings.push(status.to_string());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count employees");
        ApiError::Internal
    })?;

    // ---------- data query ----------
    let data_sql = format!(
        r#"
        SELECT id, name, phone, email, address, national_id, monthly_salary, advance_limit,
               hire_date, role, custom_role, status, created_at, updated_at
        FROM employees
        {}
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        where_clause
    );
    debug!(page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page).bind(offset);

    let employees = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to fetch employees");
        ApiError::Internal
    })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Headcount by status, plus admins
#[utoipa::path(
    get,
    path = "/api/employee/stats",
    responses((status = 200, description = "Employee counters", body = EmployeeStats)),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn employee_stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let stats = sqlx::query_as::<_, EmployeeStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            CAST(COALESCE(SUM(status = 'active'), 0) AS SIGNED) AS active,
            CAST(COALESCE(SUM(status = 'inactive'), 0) AS SIGNED) AS inactive,
            CAST(COALESCE(SUM(role = 'admin'), 0) AS SIGNED) AS admins
        FROM employees
        "#,
    )
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(stats))
}

/// Update employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();
    let fields = validate_update(&body)?;

    let existing = Employee::find(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;
    require_custom_role_after(&existing, fields)?;

    let update = build_update_sql("employees", fields, UPDATABLE_COLUMNS, "id", employee_id)?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, employee_id, "Failed to update employee");
        ApiError::Internal
    })?;

    // deleted between the two reads
    let employee = Employee::find(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    info!(employee_id, updated_by = auth.user_id, "Employee updated");
    Ok(HttpResponse::Ok().json(employee))
}

/// Delete employee, together with the employee's transaction history
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to delete employee");
            ApiError::Internal
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Employee not found"));
    }

    info!(employee_id, deleted_by = auth.user_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Get employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let employee = Employee::find(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch employee");
            ApiError::Internal
        })?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}
