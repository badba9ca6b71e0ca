use chrono::NaiveDate;
use serde_json::{Map, Value};
use sqlx::MySqlPool;

use crate::error::ApiError;

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds `UPDATE <table> SET ... WHERE <id_column> = ?` from a JSON object.
///
/// Keys become column names, so every key must appear in `allowed_columns`;
/// anything else is a 400. Strings that look like `YYYY-MM-DD` bind as dates.
pub fn build_update_sql(
    table: &str,
    payload: &Map<String, Value>,
    allowed_columns: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    if payload.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    if let Some(unknown) = payload.keys().find(|k| !allowed_columns.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("Field '{unknown}' cannot be updated")));
    }

    let set_clause = payload
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(payload.len() + 1);

    for (key, value) in payload {
        let bound = match value {
            Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(d) => SqlValue::Date(d),
                Err(_) => SqlValue::String(s.clone()),
            },
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    SqlValue::U64(u)
                } else if let Some(i) = n.as_i64() {
                    SqlValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::F64(f)
                } else {
                    return Err(ApiError::bad_request(format!("Field '{key}' is not a valid number")));
                }
            }
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Null => SqlValue::Null,
            _ => {
                return Err(ApiError::bad_request(format!(
                    "Field '{key}' has an unsupported JSON type"
                )));
            }
        };
        values.push(bound);
    }

    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// Runs the update and returns the number of affected rows.
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[&str] = &["name", "hire_date", "monthly_salary", "email"];

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn builds_set_clause_and_typed_values() {
        let payload = object(json!({
            "name": "Yacine",
            "hire_date": "2024-02-01",
            "monthly_salary": 2500.5,
            "email": null
        }));

        let update = build_update_sql("employees", &payload, COLUMNS, "id", 12).unwrap();

        assert!(update.sql.starts_with("UPDATE employees SET "));
        assert!(update.sql.ends_with(" WHERE id = ?"));
        assert_eq!(update.sql.matches("= ?").count(), 5);
        assert_eq!(update.values.len(), 5);
        assert!(update.values.contains(&SqlValue::String("Yacine".into())));
        assert!(update.values.contains(&SqlValue::Date(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        )));
        assert!(update.values.contains(&SqlValue::F64(2500.5)));
        assert!(update.values.contains(&SqlValue::Null));
        assert_eq!(update.values.last(), Some(&SqlValue::U64(12)));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let payload = object(json!({ "name": "x", "id": 4 }));
        let err = build_update_sql("employees", &payload, COLUMNS, "id", 1).unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(ref m) if m.contains("'id'")));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(build_update_sql("employees", &Map::new(), COLUMNS, "id", 1).is_err());
    }

    #[test]
    fn nested_values_are_rejected() {
        let payload = object(json!({ "name": ["a", "b"] }));
        assert!(build_update_sql("employees", &payload, COLUMNS, "id", 1).is_err());
    }
}
