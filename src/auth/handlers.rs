use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{ApiError, ApiResult, is_constraint_violation},
    model::{employee::Employee, role::Role},
    models::{LoginReqDto, TokenType, UserReq, UserSql},
};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Checks a new account request before anything touches the store.
fn validate_user_req(user: &UserReq) -> ApiResult<Role> {
    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(ApiError::bad_request(
            "Username and password must not be empty",
        ));
    }

    let role = Role::from_id(user.role_id)
        .ok_or_else(|| ApiError::bad_request("Unknown role_id"))?;

    if role.requires_employee_link() && user.employee_id.is_none() {
        return Err(ApiError::bad_request(
            "Employee and commercial accounts must be linked to an employee",
        ));
    }

    Ok(role)
}

/// Hashes the password and stores the account.
async fn insert_user(
    pool: &MySqlPool,
    username: &str,
    email: Option<&str>,
    password: &str,
    role: Role,
    employee_id: Option<u64>,
) -> ApiResult<u64> {
    let hashed = hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::Internal
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password, role_id, employee_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(hashed)
    .bind(role.id())
    .bind(role.requires_employee_link().then_some(employee_id).flatten())
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_id()),
        Err(e) if is_constraint_violation(&e) => {
            Err(ApiError::Conflict("Username or email already exists".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Create a user account (admin only)
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = UserReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully", "id": 2
        })),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Linked employee not found"),
        (status = 409, description = "Username or email already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn register(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    user: web::Json<UserReq>,
) -> ApiResult<impl Responder> {
    auth.require_admin()?;

    let role = validate_user_req(&user)?;

    if let Some(employee_id) = user.employee_id.filter(|_| role.requires_employee_link()) {
        if Employee::find(pool.get_ref(), employee_id).await?.is_none() {
            return Err(ApiError::not_found("Employee not found"));
        }
    }

    let email = user.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let id = insert_user(
        pool.get_ref(),
        user.username.trim(),
        email,
        &user.password,
        role,
        user.employee_id,
    )
    .await?;

    info!(user_id = id, role = %role, created_by = auth.user_id, "User account created");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "id": id
    })))
}

/// Creates the configured admin account when no account exists yet.
pub async fn ensure_bootstrap_admin(pool: &MySqlPool, config: &Config) -> ApiResult<()> {
    let Some((username, password)) = &config.bootstrap_admin else {
        return Ok(());
    };

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        debug!(existing, "Users present, skipping admin bootstrap");
        return Ok(());
    }

    insert_user(pool, username, None, password, Role::Admin, None).await?;
    info!(username = %username, "Bootstrap admin account created");
    Ok(())
}

/// Login with username or email
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<impl Responder> {
    info!("Login request received");

    let identifier = user.username.trim();
    if identifier.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(ApiError::bad_request("Username or password required"));
    }

    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE username = ? OR email = ?
        LIMIT 1
        "#,
    )
    .bind(identifier)
    .bind(identifier)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Database error while fetching user");
        ApiError::Internal
    })?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        invalid()
    })?;

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return Err(invalid());
    }

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid());
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        username: &db_user.username,
        role: db_user.role_id,
        employee_id: db_user.employee_id,
    };
    let pair = issue_pair(pool.get_ref(), &config, &subject).await?;

    // non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(pair))
}

/// Issues an access token and a refresh token, persisting the refresh token's jti.
async fn issue_pair(
    pool: &MySqlPool,
    config: &Config,
    subject: &TokenSubject<'_>,
) -> ApiResult<TokenPair> {
    let signing_failed = |e: jsonwebtoken::errors::Error| {
        error!(error = %e, "Failed to sign token");
        ApiError::Internal
    };

    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(signing_failed)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(signing_failed)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        ApiError::Internal
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<impl Responder> {
    let unauthorized = || ApiError::Unauthorized("Invalid refresh token".into());

    let token = bearer(&req).ok_or_else(unauthorized)?;
    let claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized())?;

    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized());
    }

    // Revoking first makes a replayed token lose the race.
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        info!(user_id = claims.user_id, "Refresh token unknown or already revoked");
        return Err(unauthorized());
    }

    let account = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .filter(|u| u.is_active)
    .ok_or_else(unauthorized)?;

    // role and employee link are re-read so changes apply at the next rotation
    let subject = TokenSubject {
        user_id: account.id,
        username: &account.username,
        role: account.role_id,
        employee_id: account.employee_id,
    };
    let pair = issue_pair(pool.get_ref(), &config, &subject).await?;

    Ok(HttpResponse::Ok().json(pair))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Always succeeds")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent: unknown or already revoked tokens are fine
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

/// Current session
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Caller's session context", body = AuthUser),
        (status = 401)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(auth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(username: &str, password: &str, role_id: u8, employee_id: Option<u64>) -> UserReq {
        UserReq {
            username: username.into(),
            email: None,
            password: password.into(),
            role_id,
            employee_id,
        }
    }

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(validate_user_req(&req("  ", "pw", 1, None)).is_err());
        assert!(validate_user_req(&req("admin", "", 1, None)).is_err());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(matches!(
            validate_user_req(&req("x", "pw", 7, None)),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn non_admin_accounts_need_an_employee() {
        assert!(validate_user_req(&req("x", "pw", 2, None)).is_err());
        assert!(validate_user_req(&req("x", "pw", 3, None)).is_err());
        assert_eq!(
            validate_user_req(&req("x", "pw", 3, Some(4))).unwrap(),
            Role::Commercial
        );
        assert_eq!(validate_user_req(&req("root", "pw", 1, None)).unwrap(), Role::Admin);
    }

    #[actix_web::test]
    async fn me_echoes_the_session() {
        use actix_web::{App, test};

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(crate::config::test_config()))
                .route("/me", web::get().to(me)),
        )
        .await;

        let token = generate_access_token(
            &TokenSubject {
                user_id: 1,
                username: "owner",
                role: 1,
                employee_id: None,
            },
            &crate::config::test_config().jwt_secret,
            60,
        )
        .unwrap();

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["username"], "owner");
        assert_eq!(body["role"], "admin");
        assert!(body["employee_id"].is_null());
    }
}
