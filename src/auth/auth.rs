use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

/// Session context of the caller, rebuilt from the bearer token on every request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        if claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".into()))
        }
    }

    /// The employee record this account acts for.
    pub fn require_employee_profile(&self) -> Result<u64, ApiError> {
        self.employee_id
            .ok_or_else(|| ApiError::Forbidden("No employee profile".into()))
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // already resolved by auth_middleware inside the protected scope
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ApiError::Unauthorized("Missing token".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                tracing::error!("Config missing from app data");
                return ready(Err(ApiError::Internal));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ApiError::Unauthorized("Invalid token".into()))),
        };

        ready(AuthUser::from_claims(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: u8, token_type: TokenType, employee_id: Option<u64>) -> Claims {
        Claims {
            user_id: 3,
            sub: "amina".into(),
            role,
            exp: usize::MAX,
            jti: "jti".into(),
            token_type,
            employee_id,
        }
    }

    #[test]
    fn refresh_tokens_cannot_open_a_session() {
        assert!(AuthUser::from_claims(claims(1, TokenType::Refresh, None)).is_err());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(AuthUser::from_claims(claims(42, TokenType::Access, None)).is_err());
    }

    #[test]
    fn admin_and_employee_checks() {
        let admin = AuthUser::from_claims(claims(1, TokenType::Access, None)).unwrap();
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_employee_profile().is_err());

        let employee = AuthUser::from_claims(claims(2, TokenType::Access, Some(9))).unwrap();
        assert!(matches!(employee.require_admin(), Err(ApiError::Forbidden(_))));
        assert_eq!(employee.require_employee_profile().unwrap(), 9);
    }
}
