use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Account role, stored as `users.role_id` and carried in the JWT claims.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Employee = 2,
    Commercial = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Employee),
            3 => Some(Role::Commercial),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Non-admin accounts act on behalf of an employee record.
    pub fn requires_employee_link(self) -> bool {
        self != Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn ids_round_trip() {
        for role in [Role::Admin, Role::Employee, Role::Commercial] {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn parses_lowercase_names() {
        assert_eq!(Role::from_str("commercial").unwrap(), Role::Commercial);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!(Role::from_str("hr").is_err());
    }

    #[test]
    fn only_admin_is_unlinked() {
        assert!(!Role::Admin.requires_employee_link());
        assert!(Role::Employee.requires_employee_link());
        assert!(Role::Commercial.requires_employee_link());
    }
}
