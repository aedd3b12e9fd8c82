// src/utils/role.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Fixed set of account roles. Stored as TEXT using the kebab-case wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Student,
    Mentor,
    Employee,
    Admin,
    SuperAdmin,
    Owner,
}

/// Admin console roles.
pub const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::SuperAdmin, Role::Owner];

/// Roles allowed to manage published content (blog, courses, current affairs, downloads).
pub const STAFF_ROLES: &[Role] = &[Role::Employee, Role::Admin, Role::SuperAdmin, Role::Owner];

/// Roles allowed to author quizzes and assign study tasks.
pub const MENTOR_ROLES: &[Role] = &[Role::Mentor, Role::Admin, Role::SuperAdmin, Role::Owner];

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Student,
        Role::Mentor,
        Role::Employee,
        Role::Admin,
        Role::SuperAdmin,
        Role::Owner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Mentor => "mentor",
            Role::Employee => "employee",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
            Role::Owner => "owner",
        }
    }

    /// Privilege level. Mentor and employee sit side by side.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Student => 0,
            Role::Mentor | Role::Employee => 1,
            Role::Admin => 2,
            Role::SuperAdmin => 3,
            Role::Owner => 4,
        }
    }

    pub fn is_any(&self, allowed: &[Role]) -> bool {
        allowed.contains(self)
    }

    /// Whether `self` may create, edit or delete an account holding `target`.
    /// The owner manages everyone; other roles only manage strictly lower ranks.
    pub fn can_manage(&self, target: Role) -> bool {
        *self == Role::Owner || self.rank() > target.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superadmin".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
        assert_eq!(json, "\"super-admin\"");
        let role: Role = serde_json::from_str("\"employee\"").unwrap();
        assert_eq!(role, Role::Employee);
    }

    #[test]
    fn management_hierarchy() {
        assert!(Role::Owner.can_manage(Role::Owner));
        assert!(Role::SuperAdmin.can_manage(Role::Admin));
        assert!(!Role::Admin.can_manage(Role::Admin));
        assert!(!Role::Admin.can_manage(Role::SuperAdmin));
        assert!(Role::Admin.can_manage(Role::Mentor));
        assert!(!Role::Mentor.can_manage(Role::Employee));
        assert!(!Role::Student.can_manage(Role::Student));
    }

    #[test]
    fn role_groups() {
        assert!(Role::Employee.is_any(STAFF_ROLES));
        assert!(!Role::Employee.is_any(ADMIN_ROLES));
        assert!(Role::Mentor.is_any(MENTOR_ROLES));
        assert!(!Role::Student.is_any(MENTOR_ROLES));
    }
}
