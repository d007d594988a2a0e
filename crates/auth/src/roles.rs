use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role assigned to a user within their organization.
///
/// Roles form a total order by [`Role::rank`]; privilege checks compare ranks,
/// never names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Manager,
    Admin,
    /// Organization owner; outranks `admin` (billing is restricted to admin and above).
    Owner,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Manager, Role::Admin, Role::Owner];

    pub fn rank(self) -> u8 {
        match self {
            Role::User => 1,
            Role::Manager => 2,
            Role::Admin => 3,
            Role::Owner => 4,
        }
    }

    /// Whether a holder of `self` satisfies a minimum `required` role.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Parse a role coming from the remote store.
    ///
    /// Unknown or missing values degrade to the lowest rank.
    pub fn from_remote(value: Option<&str>) -> Role {
        value.and_then(|v| v.parse().ok()).unwrap_or(Role::User)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    #[test]
    fn manager_does_not_satisfy_admin() {
        assert!(!Role::Manager.satisfies(Role::Admin));
        assert!(Role::Admin.satisfies(Role::Manager));
        assert!(Role::Owner.satisfies(Role::Admin));
    }

    #[test]
    fn remote_values_parse_leniently() {
        assert_eq!(Role::from_remote(Some("Admin")), Role::Admin);
        assert_eq!(Role::from_remote(Some("superuser")), Role::User);
        assert_eq!(Role::from_remote(None), Role::User);
    }

    proptest! {
        #[test]
        fn satisfies_iff_rank_at_least(assigned in any_role(), required in any_role()) {
            prop_assert_eq!(assigned.satisfies(required), assigned.rank() >= required.rank());
        }

        #[test]
        fn ranks_are_a_total_order(a in any_role(), b in any_role()) {
            prop_assert!(a.satisfies(b) || b.satisfies(a));
            if a.satisfies(b) && b.satisfies(a) {
                prop_assert_eq!(a, b);
            }
        }
    }
}
