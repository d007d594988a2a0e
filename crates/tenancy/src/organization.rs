use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crm_auth::Role;
use crm_core::{DomainResult, OrganizationId, RecordId, UserId, Validate, validate};

/// Tenant container; every tenant-scoped row points at one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

/// Row linking a user to their (single) organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: RecordId,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    #[serde(default = "member_role", deserialize_with = "lenient_role")]
    pub role: Role,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

/// Membership together with the organization it points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOrganization {
    pub organization: Organization,
    pub membership: Membership,
}

impl ResolvedOrganization {
    pub fn id(&self) -> OrganizationId {
        self.organization.id
    }
}

/// Organization fields editable from the onboarding flow and settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Validate for OrganizationPatch {
    fn validate(&self) -> DomainResult<()> {
        validate::non_empty_if_present("name", self.name.as_deref())
    }
}

fn member_role() -> Role {
    Role::User
}

fn lenient_role<'de, D: Deserializer<'de>>(d: D) -> Result<Role, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(Role::from_remote(raw.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_is_rejected_but_absent_name_is_fine() {
        let patch = OrganizationPatch {
            name: Some("  ".to_string()),
            description: None,
        };
        assert!(patch.validate().is_err());
        assert!(OrganizationPatch::default().validate().is_ok());
    }

    #[test]
    fn owner_membership_role_parses() {
        let m: Membership = serde_json::from_value(serde_json::json!({
            "id": RecordId::new(),
            "organization_id": OrganizationId::new(),
            "user_id": UserId::new(),
            "role": "owner",
        }))
        .unwrap();
        assert_eq!(m.role, Role::Owner);
    }
}
