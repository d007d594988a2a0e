//! Authenticated identity and the profile row attached to it.

use serde::{Deserialize, Deserializer, Serialize};

use crm_core::UserId;

use crate::Role;

/// Bearer access token issued by the auth provider.
///
/// Every remote call made on behalf of a user carries it, so row-level
/// security on the remote store sees the caller.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// The authenticated user as known to the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: Option<String>,
}

/// One-to-one profile row (`profiles` table) for an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub prenom: String,
    #[serde(default = "default_role", deserialize_with = "lenient_role")]
    pub role: Role,
    #[serde(default)]
    pub fonction: Option<String>,
    #[serde(default)]
    pub telephone: Option<String>,
    #[serde(default)]
    pub statut: Option<String>,
    /// Server-held onboarding completion flag; the only source of truth for it.
    #[serde(default, deserialize_with = "null_as_false")]
    pub onboarding_completed: bool,
}

impl Profile {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.prenom.trim(), self.nom.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Partial update of a profile; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fonction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
}

fn default_role() -> Role {
    Role::User
}

fn lenient_role<'de, D: Deserializer<'de>>(d: D) -> Result<Role, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(Role::from_remote(raw.as_deref()))
}

fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_tolerates_nulls_from_the_store() {
        let id = UserId::new();
        let profile: Profile = serde_json::from_value(json!({
            "id": id,
            "email": "ana@exemple.fr",
            "nom": "Martin",
            "prenom": "Ana",
            "role": null,
            "onboarding_completed": null,
        }))
        .unwrap();

        assert_eq!(profile.role, Role::User);
        assert!(!profile.onboarding_completed);
        assert_eq!(profile.display_name(), "Ana Martin");
    }

    #[test]
    fn patch_omits_absent_fields() {
        let patch = ProfilePatch {
            onboarding_completed: Some(true),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "onboarding_completed": true }));
    }

    #[test]
    fn token_debug_does_not_leak() {
        let token = AccessToken::new("secret.jwt.value");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
