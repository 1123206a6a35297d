use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};

/// Who the signed-in principal is to the console.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// The lab owner account. Sees and reaches every page.
    Owner,
    /// A staff account, limited to its permission set.
    Staff,
}

/// Unordered set of permission strings such as `manage-package`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn insert(&mut self, permission: impl Into<String>) -> bool {
        self.0.insert(permission.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The authenticated identity as returned by the lab backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Staff record attached to a principal; carries the permission list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaffProfile {
    pub id: String,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// Role plus permissions: everything the access gate looks at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessProfile {
    pub role: Role,
    pub permissions: PermissionSet,
    /// Set when the backend named the role instead of it being inferred
    #[serde(default)]
    pub role_explicit: bool,
}

impl AccessProfile {
    pub fn owner() -> Self {
        Self {
            role: Role::Owner,
            permissions: PermissionSet::new(),
            role_explicit: true,
        }
    }

    pub fn staff(permissions: PermissionSet) -> Self {
        Self {
            role: Role::Staff,
            permissions,
            role_explicit: false,
        }
    }

    /// Derive the profile for a fresh sign-in.
    ///
    /// An explicit role from the backend always wins. Without one, the
    /// legacy rule applies when enabled: an empty permission set marks the
    /// owner account. With the rule disabled such an account is plain staff
    /// and reaches only ungated pages.
    pub fn resolve(
        explicit_role: Option<Role>,
        staff: Option<&StaffProfile>,
        legacy_owner_inference: bool,
    ) -> Self {
        let permissions = staff.map(|s| s.permissions.clone()).unwrap_or_default();

        let role = explicit_role.unwrap_or(if legacy_owner_inference && permissions.is_empty() {
            Role::Owner
        } else {
            Role::Staff
        });

        Self {
            role,
            permissions,
            role_explicit: explicit_role.is_some(),
        }
    }

    /// Re-derive the profile from a fresh backend read of the staff record.
    ///
    /// A role the backend names now wins. Otherwise a previously explicit
    /// role is kept and only the permissions move; an inferred role is
    /// inferred again.
    pub fn refreshed(
        &self,
        explicit_role: Option<Role>,
        staff: Option<&StaffProfile>,
        legacy_owner_inference: bool,
    ) -> Self {
        match (explicit_role, self.role_explicit) {
            (None, true) => Self {
                role: self.role,
                permissions: staff.map(|s| s.permissions.clone()).unwrap_or_default(),
                role_explicit: true,
            },
            _ => Self::resolve(explicit_role, staff, legacy_owner_inference),
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    pub fn allows(&self, permission: &str) -> bool {
        self.is_owner() || self.permissions.contains(permission)
    }
}

/// Sign-in form input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// What a successful backend sign-in hands back to the console.
#[derive(Debug, Clone)]
pub struct SignInGrant {
    pub principal: Principal,
    pub staff: Option<StaffProfile>,
    pub bearer_token: String,
    pub role: Option<Role>,
}

/// Partial update of the signed-in user's own profile fields. `None`
/// fields are left as they are. Access data never travels this way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UserUpdate {
    pub fn apply_to(&self, principal: &mut Principal) {
        if let Some(name) = &self.name {
            principal.name = name.clone();
        }
        if let Some(email) = &self.email {
            principal.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            principal.phone = Some(phone.clone());
        }
        if let Some(avatar) = &self.avatar {
            principal.avatar = Some(avatar.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn staff_with(permissions: &[&str]) -> StaffProfile {
        StaffProfile {
            id: "staff-1".to_string(),
            designation: Some("Phlebotomist".to_string()),
            permissions: permissions.iter().copied().collect(),
        }
    }

    #[test]
    fn test_permission_set_membership() {
        let set: PermissionSet = ["manage-package", "manage-test"].into_iter().collect();

        assert!(set.contains("manage-package"));
        assert!(!set.contains("manage-staff"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_permission_set_serializes_as_array() {
        let set: PermissionSet = ["b", "a"].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
    }

    #[test]
    fn test_resolve_legacy_empty_set_is_owner() {
        let staff = staff_with(&[]);
        let profile = AccessProfile::resolve(None, Some(&staff), true);
        assert!(profile.is_owner());

        let profile = AccessProfile::resolve(None, None, true);
        assert!(profile.is_owner());
    }

    #[test]
    fn test_resolve_without_legacy_inference_is_staff() {
        let staff = staff_with(&[]);
        let profile = AccessProfile::resolve(None, Some(&staff), false);
        assert_eq!(profile.role, Role::Staff);
        assert!(!profile.allows("manage-package"));
    }

    #[test]
    fn test_resolve_explicit_role_wins() {
        let staff = staff_with(&[]);
        let profile = AccessProfile::resolve(Some(Role::Staff), Some(&staff), true);
        assert_eq!(profile.role, Role::Staff);

        let staff = staff_with(&["manage-package"]);
        let profile = AccessProfile::resolve(Some(Role::Owner), Some(&staff), false);
        assert!(profile.is_owner());
    }

    #[test]
    fn test_resolve_records_role_origin() {
        let staff = staff_with(&["manage-test"]);
        assert!(AccessProfile::resolve(Some(Role::Owner), Some(&staff), false).role_explicit);
        assert!(!AccessProfile::resolve(None, Some(&staff), true).role_explicit);
    }

    #[test]
    fn test_refreshed_keeps_explicit_owner() {
        let staff = staff_with(&["manage-test"]);
        let owner = AccessProfile::resolve(Some(Role::Owner), Some(&staff), false);

        let next = owner.refreshed(None, Some(&staff_with(&["manage-package"])), false);
        assert!(next.is_owner());
        assert!(next.role_explicit);
        assert!(next.permissions.contains("manage-package"));
    }

    #[test]
    fn test_refreshed_reinfers_inferred_role() {
        let owner = AccessProfile::resolve(None, Some(&staff_with(&[])), true);
        assert!(owner.is_owner());

        let next = owner.refreshed(None, Some(&staff_with(&["manage-package"])), true);
        assert_eq!(next.role, Role::Staff);

        let demoted = owner.refreshed(Some(Role::Staff), Some(&staff_with(&[])), true);
        assert_eq!(demoted.role, Role::Staff);
    }

    #[test]
    fn test_access_profile_without_origin_field_deserializes() {
        let profile: AccessProfile =
            serde_json::from_str(r#"{"role":"owner","permissions":[]}"#).unwrap();
        assert!(profile.is_owner());
        assert!(!profile.role_explicit);
    }

    #[test]
    fn test_staff_allows_only_its_permissions() {
        let staff = staff_with(&["manage-package"]);
        let profile = AccessProfile::resolve(None, Some(&staff), true);

        assert_eq!(profile.role, Role::Staff);
        assert!(profile.allows("manage-package"));
        assert!(!profile.allows("manage-staff"));
    }

    #[test]
    fn test_role_string_forms() {
        assert_eq!(Role::Owner.to_string(), "owner");
        assert_eq!(Role::from_str("staff").unwrap(), Role::Staff);
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), r#""owner""#);
    }

    #[test]
    fn test_user_update_applies_present_fields() {
        let mut principal = Principal {
            id: "u1".to_string(),
            name: "Asha".to_string(),
            email: "asha@lab.example".to_string(),
            phone: None,
            avatar: None,
        };

        let update = UserUpdate {
            name: Some("Asha R".to_string()),
            phone: Some("+91 90000 00000".to_string()),
            ..Default::default()
        };
        update.apply_to(&mut principal);

        assert_eq!(principal.name, "Asha R");
        assert_eq!(principal.email, "asha@lab.example");
        assert_eq!(principal.phone.as_deref(), Some("+91 90000 00000"));
    }
}
