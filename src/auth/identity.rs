use serde::{Deserialize, Serialize};

/// Cached user profile returned by the login endpoint.
///
/// Fields the client does not interpret are kept in `extra` so the snapshot
/// round-trips through the store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    #[serde(default)]
    pub faculty_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_roles: Vec<UserRole>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One role assignment, optionally scoped to a college/department entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub role: RoleName,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleName {
    pub name: String,
}

impl Identity {
    /// Role names in lowercase, deduplicated, in assignment order.
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.user_roles.len());
        for assignment in &self.user_roles {
            let name = assignment.role.name.trim().to_ascii_lowercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Case-insensitive role membership check.
    pub fn has_role(&self, role: &str) -> bool {
        let wanted = role.trim().to_ascii_lowercase();
        self.role_names().iter().any(|name| *name == wanted)
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity_with_roles(roles: &[&str]) -> Identity {
        let user_roles: Vec<_> = roles
            .iter()
            .map(|name| json!({ "role": { "name": name }, "entity_type": "college", "entity_id": 1 }))
            .collect();
        serde_json::from_value(json!({
            "id": 7,
            "faculty_id": "F-007",
            "username": "jdelacruz",
            "first_name": "Juan",
            "last_name": "Dela Cruz",
            "email": "juan@example.edu",
            "phone": "0917",
            "user_roles": user_roles,
        }))
        .unwrap()
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let identity = identity_with_roles(&["DEAN"]);
        let raw = serde_json::to_value(&identity).unwrap();
        assert_eq!(raw["phone"], "0917");
        let back: Identity = serde_json::from_value(raw).unwrap();
        assert_eq!(back, identity);
    }

    #[test]
    fn role_names_are_lowercased_and_deduplicated() {
        let identity = identity_with_roles(&["DEAN", "Chairperson", "dean"]);
        assert_eq!(identity.role_names(), vec!["dean", "chairperson"]);
        assert!(identity.has_role("CHAIRPERSON"));
        assert!(!identity.has_role("admin"));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut identity = identity_with_roles(&[]);
        assert_eq!(identity.display_name(), "Juan Dela Cruz");
        identity.first_name.clear();
        identity.last_name.clear();
        assert_eq!(identity.display_name(), "jdelacruz");
    }

    #[test]
    fn missing_id_is_rejected() {
        let result = serde_json::from_value::<Identity>(json!({ "username": "x" }));
        assert!(result.is_err());
    }
}
