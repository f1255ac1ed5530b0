use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<Value>,
    pub user_metadata: Option<Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Application role. Supabase puts "authenticated" in the top-level
    /// `role` claim, so the metadata entries win when present.
    pub fn app_role(&self) -> Option<String> {
        let from_metadata = |meta: &Option<Value>| {
            meta.as_ref()
                .and_then(|m| m.get("role"))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        from_metadata(&self.app_metadata)
            .or_else(|| from_metadata(&self.user_metadata))
            .or_else(|| self.role.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn principal(&self) -> Result<Principal, AppError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;
        let role = self.role
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token carries no application role".to_string()))?
            .parse::<Role>()
            .map_err(AppError::Auth)?;

        Ok(Principal { id, role })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Professional,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Professional => write!(f, "professional"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "professional" => Ok(Role::Professional),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The authenticated actor an operation runs on behalf of. Built once at
/// the API boundary and passed explicitly into every service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is(&self, id: Uuid) -> bool {
        self.id == id
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(role: Option<&str>, app_metadata: Option<Value>) -> JwtClaims {
        JwtClaims {
            sub: Uuid::new_v4().to_string(),
            exp: None,
            email: None,
            role: role.map(str::to_string),
            app_metadata,
            user_metadata: None,
            aud: None,
            iat: None,
        }
    }

    #[test]
    fn metadata_role_takes_precedence() {
        let c = claims(Some("authenticated"), Some(json!({ "role": "professional" })));
        assert_eq!(c.app_role().as_deref(), Some("professional"));
    }

    #[test]
    fn top_level_role_used_without_metadata() {
        let c = claims(Some("admin"), None);
        assert_eq!(c.app_role().as_deref(), Some("admin"));
    }

    #[test]
    fn principal_requires_known_role() {
        let mut user = User {
            id: Uuid::new_v4().to_string(),
            email: None,
            role: Some("Patient".to_string()),
            metadata: None,
            created_at: None,
        };
        assert_eq!(user.principal().unwrap().role, Role::Patient);

        user.role = Some("authenticated".to_string());
        assert!(user.principal().is_err());
    }
}
