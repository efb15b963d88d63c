//! Session record and the request/response shapes around it

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::keys;

/// Principal classification. Exactly one per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Landlord,
    Tenant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Landlord => "landlord",
            Role::Tenant => "tenant",
        }
    }

    /// Lenient parse used on backend payloads and stored values.
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_ascii_lowercase().as_str() {
            "landlord" => Some(Role::Landlord),
            "tenant" => Some(Role::Tenant),
            _ => None,
        }
    }

    /// Storage key of this role's profile slot
    pub fn profile_key(&self) -> &'static str {
        match self {
            Role::Landlord => keys::LANDLORD_INFO,
            Role::Tenant => keys::TENANT_INFO,
        }
    }

    pub fn other(&self) -> Role {
        match self {
            Role::Landlord => Role::Tenant,
            Role::Tenant => Role::Landlord,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// The durable identity record of the signed-in principal.
///
/// `role_profile` is the full payload for `role`; holding a single role makes
/// it impossible to carry a landlord and a tenant profile at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub role: Role,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role_profile: Value,
    /// `false` when the role is a fallback rather than a resolved answer
    pub verified: bool,
}

impl Session {
    /// Build a session from a backend user payload.
    pub fn from_user(token: &str, role: Role, user: &Value, verified: bool) -> Self {
        Self {
            token: token.to_string(),
            role,
            user_id: first_text(user, &["_id", "id", "userId", "user_id"]).unwrap_or_default(),
            name: first_text(user, &["name", "fullName", "full_name"]).unwrap_or_default(),
            email: first_text(user, &["email"]).unwrap_or_default(),
            phone: first_text(user, &["phone", "phoneNumber", "phone_number"]).unwrap_or_default(),
            role_profile: if user.is_object() {
                user.clone()
            } else {
                Value::Object(Map::new())
            },
            verified,
        }
    }

    /// Compact role-agnostic copy stored under `user_info`.
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            id: self.user_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: self.role,
        }
    }
}

/// Generic user blob, the fallback when the role slot is unreadable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
}

/// Fields a user may edit on their profile screen. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.company.is_none()
    }
}

/// Reply to `POST /auth/resend-code`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendReply {
    #[serde(default)]
    pub resend_cooldown: Option<u32>,
    #[serde(default)]
    pub resend_count: Option<u32>,
}

/// First field in `keys` holding a string or number, as text.
pub(crate) fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
