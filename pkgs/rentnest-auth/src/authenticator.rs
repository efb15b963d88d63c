//! Credential login and normalization of the login payload.
//!
//! The login endpoint has shipped several payload shapes over time. The user
//! object may sit under `user`, `landlord`, `tenant`, or be the body itself;
//! the token under `token` or `access_token`. The first non-null candidate in
//! that order wins. Some backend versions wrap all of it in a `data` envelope.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::models::Role;
use crate::session_store::SessionStore;
use crate::{AuthError, Result};

pub const USER_SHAPE_KEYS: [&str; 3] = ["user", "landlord", "tenant"];
pub const TOKEN_SHAPE_KEYS: [&str; 2] = ["token", "access_token"];

/// Canonical result of a successful login call
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user: Value,
    pub token: String,
    /// Role the backend stated outright; trusted as is when present
    pub role: Option<Role>,
    /// Role-specific payloads present in the response (`landlord`, `tenant`)
    pub role_payloads: Vec<(Role, Value)>,
}

impl AuthenticatedUser {
    /// More than one role payload and nothing saying which one applies.
    pub fn is_ambiguous(&self) -> bool {
        self.role.is_none() && self.role_payloads.len() > 1
    }

    pub fn candidates(&self) -> Vec<Role> {
        self.role_payloads.iter().map(|(role, _)| *role).collect()
    }
}

/// Extract `{user, token, role?}` from a login response body.
pub fn normalize_login_response(body: &Value) -> Result<AuthenticatedUser> {
    let body = unwrap_envelope(body);

    let token = TOKEN_SHAPE_KEYS
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidResponse("no token in login response".into()))?
        .to_string();

    let user = USER_SHAPE_KEYS
        .iter()
        .find_map(|key| body.get(key).filter(|v| !v.is_null()).cloned())
        .or_else(|| root_as_user(body))
        .ok_or_else(|| AuthError::InvalidResponse("no user in login response".into()))?;

    let role = embedded_role(body, &user);

    let role_payloads = [(Role::Landlord, "landlord"), (Role::Tenant, "tenant")]
        .iter()
        .filter_map(|(role, key)| {
            body.get(key)
                .filter(|v| v.is_object())
                .map(|payload| (*role, payload.clone()))
        })
        .collect();

    Ok(AuthenticatedUser {
        user,
        token,
        role,
        role_payloads,
    })
}

/// Descend into `data` when the credentials live there rather than at the root.
fn unwrap_envelope(body: &Value) -> &Value {
    let has_credentials = |value: &Value| {
        TOKEN_SHAPE_KEYS
            .iter()
            .chain(USER_SHAPE_KEYS.iter())
            .any(|key| value.get(key).is_some_and(|v| !v.is_null()))
    };
    match body.get("data") {
        Some(data) if data.is_object() && !has_credentials(body) && has_credentials(data) => data,
        _ => body,
    }
}

/// The body itself, minus the credential fields, when it is an object.
fn root_as_user(body: &Value) -> Option<Value> {
    let mut user = body.as_object()?.clone();
    for key in TOKEN_SHAPE_KEYS {
        user.remove(key);
    }
    Some(Value::Object(user))
}

fn embedded_role(body: &Value, user: &Value) -> Option<Role> {
    [body, user].iter().find_map(|value| {
        let raw = value.get("role").and_then(Value::as_str)?;
        let role = Role::parse(raw);
        if role.is_none() {
            debug!("Ignoring unrecognised embedded role '{}'", raw);
        }
        role
    })
}

/// Posts credentials and returns the normalized principal.
pub struct CredentialAuthenticator {
    api: Arc<dyn AuthApi>,
    sessions: SessionStore,
}

impl CredentialAuthenticator {
    pub fn new(api: Arc<dyn AuthApi>, sessions: SessionStore) -> Self {
        Self { api, sessions }
    }

    /// Log in with email and password.
    ///
    /// The stored session is wiped before the request goes out, so nothing
    /// from a previous account survives on the device whatever the outcome.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Please enter your email and password.".into(),
            ));
        }

        info!("Attempting login");
        self.sessions.wipe().await;

        let body = self.api.login(email, password).await?;
        let authenticated = normalize_login_response(&body).inspect_err(|e| {
            warn!("Login response rejected: {}", e);
        })?;

        info!(
            "Login accepted (embedded role: {})",
            authenticated
                .role
                .map(|r| r.as_str())
                .unwrap_or("none")
        );
        Ok(authenticated)
    }
}
