//! Account operations around an established session

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::AuthApi;
use crate::models::{ProfileUpdate, RegisterRequest, Session};
use crate::session_store::SessionStore;
use crate::{AuthError, Result};

#[derive(Clone)]
pub struct AccountService {
    api: Arc<dyn AuthApi>,
    sessions: SessionStore,
}

impl AccountService {
    pub fn new(api: Arc<dyn AuthApi>, sessions: SessionStore) -> Self {
        Self { api, sessions }
    }

    /// Create an account. The caller continues with email verification; no
    /// session exists until the code is accepted.
    pub async fn register(&self, request: &RegisterRequest) -> Result<String> {
        for (label, value) in [
            ("name", &request.name),
            ("email", &request.email),
            ("password", &request.password),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::Validation(format!("Please enter your {}.", label)));
            }
        }

        info!("Registering new {} account", request.role);
        let body = self.api.register(request).await?;

        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Registration successful. Check your email for a verification code.")
            .to_string())
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        if current.is_empty() || new.is_empty() {
            return Err(AuthError::Validation(
                "Please fill in both password fields.".into(),
            ));
        }
        if current == new {
            return Err(AuthError::Validation(
                "The new password must differ from the current one.".into(),
            ));
        }

        let token = self.token().await?;
        self.api.change_password(&token, current, new).await?;
        info!("Password changed");
        Ok(())
    }

    /// Send a profile edit and mirror it into the stored session.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Session> {
        if update.is_empty() {
            return Err(AuthError::Validation("Nothing to update.".into()));
        }

        let token = self.token().await?;
        let body = self.api.update_profile(&token, update).await?;

        let echoed = ["user", "landlord", "tenant"]
            .iter()
            .find_map(|key| body.get(key).filter(|v| v.is_object()));
        self.sessions.apply_profile_update(update, echoed).await
    }

    pub async fn logout(&self) {
        info!("Logging out");
        self.sessions.wipe().await;
    }

    /// Delete the account server-side, then wipe locally. If the backend
    /// refuses, the session stays.
    pub async fn delete_account(&self) -> Result<()> {
        let token = self.token().await?;
        if let Err(e) = self.api.delete_account(&token).await {
            warn!("Account deletion rejected: {}", e);
            return Err(e);
        }

        info!("Account deleted");
        self.sessions.wipe().await;
        Ok(())
    }

    async fn token(&self) -> Result<String> {
        let session = match self.sessions.current() {
            Some(session) => Some(session),
            None => self.sessions.load().await?,
        };
        session
            .map(|s| s.token)
            .ok_or(AuthError::NotAuthenticated)
    }
}
