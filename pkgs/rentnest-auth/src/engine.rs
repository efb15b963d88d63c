//! Wiring of the login control flow: authenticate, settle the role, commit.

use rentnest_store::{KeyValueStore, SqliteKeyValueStore};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::account::AccountService;
use crate::api::AuthApi;
use crate::authenticator::CredentialAuthenticator;
use crate::http_api::HttpAuthApi;
use crate::lifecycle::SessionLifecycleMonitor;
use crate::models::{Role, Session};
use crate::role_resolver::RoleResolver;
use crate::session_store::SessionStore;
use crate::single_flight::SingleFlight;
use crate::verification::EmailVerificationFlow;
use crate::{AuthConfig, AuthError, Result};

/// Login that needs the user to pick a role before it can be committed.
///
/// Only the most recent login can be completed; any later `login` call, or
/// completing it once, makes it stale.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLogin {
    generation: u64,
    token: String,
    payloads: Vec<(Role, Value)>,
}

impl PendingLogin {
    pub fn candidates(&self) -> Vec<Role> {
        self.payloads.iter().map(|(role, _)| *role).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(Session),
    ChooseRole(PendingLogin),
}

pub struct SessionEngine {
    config: AuthConfig,
    api: Arc<dyn AuthApi>,
    sessions: SessionStore,
    authenticator: CredentialAuthenticator,
    resolver: RoleResolver,
    login_flight: SingleFlight,
    login_generation: AtomicU64,
}

impl SessionEngine {
    pub fn new(config: AuthConfig, api: Arc<dyn AuthApi>, kv: Arc<dyn KeyValueStore>) -> Self {
        let sessions = SessionStore::new(kv);
        Self {
            authenticator: CredentialAuthenticator::new(api.clone(), sessions.clone()),
            resolver: RoleResolver::new(api.clone()),
            login_flight: SingleFlight::new(),
            login_generation: AtomicU64::new(0),
            config,
            api,
            sessions,
        }
    }

    /// SQLite store and HTTP backend as configured.
    pub async fn open(config: AuthConfig) -> Result<Self> {
        let kv = SqliteKeyValueStore::open(&config.store_config()).await?;
        let api = HttpAuthApi::new(&config)?;
        Ok(Self::new(config, Arc::new(api), Arc::new(kv)))
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Cold-start restore of the persisted session.
    pub async fn restore(&self) -> Result<Option<Session>> {
        self.sessions.load().await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let _guard = self
            .login_flight
            .try_begin()
            .ok_or(AuthError::InFlight("login"))?;
        let generation = self.login_generation.fetch_add(1, Ordering::AcqRel) + 1;

        let authenticated = self.authenticator.login(email, password).await?;

        if let Some(role) = authenticated.role {
            let session = Session::from_user(&authenticated.token, role, &authenticated.user, true);
            self.sessions.commit(&session).await?;
            return Ok(LoginOutcome::Authenticated(session));
        }

        if authenticated.is_ambiguous() {
            info!("Login matches several roles, asking the user");
            return Ok(LoginOutcome::ChooseRole(PendingLogin {
                generation,
                token: authenticated.token,
                payloads: authenticated.role_payloads,
            }));
        }

        let resolution = self.resolver.resolve(&authenticated.token).await;
        let session = Session::from_user(
            &authenticated.token,
            resolution.role(),
            &authenticated.user,
            resolution.is_confident(),
        );
        self.sessions.commit(&session).await?;
        Ok(LoginOutcome::Authenticated(session))
    }

    /// Commit a [`LoginOutcome::ChooseRole`] login with the role the user picked.
    pub async fn complete_role_choice(&self, pending: PendingLogin, role: Role) -> Result<Session> {
        let _guard = self
            .login_flight
            .try_begin()
            .ok_or(AuthError::InFlight("login"))?;

        if pending.generation != self.login_generation.load(Ordering::Acquire) {
            warn!("Discarding role choice for a superseded login");
            return Err(AuthError::LoginSuperseded);
        }
        let Some((_, payload)) = pending.payloads.iter().find(|(r, _)| *r == role) else {
            return Err(AuthError::RoleAmbiguous(pending.candidates()));
        };

        let session = Session::from_user(&pending.token, role, payload, true);
        self.sessions.wipe().await;
        self.sessions.commit(&session).await?;
        self.login_generation.fetch_add(1, Ordering::AcqRel);
        Ok(session)
    }

    pub fn verification_flow(&self, email: &str) -> EmailVerificationFlow {
        EmailVerificationFlow::new(email, self.api.clone(), self.sessions.clone())
            .with_resend_limit(self.config.resend_limit)
    }

    pub fn account(&self) -> AccountService {
        AccountService::new(self.api.clone(), self.sessions.clone())
    }

    pub fn lifecycle_monitor(&self) -> SessionLifecycleMonitor {
        SessionLifecycleMonitor::new(Arc::new(self.sessions.clone()))
            .with_exit_window(self.config.exit_press_window())
    }
}
