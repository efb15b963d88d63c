//! Client-side identity and session lifecycle for the Rentnest property app
//!
//! Turns a raw login response into a durable, typed local session, settles
//! whether the principal is a landlord or a tenant, keeps that session across
//! restarts, and tears it down on logout, account deletion, or application
//! termination (but not on plain backgrounding).
//!
//! ## Architecture
//!
//! - **authenticator**: `CredentialAuthenticator`, login and payload normalization
//! - **role_resolver**: `RoleResolver`, the probe cascade with a tenant fallback
//! - **session_store**: `SessionStore`, the fixed key schema over a `KeyValueStore`
//! - **lifecycle**: `SessionLifecycleMonitor`, termination detection and teardown
//! - **verification**: `EmailVerificationFlow`, OTP entry, submit, and resend
//! - **account**: `AccountService`, registration, password, profile, deletion
//! - **engine**: `SessionEngine`, the login control flow tying the above together
//! - **api** / **http_api**: backend contract and its reqwest implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rentnest_auth::{AuthConfig, LoginOutcome, SessionEngine};
//!
//! # async fn example() -> rentnest_auth::Result<()> {
//! rentnest_auth::logging::init_tracing("rentnest_auth=info");
//! let engine = SessionEngine::open(AuthConfig::from_env()).await?;
//!
//! if engine.restore().await?.is_none() {
//!     match engine.login("amy@example.com", "secret").await? {
//!         LoginOutcome::Authenticated(session) => println!("home: {}", session.role),
//!         LoginOutcome::ChooseRole(pending) => println!("pick one of {:?}", pending.candidates()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod api;
pub mod authenticator;
pub mod config;
pub mod engine;
pub mod error;
pub mod http_api;
pub mod keys;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod role_resolver;
pub mod session_store;
pub mod single_flight;
pub mod verification;

pub use account::AccountService;
pub use api::{AuthApi, RoleProbe};
pub use authenticator::{normalize_login_response, AuthenticatedUser, CredentialAuthenticator};
pub use config::AuthConfig;
pub use engine::{LoginOutcome, PendingLogin, SessionEngine};
pub use error::{AuthError, Result};
pub use http_api::HttpAuthApi;
pub use lifecycle::{
    AppState, BackgroundThenInactive, LifecycleEvent, LifecycleSignal, MonitorState,
    SessionLifecycleMonitor, SessionWiper, TerminationCause, TerminationHeuristic,
};
pub use models::{ProfileUpdate, RegisterRequest, ResendReply, Role, Session, UserInfo};
pub use role_resolver::{RoleResolution, RoleResolver};
pub use session_store::SessionStore;
pub use verification::{
    CooldownTicker, EmailVerificationFlow, FlowState, Haptics, InputOutcome, NoopHaptics,
    ResendStatus, VerifyOutcome,
};
