//! One-time-code email verification used after registration.
//!
//! `Idle -> Verifying -> Verified`, or back to `Idle` on failure with the
//! entered digits kept. Filling the sixth slot (typed or pasted) moves to
//! `Verifying` on its own; the host then calls [`EmailVerificationFlow::verify`].
//!
//! Resends are capped per flow and each one starts a server-supplied cooldown
//! counted down by a one-second ticker task. The ticker is cancelled when the
//! flow is dropped, so nothing mutates state after the screen is gone.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::authenticator::TOKEN_SHAPE_KEYS;
use crate::config::RESEND_LIMIT;
use crate::models::{Role, Session};
use crate::role_resolver::RoleResolver;
use crate::session_store::SessionStore;
use crate::{AuthError, Result};

pub const CODE_LENGTH: usize = 6;

/// Cooldown applied when the backend does not say how long to wait.
pub const DEFAULT_RESEND_COOLDOWN_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Verifying,
    Verified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Digit stored, focus now on `focus`
    Advanced { focus: usize },
    /// All slots filled; the flow is `Verifying`
    Complete,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendStatus {
    Available,
    CoolingDown(u32),
    LimitReached,
}

impl ResendStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ResendStatus::Available)
    }

    /// Label for a disabled resend control.
    pub fn disabled_reason(&self) -> Option<String> {
        match self {
            ResendStatus::Available => None,
            ResendStatus::CoolingDown(secs) => Some(format!("Resend code in {}s", secs)),
            ResendStatus::LimitReached => {
                Some("Resend limit reached. Please contact support.".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Code accepted and the session committed; route by `session.role`
    Verified { session: Session },
    /// Code rejected; the flow is `Idle` again
    Failed { message: String },
}

/// Error cue played when a code is rejected.
pub trait Haptics: Send + Sync {
    fn error(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHaptics;

impl Haptics for NoopHaptics {
    fn error(&self) {}
}

/// Countdown published once per second on a watch channel.
pub struct CooldownTicker {
    remaining: watch::Receiver<u32>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CooldownTicker {
    /// Spawn the countdown. Must be called inside a tokio runtime.
    pub fn start(seconds: u32) -> Self {
        let (tx, rx) = watch::channel(seconds);
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            let mut left = seconds;
            while left > 0 {
                tokio::select! {
                    _ = stop.cancelled() => {
                        debug!("Cooldown ticker cancelled with {}s left", left);
                        return;
                    }
                    _ = interval.tick() => {
                        left -= 1;
                        if tx.send(left).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Self {
            remaining: rx,
            cancel,
            handle,
        }
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for CooldownTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct EmailVerificationFlow {
    email: String,
    slots: [Option<u8>; CODE_LENGTH],
    focus: usize,
    state: FlowState,
    resend_count: u32,
    resend_limit: u32,
    cooldown: Option<CooldownTicker>,
    api: Arc<dyn AuthApi>,
    sessions: SessionStore,
    resolver: RoleResolver,
    haptics: Arc<dyn Haptics>,
}

impl EmailVerificationFlow {
    pub fn new(email: &str, api: Arc<dyn AuthApi>, sessions: SessionStore) -> Self {
        Self {
            email: email.trim().to_string(),
            slots: [None; CODE_LENGTH],
            focus: 0,
            state: FlowState::Idle,
            resend_count: 0,
            resend_limit: RESEND_LIMIT,
            cooldown: None,
            resolver: RoleResolver::new(api.clone()),
            api,
            sessions,
            haptics: Arc::new(NoopHaptics),
        }
    }

    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = haptics;
        self
    }

    pub fn with_resend_limit(mut self, limit: u32) -> Self {
        self.resend_limit = limit;
        self
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn slots(&self) -> [Option<u8>; CODE_LENGTH] {
        self.slots
    }

    pub fn resend_count(&self) -> u32 {
        self.resend_count
    }

    /// Entered digits; only meaningful once every slot is filled
    pub fn code(&self) -> String {
        self.slots
            .iter()
            .flatten()
            .map(|d| char::from(b'0' + d))
            .collect()
    }

    fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn focus_slot(&mut self, index: usize) {
        if index < CODE_LENGTH {
            self.focus = index;
        }
    }

    /// Type one character into the focused slot.
    pub fn enter_digit(&mut self, ch: char) -> InputOutcome {
        if self.state != FlowState::Idle {
            return InputOutcome::Ignored;
        }
        let Some(digit) = ch.to_digit(10) else {
            return InputOutcome::Ignored;
        };

        self.slots[self.focus] = Some(digit as u8);
        if self.is_complete() {
            self.state = FlowState::Verifying;
            return InputOutcome::Complete;
        }
        if self.focus + 1 < CODE_LENGTH {
            self.focus += 1;
        }
        InputOutcome::Advanced { focus: self.focus }
    }

    /// Clear the focused slot, or step back one slot when it is already empty.
    pub fn backspace(&mut self) -> usize {
        if self.state != FlowState::Idle {
            return self.focus;
        }
        if self.slots[self.focus].is_some() {
            self.slots[self.focus] = None;
        } else if self.focus > 0 {
            self.focus -= 1;
        }
        self.focus
    }

    /// Fill every slot from a pasted code.
    pub fn paste(&mut self, text: &str) -> InputOutcome {
        if self.state != FlowState::Idle {
            return InputOutcome::Ignored;
        }
        let digits: Vec<u8> = text
            .trim()
            .chars()
            .map_while(|c| c.to_digit(10).map(|d| d as u8))
            .collect();
        if digits.len() != CODE_LENGTH || text.trim().chars().count() != CODE_LENGTH {
            debug!("Ignoring paste that is not a {}-digit code", CODE_LENGTH);
            return InputOutcome::Ignored;
        }

        for (slot, digit) in self.slots.iter_mut().zip(digits) {
            *slot = Some(digit);
        }
        self.focus = CODE_LENGTH - 1;
        self.state = FlowState::Verifying;
        InputOutcome::Complete
    }

    /// Submit the entered code.
    ///
    /// A rejected code (or a failed request) is reported as
    /// [`VerifyOutcome::Failed`] and returns the flow to `Idle`. Only a
    /// failure to persist the accepted session is returned as an error.
    pub async fn verify(&mut self) -> Result<VerifyOutcome> {
        if self.state != FlowState::Verifying {
            return Err(AuthError::Validation(
                "Enter the full 6-digit code.".to_string(),
            ));
        }

        let code = self.code();
        info!("Verifying email code");

        let body = match self.api.verify_code(&self.email, &code).await {
            Ok(body) => body,
            Err(e) => return Ok(self.fail(e)),
        };

        let token = match TOKEN_SHAPE_KEYS
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_str))
            .filter(|t| !t.trim().is_empty())
        {
            Some(token) => token.to_string(),
            None => {
                return Ok(self.fail(AuthError::InvalidResponse(
                    "no token in verification response".into(),
                )))
            }
        };

        let user = body.get("user").cloned().unwrap_or(Value::Null);
        let stated = user
            .get("role")
            .or_else(|| body.get("role"))
            .and_then(Value::as_str)
            .and_then(Role::parse);
        let (role, verified) = match stated {
            Some(role) => (role, true),
            None => {
                let resolution = self.resolver.resolve(&token).await;
                (resolution.role(), resolution.is_confident())
            }
        };

        let mut session = Session::from_user(&token, role, &user, verified);
        if session.email.is_empty() {
            session.email = self.email.clone();
        }

        // Nothing from an account used earlier on this device may survive
        self.sessions.wipe().await;
        if let Err(e) = self.sessions.commit(&session).await {
            self.state = FlowState::Idle;
            return Err(e);
        }

        self.state = FlowState::Verified;
        self.cooldown = None;
        info!("Email verified, routing to {} home", role);
        Ok(VerifyOutcome::Verified { session })
    }

    fn fail(&mut self, error: AuthError) -> VerifyOutcome {
        warn!("Verification failed: {}", error);
        self.state = FlowState::Idle;
        self.haptics.error();
        VerifyOutcome::Failed {
            message: error.user_message(),
        }
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown.as_ref().map_or(0, CooldownTicker::remaining)
    }

    /// Watch the countdown of the current cooldown, if one was started.
    pub fn subscribe_cooldown(&self) -> Option<watch::Receiver<u32>> {
        self.cooldown.as_ref().map(CooldownTicker::subscribe)
    }

    /// The limit outranks the cooldown: once reached, resend stays disabled.
    pub fn resend_status(&self) -> ResendStatus {
        if self.resend_count >= self.resend_limit {
            return ResendStatus::LimitReached;
        }
        match self.cooldown_remaining() {
            0 => ResendStatus::Available,
            secs => ResendStatus::CoolingDown(secs),
        }
    }

    /// Ask the backend to send a new code.
    pub async fn resend(&mut self) -> Result<ResendStatus> {
        let status = self.resend_status();
        if !status.is_available() {
            return Err(AuthError::ResendUnavailable(status));
        }

        let reply = self.api.resend_code(&self.email).await?;

        self.resend_count = (self.resend_count + 1).max(reply.resend_count.unwrap_or(0));
        let cooldown = reply
            .resend_cooldown
            .unwrap_or(DEFAULT_RESEND_COOLDOWN_SECS);
        info!(
            "Verification code resent ({}/{}), cooldown {}s",
            self.resend_count, self.resend_limit, cooldown
        );

        self.cooldown = Some(CooldownTicker::start(cooldown));
        Ok(self.resend_status())
    }
}
