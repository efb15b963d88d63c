//! Session teardown driven by application lifecycle signals.
//!
//! The host reports three states (`active`, `background`, `inactive`). There
//! is no direct "process is being killed" signal, so termination is derived:
//! by default a `background -> inactive` transition counts, as does the
//! monitored view unmounting or a double back press at the navigation root.
//! Ordinary `active <-> background` switching keeps the session.
//!
//! The `background -> inactive` rule is an approximation that does not hold on
//! every platform; it lives behind [`TerminationHeuristic`] so a target can
//! supply its own rule.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::EXIT_PRESS_WINDOW_MS;
use crate::session_store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Active,
    Background,
    Inactive,
}

impl AppState {
    /// Parse the host runtime's state name.
    pub fn parse(value: &str) -> Option<AppState> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(AppState::Active),
            "background" => Some(AppState::Background),
            "inactive" => Some(AppState::Inactive),
            _ => None,
        }
    }
}

/// Decides which host transitions mean the process is going away.
pub trait TerminationHeuristic: Send + Sync {
    fn is_termination(&self, from: AppState, to: AppState) -> bool;
}

/// `background -> inactive` is read as the process being torn down.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackgroundThenInactive;

impl TerminationHeuristic for BackgroundThenInactive {
    fn is_termination(&self, from: AppState, to: AppState) -> bool {
        from == AppState::Background && to == AppState::Inactive
    }
}

/// What the monitor tears down on termination.
#[async_trait]
pub trait SessionWiper: Send + Sync {
    async fn wipe_session(&self);
}

#[async_trait]
impl SessionWiper for SessionStore {
    async fn wipe_session(&self) {
        self.wipe().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    HostTransition,
    Unmounted,
    ExitGesture,
}

/// Input from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    StateChanged(AppState),
    /// Hardware back control pressed
    BackPressed { at_root: bool, at: Instant },
    Unmounted,
}

/// What the monitor did with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Ignored,
    Transitioned(AppState),
    /// Session wiped
    Terminated(TerminationCause),
    /// Back at `active` after a termination; only a fresh login continues
    ReloginRequired,
    /// First back press at root; the UI should hint that another press exits
    ExitArmed,
    /// Second back press inside the window; session wiped, host should exit
    ExitRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running(AppState),
    Terminated,
}

pub struct SessionLifecycleMonitor {
    wiper: Arc<dyn SessionWiper>,
    heuristic: Box<dyn TerminationHeuristic>,
    state: MonitorState,
    exit_window: Duration,
    last_back_press: Option<Instant>,
    wipes: usize,
    events: Option<mpsc::UnboundedSender<LifecycleEvent>>,
}

impl SessionLifecycleMonitor {
    pub fn new(wiper: Arc<dyn SessionWiper>) -> Self {
        Self {
            wiper,
            heuristic: Box::new(BackgroundThenInactive),
            state: MonitorState::Running(AppState::Active),
            exit_window: Duration::from_millis(EXIT_PRESS_WINDOW_MS),
            last_back_press: None,
            wipes: 0,
            events: None,
        }
    }

    pub fn with_heuristic(mut self, heuristic: Box<dyn TerminationHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_exit_window(mut self, window: Duration) -> Self {
        self.exit_window = window;
        self
    }

    /// Forward every non-ignored event to `events` while [`run`](Self::run)ning.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Number of wipes this monitor has triggered
    pub fn wipe_count(&self) -> usize {
        self.wipes
    }

    pub async fn handle(&mut self, signal: LifecycleSignal) -> LifecycleEvent {
        match signal {
            LifecycleSignal::StateChanged(next) => self.on_state_change(next).await,
            LifecycleSignal::BackPressed { at_root, at } => self.on_back_press(at_root, at).await,
            LifecycleSignal::Unmounted => self.terminate(TerminationCause::Unmounted).await,
        }
    }

    pub async fn on_state_change(&mut self, next: AppState) -> LifecycleEvent {
        match self.state {
            MonitorState::Running(prev) if prev == next => LifecycleEvent::Ignored,
            MonitorState::Running(prev) => {
                if self.heuristic.is_termination(prev, next) {
                    return self.terminate(TerminationCause::HostTransition).await;
                }
                debug!("App state {:?} -> {:?}", prev, next);
                self.state = MonitorState::Running(next);
                LifecycleEvent::Transitioned(next)
            }
            MonitorState::Terminated if next == AppState::Active => {
                info!("App reactivated after termination, login required");
                self.state = MonitorState::Running(AppState::Active);
                self.last_back_press = None;
                LifecycleEvent::ReloginRequired
            }
            MonitorState::Terminated => LifecycleEvent::Ignored,
        }
    }

    pub async fn on_back_press(&mut self, at_root: bool, at: Instant) -> LifecycleEvent {
        if !at_root {
            self.last_back_press = None;
            return LifecycleEvent::Ignored;
        }

        match self.last_back_press {
            Some(previous) if at.saturating_duration_since(previous) <= self.exit_window => {
                self.last_back_press = None;
                self.terminate(TerminationCause::ExitGesture).await;
                LifecycleEvent::ExitRequested
            }
            _ => {
                self.last_back_press = Some(at);
                LifecycleEvent::ExitArmed
            }
        }
    }

    async fn terminate(&mut self, cause: TerminationCause) -> LifecycleEvent {
        if self.state == MonitorState::Terminated {
            return LifecycleEvent::Ignored;
        }

        info!("Termination detected ({:?}), wiping session", cause);
        self.state = MonitorState::Terminated;
        self.wipes += 1;
        self.wiper.wipe_session().await;
        LifecycleEvent::Terminated(cause)
    }

    /// Consume host signals until the sender side is dropped.
    pub async fn run(mut self, mut signals: mpsc::Receiver<LifecycleSignal>) -> Self {
        while let Some(signal) = signals.recv().await {
            let event = self.handle(signal).await;
            if event == LifecycleEvent::Ignored {
                continue;
            }
            if let Some(events) = &self.events {
                let _ = events.send(event);
            }
        }
        debug!("Lifecycle signal stream closed");
        self
    }
}
