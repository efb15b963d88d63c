//! Role inference for logins that did not state a role.
//!
//! Probes run one after another in [`RoleProbe::CASCADE`] order and the first
//! one that answers decides. A probe that errors, for any reason, just
//! declines. When every probe declines the principal is treated as a tenant
//! so there is always a home screen to route to; [`RoleResolution`] keeps
//! that fallback distinguishable from a real answer.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{AuthApi, RoleProbe};
use crate::models::Role;
use crate::single_flight::SingleFlight;
use crate::{AuthError, Result};

/// Role used when nothing else answers.
pub const DEFAULT_ROLE: Role = Role::Tenant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleResolution {
    /// A probe answered
    Resolved { role: Role, probe: RoleProbe },
    /// Every probe declined
    Defaulted(Role),
}

impl RoleResolution {
    pub fn role(&self) -> Role {
        match self {
            RoleResolution::Resolved { role, .. } => *role,
            RoleResolution::Defaulted(role) => *role,
        }
    }

    pub fn is_confident(&self) -> bool {
        matches!(self, RoleResolution::Resolved { .. })
    }
}

pub struct RoleResolver {
    api: Arc<dyn AuthApi>,
    flight: SingleFlight,
}

impl RoleResolver {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self {
            api,
            flight: SingleFlight::new(),
        }
    }

    /// Run the probe cascade. Never fails.
    pub async fn resolve(&self, token: &str) -> RoleResolution {
        for probe in RoleProbe::CASCADE {
            match self.api.probe(token, probe).await {
                Ok(body) => {
                    if let Some(role) = interpret(probe, &body) {
                        info!("Role resolved as {} via {}", role, probe.path());
                        return RoleResolution::Resolved { role, probe };
                    }
                    debug!("Probe {} answered without a role", probe.path());
                }
                Err(e) => {
                    debug!("Probe {} declined: {}", probe.path(), e);
                }
            }
        }

        warn!(
            "No role probe answered, defaulting to {}",
            DEFAULT_ROLE.as_str()
        );
        RoleResolution::Defaulted(DEFAULT_ROLE)
    }

    /// [`resolve`](Self::resolve), rejecting a call made while another is running.
    pub async fn try_resolve(&self, token: &str) -> Result<RoleResolution> {
        let _guard = self
            .flight
            .try_begin()
            .ok_or(AuthError::InFlight("role resolution"))?;
        Ok(self.resolve(token).await)
    }
}

/// Success of a role-specific probe is the answer; the generic profile only
/// counts when it names a role.
fn interpret(probe: RoleProbe, body: &Value) -> Option<Role> {
    match probe {
        RoleProbe::Users => role_field(body),
        RoleProbe::LandlordProfile | RoleProbe::LandlordProperties => Some(Role::Landlord),
        RoleProbe::TenantProfile => Some(Role::Tenant),
    }
}

fn role_field(body: &Value) -> Option<Role> {
    [Some(body), body.get("user"), body.get("data")]
        .into_iter()
        .flatten()
        .find_map(|value| value.get("role").and_then(Value::as_str).and_then(Role::parse))
}
