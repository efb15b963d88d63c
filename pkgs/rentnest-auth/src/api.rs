//! Backend contract consumed by the session engine.

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{ProfileUpdate, RegisterRequest, ResendReply};
use crate::Result;

/// Authenticated reads used only to infer the principal's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleProbe {
    /// Generic profile; may carry a `role` field
    Users,
    LandlordProfile,
    TenantProfile,
    LandlordProperties,
}

impl RoleProbe {
    /// Order in which the resolver tries the probes.
    pub const CASCADE: [RoleProbe; 4] = [
        RoleProbe::Users,
        RoleProbe::LandlordProfile,
        RoleProbe::TenantProfile,
        RoleProbe::LandlordProperties,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            RoleProbe::Users => "/users",
            RoleProbe::LandlordProfile => "/landlord/profile",
            RoleProbe::TenantProfile => "/tenant/profile",
            RoleProbe::LandlordProperties => "/landlord/properties",
        }
    }
}

/// REST backend of the property app.
///
/// Bodies are returned as raw JSON where the backend is known to vary its
/// shape; callers normalize them.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, email: &str, password: &str) -> Result<Value>;

    /// `POST /auth/register`
    async fn register(&self, request: &RegisterRequest) -> Result<Value>;

    /// `POST /auth/verify`
    async fn verify_code(&self, email: &str, code: &str) -> Result<Value>;

    /// `POST /auth/resend-code`
    async fn resend_code(&self, email: &str) -> Result<ResendReply>;

    /// `POST /auth/change-password`
    async fn change_password(&self, token: &str, current: &str, new: &str) -> Result<()>;

    /// `PUT /auth/update-profile`
    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<Value>;

    /// `DELETE /auth/delete-account`
    async fn delete_account(&self, token: &str) -> Result<()>;

    /// `GET` on one of the role probe endpoints
    async fn probe(&self, token: &str, probe: RoleProbe) -> Result<Value>;
}
