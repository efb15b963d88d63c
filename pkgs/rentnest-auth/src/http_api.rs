//! reqwest implementation of [`AuthApi`]

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::{AuthApi, RoleProbe};
use crate::models::{ProfileUpdate, RegisterRequest, ResendReply};
use crate::{AuthConfig, AuthError, Result};

pub struct HttpAuthApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpAuthApi {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AuthError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let builder = self.http.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = backend_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
        warn!("Backend rejected request with {}: {}", status, message);

        Err(AuthError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value> {
        let response = self.send(builder).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}

/// `message` or `error` from a JSON error body
fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "msg"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<Value> {
        let builder = self
            .request(Method::POST, "/auth/login", None)
            .json(&json!({ "email": email, "password": password }));
        self.send_json(builder).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<Value> {
        let builder = self
            .request(Method::POST, "/auth/register", None)
            .json(request);
        self.send_json(builder).await
    }

    async fn verify_code(&self, email: &str, code: &str) -> Result<Value> {
        let builder = self
            .request(Method::POST, "/auth/verify", None)
            .json(&json!({ "email": email, "code": code }));
        self.send_json(builder).await
    }

    async fn resend_code(&self, email: &str) -> Result<ResendReply> {
        let builder = self
            .request(Method::POST, "/auth/resend-code", None)
            .json(&json!({ "email": email }));
        let value = self.send_json(builder).await?;
        if value.is_null() {
            return Ok(ResendReply::default());
        }
        serde_json::from_value(value).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    async fn change_password(&self, token: &str, current: &str, new: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, "/auth/change-password", Some(token))
            .json(&json!({ "currentPassword": current, "newPassword": new }));
        self.send(builder).await?;
        Ok(())
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<Value> {
        let builder = self
            .request(Method::PUT, "/auth/update-profile", Some(token))
            .json(update);
        self.send_json(builder).await
    }

    async fn delete_account(&self, token: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, "/auth/delete-account", Some(token));
        self.send(builder).await?;
        Ok(())
    }

    async fn probe(&self, token: &str, probe: RoleProbe) -> Result<Value> {
        let builder = self.request(Method::GET, probe.path(), Some(token));
        self.send_json(builder).await
    }
}
