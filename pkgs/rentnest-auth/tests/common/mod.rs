//! Scripted backend shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rentnest_auth::{
    AuthApi, AuthError, ProfileUpdate, RegisterRequest, ResendReply, Result, RoleProbe,
};
use rentnest_store::MemoryKeyValueStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// Canned answer for one endpoint
#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Reject(u16, &'static str),
    Unreachable,
}

impl Reply {
    fn into_result(self) -> Result<Value> {
        match self {
            Reply::Json(value) => Ok(value),
            Reply::Reject(status, message) => Err(AuthError::Api {
                status,
                message: message.to_string(),
            }),
            Reply::Unreachable => Err(AuthError::Network("connection refused".into())),
        }
    }
}

pub struct FakeApi {
    pub login: Mutex<Reply>,
    pub verify: Mutex<Reply>,
    pub resend: Mutex<ResendReply>,
    pub update_profile: Mutex<Reply>,
    pub delete: Mutex<Reply>,
    pub probes: Mutex<HashMap<RoleProbe, Value>>,
    pub probe_log: Mutex<Vec<RoleProbe>>,
    pub calls: Mutex<Vec<String>>,
    /// When set, `login` waits for a notification before answering
    pub login_gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            login: Mutex::new(Reply::Unreachable),
            verify: Mutex::new(Reply::Unreachable),
            resend: Mutex::new(ResendReply::default()),
            update_profile: Mutex::new(Reply::Json(json!({}))),
            delete: Mutex::new(Reply::Json(json!({}))),
            probes: Mutex::new(HashMap::new()),
            probe_log: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            login_gate: Mutex::new(None),
        }
    }
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer_login(&self, reply: Reply) {
        *self.login.lock() = reply;
    }

    pub fn answer_verify(&self, reply: Reply) {
        *self.verify.lock() = reply;
    }

    pub fn answer_resend(&self, cooldown: Option<u32>, count: Option<u32>) {
        *self.resend.lock() = ResendReply {
            resend_cooldown: cooldown,
            resend_count: count,
        };
    }

    pub fn answer_probe(&self, probe: RoleProbe, body: Value) {
        self.probes.lock().insert(probe, body);
    }

    pub fn gate_login(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.login_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn probed(&self) -> Vec<RoleProbe> {
        self.probe_log.lock().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn login(&self, _email: &str, _password: &str) -> Result<Value> {
        self.record("login");
        let gate = self.login_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.login.lock().clone().into_result()
    }

    async fn register(&self, request: &RegisterRequest) -> Result<Value> {
        self.record("register");
        Ok(json!({"message": format!("Welcome {}", request.name)}))
    }

    async fn verify_code(&self, _email: &str, code: &str) -> Result<Value> {
        self.record(&format!("verify:{}", code));
        self.verify.lock().clone().into_result()
    }

    async fn resend_code(&self, _email: &str) -> Result<ResendReply> {
        self.record("resend");
        Ok(self.resend.lock().clone())
    }

    async fn change_password(&self, token: &str, _current: &str, _new: &str) -> Result<()> {
        self.record(&format!("change_password:{}", token));
        Ok(())
    }

    async fn update_profile(&self, token: &str, _update: &ProfileUpdate) -> Result<Value> {
        self.record(&format!("update_profile:{}", token));
        self.update_profile.lock().clone().into_result()
    }

    async fn delete_account(&self, token: &str) -> Result<()> {
        self.record(&format!("delete_account:{}", token));
        self.delete.lock().clone().into_result().map(|_| ())
    }

    async fn probe(&self, _token: &str, probe: RoleProbe) -> Result<Value> {
        self.probe_log.lock().push(probe);
        match self.probes.lock().get(&probe) {
            Some(body) => Ok(body.clone()),
            None => Err(AuthError::Network("probe timed out".into())),
        }
    }
}

pub fn memory_store() -> Arc<MemoryKeyValueStore> {
    Arc::new(MemoryKeyValueStore::new())
}
