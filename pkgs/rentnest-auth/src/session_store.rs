//! Canonical session record persisted under the fixed key schema.
//!
//! Writes are a sequence of independent key writes with no rollback, so
//! [`SessionStore::load`] never assumes a complete record: it reads the role
//! first, prefers the role-specific blob, then the generic `user_info` blob,
//! then the individual scalar keys.

use rentnest_store::KeyValueStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::keys;
use crate::models::{first_text, ProfileUpdate, Role, Session, UserInfo};
use crate::{AuthError, Result};

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    current: Arc<watch::Sender<Option<Session>>>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            kv,
            current: Arc::new(tx),
        }
    }

    /// Session as last committed, loaded or wiped
    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Persist `session`.
    ///
    /// Keys are written in a fixed order, each one awaited and logged. A
    /// failing write stops the commit and is returned; earlier writes stay.
    pub async fn commit(&self, session: &Session) -> Result<()> {
        if session.token.trim().is_empty() {
            return Err(AuthError::Validation("session token is empty".into()));
        }

        let user_info = serde_json::to_string(&session.user_info())?;
        let role_profile = serde_json::to_string(&session.role_profile)?;

        let writes: [(&str, &str); 9] = [
            (keys::ACCESS_TOKEN, session.token.as_str()),
            (keys::USER_INFO, user_info.as_str()),
            (keys::ROLE, session.role.as_str()),
            (keys::EMAIL, session.email.as_str()),
            (keys::NAME, session.name.as_str()),
            (keys::USER_ID, session.user_id.as_str()),
            (session.role.profile_key(), role_profile.as_str()),
            (keys::PHONE, session.phone.as_str()),
            (keys::USER_EMAIL, session.email.as_str()),
        ];

        info!("Committing {} session", session.role);
        for (step, (key, value)) in writes.iter().enumerate() {
            if let Err(e) = self.kv.set(key, value).await {
                error!(
                    "Session commit failed at write {}/{} ('{}'): {}",
                    step + 1,
                    writes.len(),
                    key,
                    e
                );
                return Err(e.into());
            }
            debug!("Session write {}/{} ok: {}", step + 1, writes.len(), key);
        }

        // A role switch replaces the profile slot, it never leaves two behind
        let stale = session.role.other().profile_key();
        if let Err(e) = self.kv.remove(stale).await {
            error!("Failed to clear stale profile slot '{}': {}", stale, e);
            return Err(e.into());
        }

        self.current.send_replace(Some(session.clone()));
        info!("Session committed");
        Ok(())
    }

    /// Rebuild the session from storage. `None` when no token is stored.
    pub async fn load(&self) -> Result<Option<Session>> {
        let token = match self.kv.get(keys::ACCESS_TOKEN).await? {
            Some(token) if !token.trim().is_empty() => token,
            _ => {
                debug!("No stored token");
                self.current.send_replace(None);
                return Ok(None);
            }
        };

        let stored_role = self.read(keys::ROLE).await.and_then(|r| Role::parse(&r));
        let landlord_blob = self.read_object(keys::LANDLORD_INFO).await;
        let tenant_blob = self.read_object(keys::TENANT_INFO).await;

        let (role, verified) = match stored_role {
            Some(role) => (role, true),
            None if landlord_blob.is_some() => (Role::Landlord, false),
            None if tenant_blob.is_some() => (Role::Tenant, false),
            None => (Role::Tenant, false),
        };
        if !verified {
            warn!("Stored session has no role, assuming {}", role);
        }

        let role_blob = match role {
            Role::Landlord => landlord_blob,
            Role::Tenant => tenant_blob,
        };
        let user_info = self.read_object(keys::USER_INFO).await;

        let sources: Vec<&Value> = role_blob.iter().chain(user_info.iter()).collect();
        let field = |names: &[&str]| sources.iter().find_map(|blob| first_text(blob, names));

        let user_id = match field(&["_id", "id", "userId", "user_id"]) {
            Some(id) => id,
            None => self.read(keys::USER_ID).await.unwrap_or_default(),
        };
        let name = match field(&["name", "fullName", "full_name"]) {
            Some(name) => name,
            None => self.read(keys::NAME).await.unwrap_or_default(),
        };
        let email = match field(&["email"]) {
            Some(email) => email,
            None => match self.read(keys::EMAIL).await {
                Some(email) => email,
                None => self.read(keys::USER_EMAIL).await.unwrap_or_default(),
            },
        };
        let phone = match field(&["phone", "phoneNumber", "phone_number"]) {
            Some(phone) => phone,
            None => self.read(keys::PHONE).await.unwrap_or_default(),
        };

        let role_profile = role_blob
            .clone()
            .or_else(|| user_info.clone())
            .unwrap_or_else(|| Value::Object(Map::new()));

        let session = Session {
            token,
            role,
            user_id,
            name,
            email,
            phone,
            role_profile,
            verified,
        };

        info!("Restored {} session", session.role);
        self.current.send_replace(Some(session.clone()));
        Ok(Some(session))
    }

    /// Remove every session key. Idempotent, never fails.
    ///
    /// If the batch removal errors each key is retried on its own so one bad
    /// key cannot keep the others alive; leftover failures are only logged.
    pub async fn wipe(&self) {
        info!("Wiping session");
        self.current.send_replace(None);

        let Err(e) = self.kv.remove_all(&keys::SESSION_KEYS).await else {
            return;
        };
        warn!("Batch session wipe failed, removing keys one by one: {}", e);

        for key in keys::SESSION_KEYS {
            if let Err(e) = self.kv.remove(key).await {
                warn!("Could not remove '{}' during wipe: {}", key, e);
            }
        }
    }

    /// Apply an accepted profile edit to the stored session.
    ///
    /// The role slot is rewritten before `user_info` and the scalars, matching
    /// the order `load` reads them in. `server_user` is the user object the
    /// backend echoed back, if any; its fields win over the local edit.
    pub async fn apply_profile_update(
        &self,
        update: &ProfileUpdate,
        server_user: Option<&Value>,
    ) -> Result<Session> {
        let mut session = match self.current() {
            Some(session) => session,
            None => self.load().await?.ok_or(AuthError::NotAuthenticated)?,
        };

        let mut profile = session
            .role_profile
            .as_object()
            .cloned()
            .unwrap_or_default();

        let edits = [
            ("name", &update.name),
            ("email", &update.email),
            ("phone", &update.phone),
            ("company", &update.company),
        ];
        for (field, value) in edits {
            if let Some(value) = value {
                profile.insert(field.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(Value::Object(echoed)) = server_user {
            for (field, value) in echoed {
                profile.insert(field.clone(), value.clone());
            }
        }

        let profile = Value::Object(profile);
        let refreshed = Session::from_user(&session.token, session.role, &profile, session.verified);
        session.name = non_empty_or(refreshed.name, session.name);
        session.email = non_empty_or(refreshed.email, session.email);
        session.phone = non_empty_or(refreshed.phone, session.phone);
        session.user_id = non_empty_or(refreshed.user_id, session.user_id);
        session.role_profile = profile;

        let user_info: UserInfo = session.user_info();
        let writes = [
            (session.role.profile_key(), serde_json::to_string(&session.role_profile)?),
            (keys::USER_INFO, serde_json::to_string(&user_info)?),
            (keys::NAME, session.name.clone()),
            (keys::EMAIL, session.email.clone()),
            (keys::USER_EMAIL, session.email.clone()),
            (keys::PHONE, session.phone.clone()),
        ];
        for (key, value) in writes.iter() {
            self.kv.set(key, value).await.inspect_err(|e| {
                error!("Profile update failed writing '{}': {}", key, e);
            })?;
        }

        info!("Profile updated");
        self.current.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.kv.get(key).await {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!("Could not read '{}', treating as missing: {}", key, e);
                None
            }
        }
    }

    async fn read_object(&self, key: &str) -> Option<Value> {
        let raw = self.read(key).await?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if value.is_object() => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!("Stored '{}' is not valid JSON: {}", key, e);
                None
            }
        }
    }
}

fn non_empty_or(preferred: String, fallback: String) -> String {
    if preferred.trim().is_empty() {
        fallback
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentnest_store::{MemoryKeyValueStore, StoreOp};
    use serde_json::json;

    fn sample(role: Role) -> Session {
        Session::from_user(
            "t1",
            role,
            &json!({"_id": "u1", "name": "Amy", "email": "amy@example.com", "phone": "555"}),
            true,
        )
    }

    #[tokio::test]
    async fn test_commit_write_order() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = SessionStore::new(kv.clone());

        store.commit(&sample(Role::Landlord)).await.unwrap();

        let written: Vec<String> = kv
            .ops()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Set(key) => Some(key),
                _ => None,
            })
            .collect();
        assert_eq!(
            written,
            vec![
                "access_token",
                "user_info",
                "role",
                "email",
                "name",
                "user_id",
                "landlord_info",
                "phone",
                "user_email"
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_commit_is_not_rolled_back() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.fail_on(keys::NAME);
        let store = SessionStore::new(kv.clone());

        let err = store.commit(&sample(Role::Tenant)).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert_eq!(
            kv.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(),
            Some("t1")
        );
        assert!(kv.get(keys::TENANT_INFO).await.unwrap().is_none());
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_load_falls_back_to_scalars() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(keys::ACCESS_TOKEN, "t9").await.unwrap();
        kv.set(keys::ROLE, "landlord").await.unwrap();
        kv.set(keys::NAME, "Lee").await.unwrap();
        kv.set(keys::USER_EMAIL, "lee@example.com").await.unwrap();
        kv.set(keys::USER_INFO, "{not json").await.unwrap();

        let session = SessionStore::new(kv).load().await.unwrap().unwrap();
        assert_eq!(session.role, Role::Landlord);
        assert_eq!(session.name, "Lee");
        assert_eq!(session.email, "lee@example.com");
        assert!(session.verified);
        assert_eq!(session.role_profile, json!({}));
    }

    #[tokio::test]
    async fn test_load_infers_role_from_profile_slot() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(keys::ACCESS_TOKEN, "t9").await.unwrap();
        kv.set(keys::LANDLORD_INFO, r#"{"name":"Lee"}"#).await.unwrap();

        let session = SessionStore::new(kv).load().await.unwrap().unwrap();
        assert_eq!(session.role, Role::Landlord);
        assert!(!session.verified);
        assert_eq!(session.name, "Lee");
    }

    #[tokio::test]
    async fn test_wipe_swallows_errors_and_retries_per_key() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = SessionStore::new(kv.clone());
        store.commit(&sample(Role::Tenant)).await.unwrap();

        kv.fail_on(keys::ROLE);
        store.wipe().await;

        assert!(kv.get(keys::ACCESS_TOKEN).await.unwrap().is_none());
        assert!(kv.get(keys::TENANT_INFO).await.unwrap().is_none());
        assert!(store.current().is_none());
        assert_eq!(kv.keys(), vec!["role".to_string()]);
    }
}
