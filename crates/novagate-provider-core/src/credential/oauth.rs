//! OAuth Session Manager: a small state machine per interactive login,
//! plus a single-flight refresh coordinator for the bearer tokens handed
//! to the Dispatcher.
//!
//! Grounded on the device-code/PKCE flows kept local to one provider module
//! each (`providers/codex/oauth.rs`, `providers/claudecode/oauth.rs`),
//! generalized here into a provider-kind-generic manager whose
//! session states match the state machine exactly: `in_progress ->
//! awaiting_auth | awaiting_prompt | awaiting_manual_code -> (loops until)
//! success | error | cancelled`. The concrete per-kind flow driver lives in
//! `novagate-provider-impl::oauth`; this manager only owns the bookkeeping.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::OAuthProviderKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSession {
    pub id: String,
    pub provider_kind: OAuthProviderKind,
    pub account_id: String,
    pub status: OAuthSessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub manual_code_pending: bool,
    #[serde(default)]
    pub progress: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthSessionStatus {
    InProgress,
    AwaitingAuth,
    AwaitingPrompt,
    AwaitingManualCode,
    Success,
    Error,
    Cancelled,
}

impl OAuthSessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OAuthSessionStatus::Success | OAuthSessionStatus::Error | OAuthSessionStatus::Cancelled
        )
    }
}

/// Written on a successful session; replaces any prior bundle for the same
/// `(providerKind, accountId)` atomically.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    pub provider_kind: OAuthProviderKind,
    pub account_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: SystemTime,
    pub scope: Option<String>,
    pub raw: serde_json::Value,
    /// Set by a failed refresh (e.g. a revoked refresh token). An invalid
    /// bundle is kept (for audit) but never handed out by `bearer_for`.
    pub invalid: bool,
}

impl CredentialBundle {
    fn needs_refresh(&self, now: SystemTime) -> bool {
        self.expires_at
            .duration_since(now)
            .map(|remaining| remaining.as_secs() < 60)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
pub enum SessionError {
    NotFound,
    WrongState,
}

#[derive(Debug, Clone)]
pub enum OAuthStartError {
    AlreadyInProgress,
}

/// Per-`(providerKind, accountId)` refresh is single-flight: concurrent
/// callers await the one in-flight refresh rather than each issuing their own
/// token-exchange call.
type RefreshFuture = Pin<Box<dyn Future<Output = Result<CredentialBundle, String>> + Send>>;

pub type RefreshFn = Arc<dyn Fn(CredentialBundle) -> RefreshFuture + Send + Sync>;

pub struct OAuthSessionManager {
    sessions: RwLock<HashMap<String, OAuthSession>>,
    bundles: RwLock<HashMap<(OAuthProviderKind, String), CredentialBundle>>,
    refresh_locks: Mutex<HashMap<(OAuthProviderKind, String), Arc<Mutex<()>>>>,
}

impl Default for OAuthSessionManager {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            bundles: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }
}

impl OAuthSessionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a session and returns it immediately; the caller is expected
    /// to drive it from `in_progress` via `novagate-provider-impl::oauth`'s
    /// flow driver, which updates the session through `set_status`/
    /// `set_prompt` as the device/PKCE flow progresses.
    pub async fn start(&self, provider_kind: OAuthProviderKind, account_id: impl Into<String>) -> OAuthSession {
        let session = OAuthSession {
            id: Uuid::new_v4().to_string(),
            provider_kind,
            account_id: account_id.into(),
            status: OAuthSessionStatus::InProgress,
            auth_info: None,
            prompt: None,
            manual_code_pending: false,
            progress: Vec::new(),
            error: None,
        };
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<OAuthSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn submit_prompt(&self, session_id: &str, value: impl Into<String>) -> Result<OAuthSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id).ok_or(SessionError::NotFound)?;
        if session.status != OAuthSessionStatus::AwaitingPrompt {
            return Err(SessionError::WrongState);
        }
        session.progress.push(format!("prompt:{}", value.into()));
        session.status = OAuthSessionStatus::InProgress;
        Ok(session.clone())
    }

    pub async fn submit_manual_code(
        &self,
        session_id: &str,
        url_or_code: impl Into<String>,
    ) -> Result<OAuthSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id).ok_or(SessionError::NotFound)?;
        if session.status != OAuthSessionStatus::AwaitingManualCode {
            return Err(SessionError::WrongState);
        }
        session.manual_code_pending = false;
        session.progress.push(format!("manual_code:{}", url_or_code.into()));
        session.status = OAuthSessionStatus::InProgress;
        Ok(session.clone())
    }

    pub async fn cancel(&self, session_id: &str) -> Result<OAuthSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id).ok_or(SessionError::NotFound)?;
        if session.status.is_terminal() {
            return Err(SessionError::WrongState);
        }
        session.status = OAuthSessionStatus::Cancelled;
        Ok(session.clone())
    }

    /// Advances a non-terminal session to a new status; used by the flow
    /// driver, not by external callers.
    pub async fn set_status(&self, session_id: &str, status: OAuthSessionStatus) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            if !session.status.is_terminal() {
                session.status = status;
            }
        }
    }

    pub async fn set_prompt(&self, session_id: &str, prompt: impl Into<String>) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.prompt = Some(prompt.into());
        }
    }

    pub async fn fail(&self, session_id: &str, error: impl Into<String>) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.status = OAuthSessionStatus::Error;
            session.error = Some(error.into());
        }
    }

    /// Writes the bundle produced by a successful session, replacing any
    /// prior one for the same key atomically, and marks the session `success`.
    pub async fn complete(&self, session_id: &str, bundle: CredentialBundle) {
        let key = (bundle.provider_kind, bundle.account_id.clone());
        self.bundles.write().await.insert(key, bundle);
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.status = OAuthSessionStatus::Success;
        }
    }

    pub async fn bundle(&self, provider_kind: OAuthProviderKind, account_id: &str) -> Option<CredentialBundle> {
        self.bundles
            .read()
            .await
            .get(&(provider_kind, account_id.to_string()))
            .cloned()
    }

    pub async fn invalidate(&self, provider_kind: OAuthProviderKind, account_id: &str) {
        if let Some(bundle) = self
            .bundles
            .write()
            .await
            .get_mut(&(provider_kind, account_id.to_string()))
        {
            bundle.invalid = true;
        }
    }

    /// Returns a fresh bearer token, refreshing single-flight if the current
    /// bundle expires within 60s. `refresh` performs the actual token
    /// exchange and is only invoked by whichever caller wins the race.
    pub async fn bearer_for(
        &self,
        provider_kind: OAuthProviderKind,
        account_id: &str,
        refresh: RefreshFn,
    ) -> Result<String, String> {
        let key = (provider_kind, account_id.to_string());
        let lock = {
            let mut locks = self.refresh_locks.lock().await;
            locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        let _guard = lock.lock().await;

        let current = self
            .bundles
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| "no credential bundle for account".to_string())?;
        if current.invalid {
            return Err("credential bundle invalidated by a failed refresh".to_string());
        }
        if !current.needs_refresh(SystemTime::now()) {
            return Ok(current.access_token);
        }

        match refresh(current).await {
            Ok(refreshed) => {
                let token = refreshed.access_token.clone();
                self.bundles.write().await.insert(key, refreshed);
                Ok(token)
            }
            Err(err) => {
                if let Some(bundle) = self.bundles.write().await.get_mut(&key) {
                    bundle.invalid = true;
                }
                Err(err)
            }
        }
    }
}

impl Clone for CredentialBundle {
    fn clone(&self) -> Self {
        Self {
            provider_kind: self.provider_kind,
            account_id: self.account_id.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
            scope: self.scope.clone(),
            raw: self.raw.clone(),
            invalid: self.invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bundle(expires_in: Duration) -> CredentialBundle {
        CredentialBundle {
            provider_kind: OAuthProviderKind::Codex,
            account_id: "acct".into(),
            access_token: "tok-1".into(),
            refresh_token: Some("refresh-1".into()),
            expires_at: SystemTime::now() + expires_in,
            scope: None,
            raw: serde_json::Value::Null,
            invalid: false,
        }
    }

    #[tokio::test]
    async fn session_state_machine_rejects_wrong_state_transitions() {
        let mgr = OAuthSessionManager::new();
        let session = mgr.start(OAuthProviderKind::Codex, "acct").await;
        let err = mgr.submit_prompt(&session.id, "value").await.unwrap_err();
        assert!(matches!(err, SessionError::WrongState));
    }

    #[tokio::test]
    async fn cancel_is_rejected_once_terminal() {
        let mgr = OAuthSessionManager::new();
        let session = mgr.start(OAuthProviderKind::Codex, "acct").await;
        mgr.complete(&session.id, bundle(Duration::from_secs(3600))).await;
        let err = mgr.cancel(&session.id).await.unwrap_err();
        assert!(matches!(err, SessionError::WrongState));
    }

    #[tokio::test]
    async fn bearer_for_returns_cached_token_when_not_near_expiry() {
        let mgr = OAuthSessionManager::new();
        let session = mgr.start(OAuthProviderKind::Codex, "acct").await;
        mgr.complete(&session.id, bundle(Duration::from_secs(3600))).await;

        let refresh: RefreshFn = Arc::new(|_| Box::pin(async { panic!("should not refresh") }));
        let token = mgr
            .bearer_for(OAuthProviderKind::Codex, "acct", refresh)
            .await
            .unwrap();
        assert_eq!(token, "tok-1");
    }

    #[tokio::test]
    async fn bearer_for_refreshes_when_near_expiry() {
        let mgr = OAuthSessionManager::new();
        let session = mgr.start(OAuthProviderKind::Codex, "acct").await;
        mgr.complete(&session.id, bundle(Duration::from_secs(10))).await;

        let refresh: RefreshFn = Arc::new(|mut b| {
            Box::pin(async move {
                b.access_token = "tok-2".into();
                b.expires_at = SystemTime::now() + Duration::from_secs(3600);
                Ok(b)
            })
        });
        let token = mgr
            .bearer_for(OAuthProviderKind::Codex, "acct", refresh)
            .await
            .unwrap();
        assert_eq!(token, "tok-2");
    }

    #[tokio::test]
    async fn failed_refresh_invalidates_bundle() {
        let mgr = OAuthSessionManager::new();
        let session = mgr.start(OAuthProviderKind::Codex, "acct").await;
        mgr.complete(&session.id, bundle(Duration::from_secs(10))).await;

        let refresh: RefreshFn = Arc::new(|_| Box::pin(async { Err("revoked".to_string()) }));
        let result = mgr.bearer_for(OAuthProviderKind::Codex, "acct", refresh).await;
        assert!(result.is_err());

        let again: RefreshFn = Arc::new(|_| Box::pin(async { panic!("should not refresh") }));
        let result = mgr.bearer_for(OAuthProviderKind::Codex, "acct", again).await;
        assert!(result.is_err());
    }
}
