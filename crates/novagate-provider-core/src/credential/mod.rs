mod model_unavailable_queue;
mod oauth;
mod pool;
mod state;
mod unavailable_queue;

pub use oauth::{
    CredentialBundle, OAuthSession, OAuthSessionManager, OAuthSessionStatus, OAuthStartError,
    SessionError,
};
pub use pool::{AcquireError, CredentialPool};
pub use state::{CredentialId, CredentialState, UnavailableReason};

use serde::{Deserialize, Serialize};

use crate::config::OAuthProviderKind;

/// One stored secret. API-key providers hold a plain key; OAuth providers
/// hold the bundle the `OAuthSessionManager` last wrote for that
/// `(providerKind, accountId)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Credential {
    ApiKey(ApiKeyCredential),
    Codex(CodexCredential),
    ClaudeCode(ClaudeCodeCredential),
}

impl Credential {
    pub fn bearer_token(&self) -> &str {
        match self {
            Credential::ApiKey(c) => &c.api_key,
            Credential::Codex(c) => &c.access_token,
            Credential::ClaudeCode(c) => &c.access_token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyCredential {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodexCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub account_id: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeCodeCredential {
    #[serde(default, alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default, alias = "sessionKey", skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl From<CredentialBundle> for Credential {
    fn from(bundle: CredentialBundle) -> Self {
        match bundle.provider_kind {
            OAuthProviderKind::Codex => Credential::Codex(CodexCredential {
                access_token: bundle.access_token,
                refresh_token: bundle.refresh_token.unwrap_or_default(),
                id_token: String::new(),
                user_email: None,
                account_id: bundle.account_id,
                expires_at: system_time_to_unix(bundle.expires_at),
            }),
            OAuthProviderKind::ClaudeCode => Credential::ClaudeCode(ClaudeCodeCredential {
                access_token: bundle.access_token,
                refresh_token: bundle.refresh_token.unwrap_or_default(),
                expires_at: system_time_to_unix(bundle.expires_at),
                session_key: None,
                user_email: None,
            }),
        }
    }
}

fn system_time_to_unix(t: std::time::SystemTime) -> i64 {
    t.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claudecode_allows_session_key_only() {
        let value = serde_json::json!({
            "ClaudeCode": {
                "session_key": "sess_123"
            }
        });
        let cred: Credential = serde_json::from_value(value).expect("credential should parse");
        match cred {
            Credential::ClaudeCode(secret) => {
                assert_eq!(secret.access_token, "");
                assert_eq!(secret.refresh_token, "");
                assert_eq!(secret.expires_at, 0);
                assert_eq!(secret.session_key.as_deref(), Some("sess_123"));
            }
            other => panic!("unexpected credential variant: {other:?}"),
        }
    }
}
