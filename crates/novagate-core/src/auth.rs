//! Key Store: validates a client-presented key against the configured set
//! of client keys, in constant time.
//!
//! A plain `HashMap` lookup on the presented key is fine for an opaque
//! random key but leaks timing information if keys are ever compared
//! byte-by-byte anywhere in the chain. Grounded on the same snapshot-swap
//! shape (`ArcSwap<AuthSnapshot>`), but the lookup here always walks every
//! configured key and compares with a fixed-time byte compare, so the
//! response time doesn't vary with how many leading bytes of a wrong key
//! happen to match a real one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use http::HeaderMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientKey {
    pub name: String,
    pub key: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    pub keys: Vec<ClientKey>,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub client_key_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    Missing,
    Invalid,
}

pub trait AuthProvider: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError>;
}

pub struct KeyStore {
    snapshot: ArcSwap<AuthSnapshot>,
}

impl KeyStore {
    pub fn new(snapshot: AuthSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn replace_snapshot(&self, snapshot: AuthSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

impl AuthProvider for KeyStore {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let presented = extract_client_key(headers).ok_or(AuthError::Missing)?;
        let snapshot = self.snapshot.load();

        // Walk every configured key regardless of an earlier match so the
        // total work (and therefore the wall time) doesn't depend on which
        // key, if any, matches.
        let mut found: Option<&ClientKey> = None;
        for candidate in &snapshot.keys {
            if constant_time_eq(candidate.key.as_bytes(), presented.as_bytes()) {
                found = Some(candidate);
            }
        }

        match found {
            Some(entry) if entry.enabled => Ok(AuthContext {
                client_key_name: entry.name.clone(),
            }),
            _ => Err(AuthError::Invalid),
        }
    }
}

/// Fixed-time-per-length byte comparison. Not constant across different
/// lengths (that length itself would need padding to hide, which the
/// gateway doesn't attempt), but equal-length secrets — the common case for
/// generated API keys — compare in time independent of where they first
/// differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn extract_client_key(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = header_value(headers, "x-api-key") {
        return Some(value);
    }
    let auth = header_value(headers, "authorization")?;
    let auth = auth.trim();
    for prefix in ["Bearer ", "bearer "] {
        if let Some(token) = auth.strip_prefix(prefix) {
            return Some(token.trim().to_string());
        }
    }
    None
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            http::HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_bearer_and_x_api_key_equally() {
        let store = KeyStore::new(AuthSnapshot {
            keys: vec![ClientKey {
                name: "alice".to_string(),
                key: "sk-alice".to_string(),
                enabled: true,
            }],
        });
        let via_bearer = store
            .authenticate(&headers_with("authorization", "Bearer sk-alice"))
            .unwrap();
        assert_eq!(via_bearer.client_key_name, "alice");
        let via_x_api_key = store.authenticate(&headers_with("x-api-key", "sk-alice")).unwrap();
        assert_eq!(via_x_api_key.client_key_name, "alice");
    }

    #[test]
    fn disabled_key_is_rejected() {
        let store = KeyStore::new(AuthSnapshot {
            keys: vec![ClientKey {
                name: "bob".to_string(),
                key: "sk-bob".to_string(),
                enabled: false,
            }],
        });
        let err = store
            .authenticate(&headers_with("x-api-key", "sk-bob"))
            .unwrap_err();
        assert_eq!(err, AuthError::Invalid);
    }

    #[test]
    fn missing_header_is_missing_not_invalid() {
        let store = KeyStore::new(AuthSnapshot::default());
        let err = store.authenticate(&HeaderMap::new()).unwrap_err();
        assert_eq!(err, AuthError::Missing);
    }

    #[test]
    fn constant_time_eq_rejects_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}
