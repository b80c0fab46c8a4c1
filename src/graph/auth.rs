//! Bearer tokens for the Resource Manager API.

use crate::core::config::AzureConfig;
use crate::core::{ProbeError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fmt;

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 120;

/// Source of bearer tokens.
pub enum Credential {
    /// Token supplied from outside, used as-is.
    Static(String),
    /// OAuth2 client credentials flow.
    ClientSecret {
        authority: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
        scope: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Token with its expiry.
#[derive(Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

const REDACTED: &str = "<redacted>";

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Static(_) => f.debug_tuple("Static").field(&REDACTED).finish(),
            Credential::ClientSecret {
                authority,
                tenant_id,
                client_id,
                scope,
                cached,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("authority", authority)
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &REDACTED)
                .field("scope", scope)
                .field("cached", &cached.lock().as_ref())
                .finish(),
        }
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &REDACTED)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl Credential {
    /// Pick a credential from configuration.
    ///
    /// A static token wins over client credentials. Returns `None` when the
    /// configuration has neither.
    pub fn from_config(azure: &AzureConfig) -> Option<Self> {
        if let Some(token) = azure.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Some(Credential::Static(token.clone()));
        }

        match (&azure.tenant_id, &azure.client_id, &azure.client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Some(Credential::ClientSecret {
                    authority: azure.authority.trim_end_matches('/').to_string(),
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    scope: format!("{}/.default", azure.endpoint.trim_end_matches('/')),
                    cached: Mutex::new(None),
                })
            },
            _ => None,
        }
    }

    /// Current bearer token, fetching a new one when needed.
    pub async fn token(&self, http: &reqwest::Client) -> Result<String> {
        match self {
            Credential::Static(token) => Ok(token.clone()),
            Credential::ClientSecret {
                authority,
                tenant_id,
                client_id,
                client_secret,
                scope,
                cached,
            } => {
                if let Some(hit) = cached.lock().as_ref() {
                    if hit.expires_at > Utc::now() {
                        return Ok(hit.token.clone());
                    }
                }

                let url = format!("{}/{}/oauth2/v2.0/token", authority, tenant_id);
                let response = http
                    .post(&url)
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("scope", scope.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| ProbeError::auth(format!("token request failed: {}", e)))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ProbeError::auth(format!(
                        "token endpoint returned HTTP {}: {}",
                        status.as_u16(),
                        body
                    )));
                }

                let issued: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| ProbeError::auth(format!("invalid token response: {}", e)))?;
                let lifetime = issued.expires_in.unwrap_or(3600) - REFRESH_MARGIN_SECS;
                let fresh = CachedToken {
                    token: issued.access_token,
                    expires_at: Utc::now() + ChronoDuration::seconds(lifetime.max(0)),
                };
                tracing::debug!(expires_at = %fresh.expires_at, "acquired azure token");

                let token = fresh.token.clone();
                *cached.lock() = Some(fresh);
                Ok(token)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token_wins() {
        let azure = AzureConfig {
            access_token: Some("abc".to_string()),
            tenant_id: Some("t".to_string()),
            client_id: Some("c".to_string()),
            client_secret: Some("s".to_string()),
            ..AzureConfig::default()
        };
        assert!(matches!(Credential::from_config(&azure), Some(Credential::Static(t)) if t == "abc"));
    }

    #[test]
    fn test_client_secret_scope() {
        let azure = AzureConfig {
            tenant_id: Some("t".to_string()),
            client_id: Some("c".to_string()),
            client_secret: Some("s".to_string()),
            ..AzureConfig::default()
        };
        match Credential::from_config(&azure) {
            Some(Credential::ClientSecret { scope, .. }) => {
                assert_eq!(scope, "https://management.azure.com/.default");
            },
            other => panic!("expected client secret credential, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let azure = AzureConfig {
            tenant_id: Some("tenant".to_string()),
            client_id: Some("app".to_string()),
            client_secret: Some("hunter2".to_string()),
            ..AzureConfig::default()
        };
        let credential = Credential::from_config(&azure).unwrap();
        if let Credential::ClientSecret { cached, .. } = &credential {
            *cached.lock() = Some(CachedToken {
                token: "eyJ0eXAi".to_string(),
                expires_at: Utc::now(),
            });
        }
        let printed = format!("{:?}", credential);
        assert!(printed.contains("app"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("eyJ0eXAi"));

        let printed = format!("{:?}", Credential::Static("static-secret".to_string()));
        assert!(!printed.contains("static-secret"));
    }

    #[test]
    fn test_incomplete_config_has_no_credential() {
        let azure = AzureConfig {
            tenant_id: Some("t".to_string()),
            ..AzureConfig::default()
        };
        assert!(Credential::from_config(&azure).is_none());
    }
}
