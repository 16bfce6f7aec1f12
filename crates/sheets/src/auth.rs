//! # Google Authentication
//!
//! Bearer tokens for the Sheets API, either supplied directly or obtained from
//! a service-account key through `yup-oauth2`, which signs the JWT assertion,
//! exchanges it and keeps the token until shortly before it expires.

use serde_json::Value as JsonValue;
use sheetsync::SyncError;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::ServiceAccountAuthenticator;

pub use yup_oauth2::ServiceAccountKey;

pub const DEFAULT_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Parses the JSON key downloaded from the Google Cloud console.
///
/// Keys without a `token_uri` use Google's token endpoint.
pub fn parse_service_account_key(json: &str) -> Result<ServiceAccountKey, SyncError> {
    let invalid = |e: serde_json::Error| SyncError::Auth(format!("Invalid service-account JSON: {e}"));
    let mut raw: JsonValue = serde_json::from_str(json).map_err(invalid)?;
    if let Some(fields) = raw.as_object_mut() {
        fields
            .entry("token_uri")
            .or_insert_with(|| JsonValue::from(DEFAULT_TOKEN_URI));
    }
    serde_json::from_value(raw).map_err(invalid)
}

/// Service-account credentials. The authenticator is built on first use and
/// shared by every clone, so tokens are cached across requests.
#[derive(Clone)]
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    scopes: Vec<String>,
    authenticator: Arc<OnceCell<DefaultAuthenticator>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            authenticator: Arc::new(OnceCell::new()),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    async fn authenticator(&self) -> Result<&DefaultAuthenticator, SyncError> {
        self.authenticator
            .get_or_try_init(|| async {
                info!(
                    "Authenticating as '{}' against {}",
                    self.key.client_email, self.key.token_uri
                );
                ServiceAccountAuthenticator::builder(self.key.clone())
                    .build()
                    .await
                    .map_err(|e| SyncError::Auth(format!("Invalid service-account key: {e}")))
            })
            .await
    }

    /// Returns a valid access token, fetching a new one when the cached token
    /// is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, SyncError> {
        let token = self
            .authenticator()
            .await?
            .token(self.scopes.as_slice())
            .await
            .map_err(|e| SyncError::Auth(format!("Token request failed: {e}")))?;
        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| SyncError::Auth("Token endpoint returned no access token".into()))
    }
}

impl Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.key.client_email)
            .field("token_uri", &self.key.token_uri)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// How the Sheets client authenticates its requests.
#[derive(Clone)]
pub enum GoogleAuth {
    /// A bearer token obtained elsewhere, used as is.
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl GoogleAuth {
    pub fn service_account(key: ServiceAccountKey) -> Self {
        GoogleAuth::ServiceAccount(ServiceAccountAuth::new(key))
    }

    pub async fn bearer(&self) -> Result<String, SyncError> {
        match self {
            GoogleAuth::Static(token) => Ok(token.clone()),
            GoogleAuth::ServiceAccount(auth) => auth.access_token().await,
        }
    }
}

impl Debug for GoogleAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoogleAuth::Static(_) => f.write_str("GoogleAuth::Static(..)"),
            GoogleAuth::ServiceAccount(auth) => auth.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_uri_defaults_when_absent() {
        let key = parse_service_account_key(
            r#"{"client_email": "a@b.iam.gserviceaccount.com", "private_key": "x"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(key.private_key_id.is_none());
    }

    #[test]
    fn explicit_token_uri_is_kept() {
        let key = parse_service_account_key(
            r#"{"client_email": "a@b", "private_key": "x", "token_uri": "http://localhost/token"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, "http://localhost/token");
    }

    #[test]
    fn malformed_key_is_an_auth_error() {
        assert!(matches!(
            parse_service_account_key("{not json"),
            Err(SyncError::Auth(_))
        ));
        assert!(matches!(
            parse_service_account_key(r#"{"private_key": "x"}"#),
            Err(SyncError::Auth(_))
        ));
    }

    #[test]
    fn debug_hides_secrets() {
        let key = parse_service_account_key(
            r#"{"client_email": "a@b", "private_key": "-----BEGIN SECRET"}"#,
        )
        .unwrap();
        let auth = GoogleAuth::service_account(key);
        assert!(!format!("{auth:?}").contains("BEGIN SECRET"));
        assert!(!format!("{:?}", GoogleAuth::Static("tok".into())).contains("tok"));
    }

    #[tokio::test]
    async fn bad_private_key_is_an_auth_error() {
        let key = parse_service_account_key(
            r#"{"client_email": "a@b", "private_key": "not a pem", "token_uri": "http://127.0.0.1:9/token"}"#,
        )
        .unwrap();
        let err = ServiceAccountAuth::new(key).access_token().await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
    }
}
