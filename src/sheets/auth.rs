use crate::config::{Config, GoogleConfig};
use crate::error::{AppError, Result};
use crate::sheets::client::AUTH_SCOPE;
use hyper_util::client::legacy::connect::HttpConnector;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use tiny_http::{Response, Server};
use tracing::{debug, info, instrument};
use url::Url;
use yup_oauth2::{
    ApplicationSecret, AuthorizedUserAuthenticator, authenticator::Authenticator,
    authorized_user::AuthorizedUserSecret, hyper_rustls::HttpsConnector,
};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CALLBACK_PORT: u16 = 3000;

const AUTHORIZED_USER: &str = "authorized_user";

type AuthType = Authenticator<HttpsConnector<HttpConnector>>;

/// Persisted authorization material, in the authorized-user shape Google's
/// client libraries read back.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub(super) struct StoredCredential {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl StoredCredential {
    fn is_usable(&self) -> bool {
        self.key_type == AUTHORIZED_USER && !self.refresh_token.is_empty()
    }
}

impl From<StoredCredential> for AuthorizedUserSecret {
    fn from(credential: StoredCredential) -> Self {
        AuthorizedUserSecret {
            client_id: credential.client_id,
            client_secret: credential.client_secret,
            refresh_token: credential.refresh_token,
            key_type: credential.key_type,
        }
    }
}

/// Obtain a credential, build an authenticator that mints access tokens from
/// its refresh token, and verify it by fetching a token
pub(super) async fn create_and_verify_authenticator(config: &GoogleConfig) -> Result<AuthType> {
    let store = CredentialStore::from_config(config)?;
    let credential = store.obtain().await?;

    let auth = AuthorizedUserAuthenticator::builder(credential.into())
        .build()
        .await
        .map_err(|e| AppError::Auth(format!("Failed to build authenticator: {}", e)))?;

    // Trigger a token fetch so a stale refresh token surfaces here rather
    // than on the first sheet call
    let _token = auth
        .token(&[AUTH_SCOPE])
        .await
        .map_err(|e| AppError::Auth(format!("Failed to get token: {}", e)))?;

    Ok(auth)
}

pub(super) struct CredentialStore {
    credentials_path: PathBuf,
    token_path: PathBuf,
}

impl CredentialStore {
    pub(super) fn new(credentials_path: PathBuf, token_path: PathBuf) -> Self {
        Self {
            credentials_path,
            token_path,
        }
    }

    pub(super) fn from_config(config: &GoogleConfig) -> Result<Self> {
        Ok(Self::new(config.credentials_file()?, token_cache_path()?))
    }

    /// Return the cached credential or run the interactive consent flow once
    /// and persist its result.
    pub(super) async fn obtain(&self) -> Result<StoredCredential> {
        if let Some(credential) = self.load_cached() {
            debug!("Using cached Google credential");
            return Ok(credential);
        }

        debug!("No cached Google credential, starting interactive authorization");
        let secret = self.read_client_secret()?;
        let refresh_token = authorize_interactive(&secret).await?;

        let credential = StoredCredential {
            key_type: AUTHORIZED_USER.to_string(),
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            refresh_token,
        };
        self.persist(&credential)?;

        Ok(credential)
    }

    /// A missing, unreadable, or malformed token file means "not authorized
    /// yet", never an error.
    fn load_cached(&self) -> Option<StoredCredential> {
        let contents = fs::read_to_string(&self.token_path).ok()?;
        let credential: StoredCredential = serde_json::from_str(&contents).ok()?;

        credential.is_usable().then_some(credential)
    }

    fn persist(&self, credential: &StoredCredential) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Auth(format!("Failed to create token cache directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(credential)
            .map_err(|e| AppError::Auth(format!("Failed to serialize credential: {}", e)))?;

        // Create file with owner-only permissions from the start to avoid race condition
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.token_path)
            .map_err(|e| AppError::Auth(format!("Failed to create token file: {}", e)))?;

        file.write_all(contents.as_bytes())
            .map_err(|e| AppError::Auth(format!("Failed to write token file: {}", e)))?;

        Ok(())
    }

    /// The client secret document carries the OAuth client under either an
    /// `installed` or a `web` key.
    fn read_client_secret(&self) -> Result<ApplicationSecret> {
        let contents = fs::read(&self.credentials_path).map_err(|e| {
            AppError::Auth(format!(
                "Failed to read client secret file {:?}: {}",
                self.credentials_path, e
            ))
        })?;

        yup_oauth2::parse_application_secret(&contents)
            .map_err(|e| AppError::Auth(format!("Failed to parse client secret file: {}", e)))
    }
}

/// Walk the user through browser consent and exchange the resulting code,
/// returning the granted refresh token.
async fn authorize_interactive(secret: &ApplicationSecret) -> Result<String> {
    let client_id = ClientId::new(secret.client_id.clone());
    let client_secret = ClientSecret::new(secret.client_secret.clone());

    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
        .map_err(|e| AppError::Auth(format!("Invalid auth URL: {}", e)))?;
    let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
        .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;

    let redirect_url = format!("http://localhost:{}/callback", CALLBACK_PORT);
    let client = BasicClient::new(client_id)
        .set_client_secret(client_secret)
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(
            RedirectUrl::new(redirect_url)
                .map_err(|e| AppError::Auth(format!("Invalid redirect URL: {}", e)))?,
        );

    let http_client = reqwest::ClientBuilder::new()
        .redirect(Policy::none())
        .build()
        .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    // Google only grants a refresh token for offline access with forced consent
    let auth_request = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(AUTH_SCOPE.as_ref().to_string()))
        .set_pkce_challenge(pkce_challenge)
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent");

    // Start a local server to receive the callback
    let bind_addr = format!("127.0.0.1:{}", CALLBACK_PORT);
    let server = Server::http(&bind_addr)
        .map_err(|e| AppError::Auth(format!("Failed to bind to {}: {}", bind_addr, e)))?;

    let (auth_url, csrf_token) = auth_request.url();
    println!("Open this URL in your browser:\n{}", auth_url);
    println!();
    println!("Waiting for authorization...");

    let request = server
        .recv()
        .map_err(|e| AppError::Auth(format!("Failed to receive request: {}", e)))?;

    let callback_url = format!("http://localhost:{}{}", CALLBACK_PORT, request.url());
    let url = Url::parse(&callback_url)
        .map_err(|e| AppError::Auth(format!("Failed to parse callback URL: {}", e)))?;

    let code_pair = url
        .query_pairs()
        .find(|(key, _)| key == "code")
        .ok_or_else(|| AppError::Auth("No code in callback".to_string()))?;

    let code = AuthorizationCode::new(code_pair.1.into_owned());

    let state_pair = url
        .query_pairs()
        .find(|(key, _)| key == "state")
        .ok_or_else(|| AppError::Auth("No state in callback".to_string()))?;

    if state_pair.1.as_ref() != csrf_token.secret() {
        return Err(AppError::Auth("CSRF token mismatch".to_string()));
    }

    // Send success response
    let response = Response::from_string("Authorization successful! You can close this window.");
    request
        .respond(response)
        .map_err(|e| AppError::Auth(format!("Failed to send response: {}", e)))?;

    // Exchange the code for tokens
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(pkce_verifier)
        .request_async(&http_client)
        .await
        .map_err(|e| AppError::Auth(format!("Failed to exchange code: {:?}", e)))?;

    let refresh_token = token_result
        .refresh_token()
        .ok_or_else(|| AppError::Auth("No refresh token received".to_string()))?
        .secret()
        .clone();

    Ok(refresh_token)
}

/// Clear cached Google tokens by deleting the token file
#[instrument(name = "Clearing auth tokens for Google Sheets", skip_all)]
pub fn clear_tokens() -> Result<()> {
    let token_path = token_cache_path()?;

    if !token_path.exists() {
        debug!("No Google Sheets tokens to clear");
        return Ok(());
    }

    fs::remove_file(&token_path)
        .map_err(|e| AppError::Auth(format!("Failed to delete token file: {}", e)))?;
    info!("Cleared Google Sheets cached tokens");

    Ok(())
}

fn token_cache_path() -> Result<PathBuf> {
    Config::cache_file("token.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(
            dir.path().join("credentials.json"),
            dir.path().join("token.json"),
        )
    }

    fn valid_token_json() -> String {
        serde_json::json!({
            "type": "authorized_user",
            "client_id": "id-123",
            "client_secret": "secret-456",
            "refresh_token": "refresh-789",
        })
        .to_string()
    }

    #[test]
    fn test_load_cached_returns_persisted_credential() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(dir.path().join("token.json"), valid_token_json()).unwrap();

        let credential = store.load_cached().unwrap();

        assert_eq!(credential.client_id, "id-123");
        assert_eq!(credential.client_secret, "secret-456");
        assert_eq!(credential.refresh_token, "refresh-789");
    }

    #[test]
    fn test_load_cached_missing_file_is_none() {
        let dir = TempDir::new().unwrap();

        assert!(store_in(&dir).load_cached().is_none());
    }

    #[test]
    fn test_load_cached_corrupt_json_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(dir.path().join("token.json"), "{not json").unwrap();

        assert!(store.load_cached().is_none());
    }

    #[test]
    fn test_load_cached_wrong_type_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let contents = serde_json::json!({
            "type": "service_account",
            "client_id": "id",
            "client_secret": "secret",
            "refresh_token": "refresh",
        })
        .to_string();
        fs::write(dir.path().join("token.json"), contents).unwrap();

        assert!(store.load_cached().is_none());
    }

    #[test]
    fn test_load_cached_empty_refresh_token_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let contents = serde_json::json!({
            "type": "authorized_user",
            "client_id": "id",
            "client_secret": "secret",
            "refresh_token": "",
        })
        .to_string();
        fs::write(dir.path().join("token.json"), contents).unwrap();

        assert!(store.load_cached().is_none());
    }

    #[test]
    fn test_persist_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let credential = StoredCredential {
            key_type: AUTHORIZED_USER.to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
        };

        store.persist(&credential).unwrap();

        assert_eq!(store.load_cached().unwrap(), credential);
    }

    #[tokio::test]
    async fn test_obtain_with_cached_credential_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(dir.path().join("token.json"), valid_token_json()).unwrap();

        // No credentials.json exists, so any attempt to run the interactive
        // flow would fail; both calls must be served from the cache.
        let first = store.obtain().await.unwrap();
        let second = store.obtain().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.refresh_token, "refresh-789");
    }

    #[test]
    fn test_read_client_secret_installed_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let contents = serde_json::json!({
            "installed": {
                "client_id": "id",
                "client_secret": "secret",
                "auth_uri": GOOGLE_AUTH_URL,
                "token_uri": GOOGLE_TOKEN_URL,
                "redirect_uris": [],
            }
        })
        .to_string();
        fs::write(dir.path().join("credentials.json"), contents).unwrap();

        let secret = store.read_client_secret().unwrap();

        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.client_secret, "secret");
    }

    #[test]
    fn test_read_client_secret_web_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let contents = serde_json::json!({
            "web": {
                "client_id": "web-id",
                "client_secret": "web-secret",
                "auth_uri": GOOGLE_AUTH_URL,
                "token_uri": GOOGLE_TOKEN_URL,
                "redirect_uris": [],
            }
        })
        .to_string();
        fs::write(dir.path().join("credentials.json"), contents).unwrap();

        let secret = store.read_client_secret().unwrap();

        assert_eq!(secret.client_id, "web-id");
    }

    #[test]
    fn test_read_client_secret_missing_keys_is_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(dir.path().join("credentials.json"), "{}").unwrap();

        let err = store.read_client_secret().unwrap_err();

        assert!(matches!(err, AppError::Auth(_)));
    }
}
