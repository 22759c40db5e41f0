//! File-backed backend token for the relay.
//!
//! The token file holds the raw bearer token and nothing else. It is only
//! ever replaced after a successful login, so a failed refresh leaves the
//! previous token in place for the next order poll.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use url::Url;

use super::RelayError;
use crate::Credentials;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Backend token persisted between relay ticks.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    login_url: String,
    credentials: Credentials,
}

impl TokenStore {
    #[must_use]
    pub fn new(path: PathBuf, backend_url: &Url, credentials: Credentials) -> Self {
        Self {
            path,
            login_url: format!("{}/auth/login", backend_url.as_str().trim_end_matches('/')),
            credentials,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current token.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::MissingToken` if the file does not exist or is
    /// blank, and `RelayError::Io` for other read failures.
    pub async fn read(&self) -> Result<SecretString, RelayError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if !contents.trim().is_empty() => {
                Ok(SecretString::from(contents.trim().to_string()))
            }
            Ok(_) => Err(RelayError::MissingToken(self.path.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RelayError::MissingToken(self.path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Log in to the backend and replace the stored token.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::AuthenticationFailed` if the backend refuses the
    /// credentials, `RelayError::Http` on transport failures, and
    /// `RelayError::Io` if the token cannot be written.
    #[instrument(skip_all, fields(email = %self.credentials.email))]
    pub async fn refresh(&self, client: &reqwest::Client) -> Result<SecretString, RelayError> {
        let response = client
            .post(&self.login_url)
            .json(&LoginRequest {
                email: &self.credentials.email,
                password: self.credentials.password.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RelayError::AuthenticationFailed(format!(
                "HTTP {status}: {text}"
            )));
        }

        let login: LoginResponse = response.json().await?;
        if login.token.trim().is_empty() {
            return Err(RelayError::AuthenticationFailed(
                "backend returned an empty token".to_string(),
            ));
        }

        self.store(&login.token).await?;
        info!(path = %self.path.display(), "Backend token refreshed");
        Ok(SecretString::from(login.token))
    }

    /// Write through a temp file and rename so readers never see a partial
    /// token.
    async fn store(&self, token: &str) -> Result<(), RelayError> {
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, token).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn store_at(path: PathBuf) -> TokenStore {
        TokenStore::new(
            path,
            &Url::parse("https://backend.test/api/").unwrap(),
            "relay@stowage.test:secret".parse().unwrap(),
        )
    }

    #[test]
    fn test_login_url() {
        let store = store_at(PathBuf::from("token.json"));
        assert_eq!(store.login_url, "https://backend.test/api/auth/login");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path().join("token.json"));
        assert!(matches!(
            store.read().await.unwrap_err(),
            RelayError::MissingToken(_)
        ));
    }

    #[tokio::test]
    async fn test_read_blank_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        tokio::fs::write(&path, "  \n").await.unwrap();
        assert!(matches!(
            store_at(path).read().await.unwrap_err(),
            RelayError::MissingToken(_)
        ));
    }

    #[tokio::test]
    async fn test_store_then_read() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path().join("token.json"));

        store.store("eyJhbGciOi.first").await.unwrap();
        store.store("eyJhbGciOi.second\n").await.unwrap();

        assert_eq!(store.read().await.unwrap().expose_secret(), "eyJhbGciOi.second");
        assert!(!dir.path().join("token.tmp").exists());
    }
}
