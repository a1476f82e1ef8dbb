//! User provisioning against the registry's CouchDB-style user endpoint

use crate::core::credentials::{AuthToken, Credential, CredentialStore};
use crate::core::endpoint::RegistryEndpoint;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Cannot add new user: request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Cannot add new user: {reason} (status {status}, body: {body})")]
    Rejected {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("Failed to update credential file {}: {source}", path.display())]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Login check failed: {0}")]
    Login(String),
}

#[derive(Debug, Serialize)]
struct AddUserRequest<'a> {
    name: &'a str,
    password: &'a str,
}

/// Creates registry users and records their tokens
#[derive(Debug, Clone)]
pub struct UserProvisioner {
    client: Client,
    verify_login: bool,
}

impl UserProvisioner {
    pub fn new(timeout: Duration, verify_login: bool) -> Result<Self, ProvisioningError> {
        let client = Client::builder()
            .user_agent(concat!("regboot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ProvisioningError::Client(e.to_string()))?;
        Ok(Self {
            client,
            verify_login,
        })
    }

    /// Create `credential` on the registry, append its token to `store`,
    /// then log in with it.
    ///
    /// Nothing is written to `store` unless the registry answered 201 with a
    /// truthy `ok` and a `token`.
    pub async fn provision(
        &self,
        credential: &Credential,
        endpoint: &RegistryEndpoint,
        store: &CredentialStore,
    ) -> Result<AuthToken, ProvisioningError> {
        let url = endpoint.user_url(&credential.name);
        info!("Creating registry user {} at {}", credential.name, url);

        let response = self
            .client
            .put(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&AddUserRequest {
                name: &credential.name,
                password: &credential.password,
            })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(source) => {
                error!(url = %url, error = %source, "Cannot add new user");
                return Err(ProvisioningError::Transport { url, source });
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => {
                error!(url = %url, status = %status, error = %source, "Cannot add new user");
                return Err(ProvisioningError::Transport { url, source });
            }
        };

        let token = match token_from_response(status, &body) {
            Ok(token) => token,
            Err(reason) => {
                error!(
                    url = %url,
                    status = %status,
                    body = %body,
                    reason = %reason,
                    "Cannot add new user"
                );
                return Err(ProvisioningError::Rejected {
                    status: status.as_u16(),
                    reason,
                    body,
                });
            }
        };

        println!(
            "Successfully added new dummy user: {}. Token: {}",
            credential.name,
            token.as_str()
        );

        store
            .append_auth_token(endpoint, &token)
            .map_err(|source| ProvisioningError::CredentialFile {
                path: store.path().to_path_buf(),
                source,
            })?;
        info!("Auth token written to {}", store.path().display());

        if self.verify_login {
            self.login(credential, endpoint, &token).await?;
            println!("Successfully logged in.");
        }

        Ok(token)
    }

    /// Confirm the registry maps `token` to `credential`'s user
    pub async fn login(
        &self,
        credential: &Credential,
        endpoint: &RegistryEndpoint,
        token: &AuthToken,
    ) -> Result<(), ProvisioningError> {
        let url = endpoint.whoami_url();
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", token.as_str()))
            .send()
            .await
            .map_err(|e| ProvisioningError::Login(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProvisioningError::Login(format!(
                "{} answered {}",
                url, status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProvisioningError::Login(format!("unreadable whoami response: {}", e)))?;

        match body.get("username").and_then(Value::as_str) {
            Some(username) if username == credential.name => Ok(()),
            Some(username) => Err(ProvisioningError::Login(format!(
                "token belongs to '{}', expected '{}'",
                username, credential.name
            ))),
            None => Err(ProvisioningError::Login(
                "whoami response has no username".to_string(),
            )),
        }
    }
}

/// Extract the token from a user-creation response.
///
/// Registries put either `true` or a message string in `ok`, so any
/// JavaScript-truthy value is accepted.
pub fn token_from_response(status: StatusCode, body: &str) -> Result<AuthToken, String> {
    if status != StatusCode::CREATED {
        return Err(format!("unexpected status {}", status));
    }
    if body.trim().is_empty() {
        return Err("empty response body".to_string());
    }
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("response is not JSON: {}", e))?;
    let object = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;

    match object.get("ok") {
        Some(ok) if is_truthy(ok) => {}
        Some(_) => return Err("response 'ok' is falsy".to_string()),
        None => return Err("response has no 'ok' field".to_string()),
    }

    match object.get("token") {
        Some(Value::String(token)) if !token.is_empty() => Ok(AuthToken::new(token.clone())),
        Some(_) => Err("response 'token' is not a non-empty string".to_string()),
        None => Err("response has no 'token' field".to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
