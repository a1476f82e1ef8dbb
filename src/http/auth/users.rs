//! Registry users backed by an htpasswd-style file

use crate::http::errors::{HttpError, HttpResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Users persisted as `name:{SHA256}<base64>:autocreated <timestamp>` lines;
/// tokens live in memory for the lifetime of the server.
#[derive(Debug)]
pub struct UserStore {
    htpasswd: PathBuf,
    users: RwLock<HashMap<String, String>>,
    tokens: RwLock<HashMap<String, String>>,
}

impl UserStore {
    /// Open the store, reading users already present in `htpasswd`
    pub fn open(htpasswd: &Path) -> std::io::Result<Self> {
        let users = match std::fs::read_to_string(htpasswd) {
            Ok(content) => parse_htpasswd(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            htpasswd: htpasswd.to_path_buf(),
            users: RwLock::new(users),
            tokens: RwLock::new(HashMap::new()),
        })
    }

    /// Create `name`, or log in when it exists with the same password.
    /// Returns a fresh token either way.
    pub async fn add_user(&self, name: &str, password: &str) -> HttpResult<String> {
        if name.is_empty() || name.contains(':') || name.contains('\n') {
            return Err(HttpError::BadRequest(format!("invalid username '{}'", name)));
        }
        if password.is_empty() {
            return Err(HttpError::BadRequest("password must not be empty".to_string()));
        }

        let hash = hash_password(password);
        {
            let mut users = self.users.write().await;
            match users.get(name) {
                Some(existing) if *existing == hash => {
                    info!("User {} logged in", name);
                }
                Some(_) => {
                    return Err(HttpError::Conflict(
                        "bad username/password, access denied".to_string(),
                    ));
                }
                None => {
                    self.append_user(name, &hash)?;
                    users.insert(name.to_string(), hash);
                    info!("User {} created", name);
                }
            }
        }

        let token = Uuid::new_v4().simple().to_string();
        self.tokens
            .write()
            .await
            .insert(token.clone(), name.to_string());
        Ok(token)
    }

    /// User owning `token`
    pub async fn username_for(&self, token: &str) -> Option<String> {
        self.tokens.read().await.get(token).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    fn append_user(&self, name: &str, hash: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.htpasswd)?;
        writeln!(
            file,
            "{}:{}:autocreated {}",
            name,
            hash,
            chrono::Utc::now().to_rfc3339()
        )
    }
}

fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    format!("{{SHA256}}{}", STANDARD.encode(digest))
}

fn parse_htpasswd(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, ':');
            let name = parts.next()?.trim();
            let hash = parts.next()?.trim();
            if name.is_empty() || hash.is_empty() {
                return None;
            }
            Some((name.to_string(), hash.to_string()))
        })
        .collect()
}
