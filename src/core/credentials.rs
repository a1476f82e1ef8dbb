//! Throwaway registry credentials and the credential file they end up in

use crate::core::endpoint::RegistryEndpoint;
use fs2::FileExt;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name and password of the user created for one run
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub password: String,
}

impl Credential {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }

    /// Random, unique name and password
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string(), Uuid::new_v4().to_string())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token issued by the registry when the user was created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// npmrc-style credential file.
///
/// Lines are only ever appended. Each append holds an exclusive lock on the
/// file so parallel runs sharing one file never interleave partial lines.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line`, creating the file (and its directory) when missing
    pub fn append_line(&self, line: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        // Keep the previous last line intact when it lacks a newline
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        // Lock released when the file is closed
        Ok(())
    }

    /// Append the `_authToken` line for `endpoint`; returns the written line
    pub fn append_auth_token(
        &self,
        endpoint: &RegistryEndpoint,
        token: &AuthToken,
    ) -> io::Result<String> {
        let line = endpoint.auth_token_line(token.as_str());
        self.append_line(&line)?;
        Ok(line)
    }
}
