//! HTTP request handlers

pub mod packages;
pub mod status;
pub mod users;

use crate::http::auth::UserStore;
use crate::http::storage::PackageStorage;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub storage: Arc<PackageStorage>,
    pub start_time: SystemTime,
}

impl AppState {
    /// State over `storage_dir` with users from `auth_file`
    pub fn new(storage_dir: &Path, auth_file: &Path) -> std::io::Result<Self> {
        Ok(Self {
            users: Arc::new(UserStore::open(auth_file)?),
            storage: Arc::new(PackageStorage::new(storage_dir)),
            start_time: SystemTime::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_secs()
    }
}
