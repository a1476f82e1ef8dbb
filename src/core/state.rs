//! Registry state reset

use crate::core::error::SetupError;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Remove the registry storage directory and auth file, then recreate both empty.
///
/// Missing paths are fine; any other I/O failure is fatal.
pub fn reset_state(storage_dir: &Path, auth_file: &Path) -> Result<(), SetupError> {
    info!(
        "Resetting registry state (storage: {}, auth: {})",
        storage_dir.display(),
        auth_file.display()
    );

    remove_path(storage_dir)?;
    fs::create_dir_all(storage_dir).map_err(|source| SetupError::Reset {
        path: storage_dir.to_path_buf(),
        source,
    })?;

    remove_path(auth_file)?;
    if let Some(parent) = auth_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| SetupError::Reset {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::File::create(auth_file).map_err(|source| SetupError::Reset {
        path: auth_file.to_path_buf(),
        source,
    })?;

    Ok(())
}

fn remove_path(path: &Path) -> Result<(), SetupError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Nothing to remove at {}", path.display());
            return Ok(());
        }
        Err(source) => {
            return Err(SetupError::Reset {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SetupError::Reset {
            path: path.to_path_buf(),
            source,
        }),
    }
}
