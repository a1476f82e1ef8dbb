//! Reset command implementation

use crate::cli::error::CliResult;
use clap::Args;
use regboot::BootstrapConfig;
use std::path::Path;

/// Wipe registry storage and the users file
#[derive(Debug, Args)]
pub struct ResetArgs {}

pub async fn execute_reset(config_path: Option<&Path>, _args: ResetArgs) -> CliResult<()> {
    let plan = BootstrapConfig::load(config_path)?.resolve()?;
    regboot::reset_state(&plan.storage_dir, &plan.auth_file)?;

    println!("Registry state reset:");
    println!("  Storage: {}", plan.storage_dir.display());
    println!("  Users:   {}", plan.auth_file.display());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reset_uses_server_config_paths() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("verdaccio-config.yml"),
            "storage: ./store\nauth:\n  htpasswd:\n    file: ./users\n",
        )
        .unwrap();
        let config_file = temp_dir.path().join("regboot.toml");
        std::fs::write(&config_file, "credentials_file = \"npmrc\"\n").unwrap();

        std::fs::create_dir_all(temp_dir.path().join("store/pkg")).unwrap();
        std::fs::write(temp_dir.path().join("users"), "old:hash\n").unwrap();

        execute_reset(Some(&config_file), ResetArgs {}).await.unwrap();

        let store = temp_dir.path().join("store");
        assert!(store.is_dir());
        assert_eq!(std::fs::read_dir(&store).unwrap().count(), 0);
        assert_eq!(std::fs::metadata(temp_dir.path().join("users")).unwrap().len(), 0);
    }
}
