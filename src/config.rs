//! `linkstore.toml` - per-project defaults for the CLI

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rows per page when `rows` is called without `--limit`
pub const DEFAULT_PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LinkstoreConfig {
    /// Database file, relative to the working directory
    pub database: Option<String>,
    pub page_size: Option<u64>,
    #[serde(default)]
    pub verbose: bool,
}

impl LinkstoreConfig {
    pub fn page_size(&self) -> u64 {
        self.page_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_database_path_in(Path::new(".")))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("linkstore.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".linkstore").join("linkstore.db")
}

/// Read the config file; a missing file is not an error
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<LinkstoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: LinkstoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &LinkstoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("linkstore.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linkstore.toml");
        let config = LinkstoreConfig {
            database: Some("data/app.db".to_string()),
            page_size: Some(20),
            verbose: true,
        };
        write_config(&path, &config, false).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.database.as_deref(), Some("data/app.db"));
        assert_eq!(loaded.page_size(), 20);
        assert!(loaded.verbose);
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linkstore.toml");
        write_config(&path, &LinkstoreConfig::default(), false).unwrap();

        let err = write_config(&path, &LinkstoreConfig::default(), false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert!(write_config(&path, &LinkstoreConfig::default(), true).is_ok());
    }

    #[test]
    fn test_defaults() {
        let config: LinkstoreConfig = toml::from_str("").unwrap();
        assert_eq!(config.page_size(), DEFAULT_PAGE_SIZE);
        assert!(!config.verbose);
        assert_eq!(config.database_path(), PathBuf::from("./.linkstore/linkstore.db"));

        let zero: LinkstoreConfig = toml::from_str("page_size = 0").unwrap();
        assert_eq!(zero.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join(".linkstore").join("linkstore.db");
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
        ensure_db_dir(Path::new("plain.db")).unwrap();
    }
}
