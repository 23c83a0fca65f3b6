use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const LOCKFILE_VERSION: u32 = 1;

/// Record of the last successful provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    /// Version of the lockfile format
    version: u32,
    /// When the run finished
    pub provisioned_at: String,
    /// Profile that received the managed block
    pub profile: PathBuf,
    /// Exported variable names, in order
    #[serde(default)]
    pub exports: Vec<String>,
    /// Downloaded artifacts
    #[serde(default)]
    pub downloads: Vec<DownloadReceipt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReceipt {
    pub name: String,
    pub url: String,
    pub dest: PathBuf,
    /// Hex SHA-256 of the fetched file or archive
    pub sha256: String,
    pub installed_at: String,
}

impl Lockfile {
    pub fn new(profile: PathBuf) -> Self {
        Self {
            version: LOCKFILE_VERSION,
            provisioned_at: chrono::Utc::now().to_rfc3339(),
            profile,
            exports: Vec::new(),
            downloads: Vec::new(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Load lockfile from disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read lockfile from {:?}", path))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse lockfile from {:?}", path))
    }

    /// Save lockfile to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lockfile directory {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize lockfile")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write lockfile to {:?}", path))?;

        Ok(())
    }

    pub fn record_download(&mut self, name: &str, url: &str, dest: PathBuf, sha256: String) {
        self.downloads.push(DownloadReceipt {
            name: name.to_string(),
            url: url.to_string(),
            dest,
            sha256,
            installed_at: chrono::Utc::now().to_rfc3339(),
        });
    }

    pub fn download(&self, name: &str) -> Option<&DownloadReceipt> {
        self.downloads.iter().find(|receipt| receipt.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lockfile_new() {
        let lockfile = Lockfile::new(PathBuf::from("/home/dev/.bashrc"));
        assert_eq!(lockfile.version(), LOCKFILE_VERSION);
        assert!(!lockfile.provisioned_at.is_empty());
        assert!(lockfile.exports.is_empty());
        assert!(lockfile.downloads.is_empty());
    }

    #[test]
    fn test_lockfile_save_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state/edenv.lock");

        let mut lockfile = Lockfile::new(PathBuf::from("/home/dev/.bashrc"));
        lockfile.exports = vec!["TERM".to_string(), "PMD_HOME".to_string()];
        lockfile.record_download(
            "checkstyle",
            "https://example.com/checkstyle-10.12.4-all.jar",
            PathBuf::from("/home/dev/.local/share/edenv/checkstyle.jar"),
            "ab".repeat(32),
        );

        lockfile.save(&path).unwrap();
        let loaded = Lockfile::load(&path).unwrap();

        assert_eq!(loaded.profile, PathBuf::from("/home/dev/.bashrc"));
        assert_eq!(loaded.exports, ["TERM", "PMD_HOME"]);
        let receipt = loaded.download("checkstyle").unwrap();
        assert_eq!(receipt.sha256.len(), 64);
        assert!(!receipt.installed_at.is_empty());
        assert!(loaded.download("pmd").is_none());
    }

    #[test]
    fn test_lockfile_load_missing() {
        let temp = TempDir::new().unwrap();
        let err = Lockfile::load(&temp.path().join("edenv.lock")).unwrap_err();
        assert!(err.to_string().contains("Failed to read lockfile"));
    }
}
