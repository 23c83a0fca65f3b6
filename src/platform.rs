use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_OS_RELEASE: &str = "/etc/os-release";

/// Parsed `os-release` descriptor
#[derive(Debug, Clone, Default)]
pub struct OsRelease {
    fields: HashMap<String, String>,
}

impl OsRelease {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read OS release file {:?}", path))?;
        Ok(Self::parse(&contents))
    }

    pub fn parse(contents: &str) -> Self {
        let fields = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), unquote(value.trim())))
            .collect();

        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get("ID")
    }

    /// Human readable name for diagnostics
    pub fn pretty_name(&self) -> &str {
        self.get("PRETTY_NAME")
            .or_else(|| self.get("NAME"))
            .or_else(|| self.id())
            .unwrap_or("unknown")
    }

    /// Debian itself or a derivative that declares it in `ID_LIKE`
    pub fn is_debian_family(&self) -> bool {
        if self.id().is_some_and(|id| id.eq_ignore_ascii_case("debian")) {
            return true;
        }

        self.get("ID_LIKE").is_some_and(|like| {
            like.split_whitespace()
                .any(|id| id.eq_ignore_ascii_case("debian"))
        })
    }
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    stripped.replace("\\\"", "\"")
}
