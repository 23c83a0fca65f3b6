use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::download::parse_sha256;
use crate::environment::parse_assignments;

/// Default plan written by `edenv init`
pub const DEFAULT_PLAN: &str = include_str!("../templates/edenv.toml");
/// Default editor configuration written by `edenv init`
pub const DEFAULT_VIMRC: &str = include_str!("../templates/vimrc");

/// Declarative description of a provisioning run (`edenv.toml`)
///
/// Every path and url field is a template expanded against the run's
/// environment just before it is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub profile: ProfileSpec,
    #[serde(default)]
    pub packages: PackageSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_manager: Option<PluginManagerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorSpec>,
    /// Ordered `NAME=value` assignments; one entry may hold several
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub downloads: Vec<DownloadSpec>,

    /// Directory the plan was loaded from; relative sources resolve here
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSpec {
    #[serde(default = "default_profile_path")]
    pub path: String,
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default = "default_footer")]
    pub footer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSpec {
    #[serde(default)]
    pub apt: Vec<String>,
    /// Run apt-get through sudo
    #[serde(default = "default_true")]
    pub sudo: bool,
    /// Refresh package lists before installing
    #[serde(default = "default_true")]
    pub update: bool,
}

impl Default for PackageSpec {
    fn default() -> Self {
        Self {
            apt: Vec::new(),
            sudo: true,
            update: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManagerSpec {
    pub repository: String,
    pub path: String,
    /// Command (argv) that makes the editor install its plugins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub install: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorSpec {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    #[default]
    File,
    Archive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSpec {
    pub name: String,
    pub url: String,
    /// Destination file, or directory to extract into for archives
    pub dest: String,
    #[serde(default)]
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default)]
    pub executable: bool,
}

/// Problem found by [`Plan::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanIssue {
    pub context: String,
    pub message: String,
}

impl PlanIssue {
    fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
        }
    }
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("Failed to read plan {:?} (run 'edenv init' to create one)", path)
        })?;

        let mut plan = Self::parse(&contents)
            .with_context(|| format!("Failed to parse plan {:?}", path))?;
        plan.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(plan)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolve the editor config source relative to the plan directory
    pub fn editor_source(&self, editor: &EditorSpec) -> PathBuf {
        self.base_dir.join(&editor.source)
    }

    /// Check the plan for problems that would only surface mid-run
    pub fn validate(&self) -> Vec<PlanIssue> {
        let mut issues = Vec::new();

        if self.profile.path.trim().is_empty() {
            issues.push(PlanIssue::new("profile", "path must not be empty"));
        }

        for package in &self.packages.apt {
            if package.trim().is_empty() || package.split_whitespace().count() > 1 {
                issues.push(PlanIssue::new(
                    "packages",
                    format!("invalid apt package name '{package}'"),
                ));
            }
        }

        if let Some(manager) = &self.plugin_manager {
            if manager.repository.trim().is_empty() {
                issues.push(PlanIssue::new("plugin_manager", "repository must not be empty"));
            }
        }

        if let Some(editor) = &self.editor {
            let source = self.editor_source(editor);
            if !source.exists() {
                issues.push(PlanIssue::new(
                    "editor",
                    format!("source {:?} does not exist", source),
                ));
            }
        }

        for (index, entry) in self.exports.iter().enumerate() {
            if let Err(err) = parse_assignments(entry) {
                issues.push(PlanIssue::new(format!("exports[{index}]"), err.to_string()));
            }
        }

        let mut names = HashSet::new();
        for download in &self.downloads {
            let context = format!("downloads.{}", download.name);
            if !names.insert(download.name.as_str()) {
                issues.push(PlanIssue::new(&context, "duplicate download name"));
            }
            if let Some(checksum) = &download.checksum {
                if let Err(err) = parse_sha256(checksum) {
                    issues.push(PlanIssue::new(&context, err.to_string()));
                }
            }
            if download.executable && download.kind == ArtifactKind::Archive {
                issues.push(PlanIssue::new(
                    &context,
                    "executable applies to files, not archives",
                ));
            }
        }

        issues
    }
}

fn default_profile_path() -> String {
    "${HOME}/.bashrc".to_string()
}

fn default_header() -> String {
    "editor environment".to_string()
}

fn default_footer() -> String {
    "end editor environment".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
exports = ["TERM=xterm-256color"]

[profile]
path = "${HOME}/.profile"
"#;

    #[test]
    fn test_parse_minimal_plan_defaults() {
        let plan = Plan::parse(MINIMAL).unwrap();
        assert_eq!(plan.profile.path, "${HOME}/.profile");
        assert_eq!(plan.profile.header, "editor environment");
        assert!(plan.packages.sudo);
        assert!(plan.packages.update);
        assert!(plan.plugin_manager.is_none());
        assert!(plan.downloads.is_empty());
        assert_eq!(plan.exports, vec!["TERM=xterm-256color"]);
    }

    #[test]
    fn test_default_template_parses() {
        let plan = Plan::parse(DEFAULT_PLAN).unwrap();
        assert!(!plan.packages.apt.is_empty());
        assert!(plan.plugin_manager.is_some());
        assert!(plan.editor.is_some());
        assert!(!plan.downloads.is_empty());
        assert!(plan.exports.iter().any(|e| e.starts_with("TERM=")));
    }

    #[test]
    fn test_default_template_validates() {
        let temp = TempDir::new().unwrap();
        let plan_path = temp.path().join("edenv.toml");
        fs::write(&plan_path, DEFAULT_PLAN).unwrap();
        fs::write(temp.path().join("vimrc"), DEFAULT_VIMRC).unwrap();

        let plan = Plan::load(&plan_path).unwrap();
        assert_eq!(plan.base_dir, temp.path());
        assert_eq!(plan.validate(), Vec::new());
    }

    #[test]
    fn test_parse_download_kinds() {
        let plan = Plan::parse(
            r#"
[profile]

[[downloads]]
name = "pmd"
url = "https://example.com/pmd.zip"
dest = "/opt"
kind = "archive"

[[downloads]]
name = "ktlint"
url = "https://example.com/ktlint"
dest = "/usr/local/bin/ktlint"
executable = true
"#,
        )
        .unwrap();

        assert_eq!(plan.profile.path, "${HOME}/.bashrc");
        assert_eq!(plan.downloads[0].kind, ArtifactKind::Archive);
        assert_eq!(plan.downloads[1].kind, ArtifactKind::File);
        assert!(plan.downloads[1].executable);
    }

    #[test]
    fn test_validate_reports_issues() {
        let mut plan = Plan::parse(MINIMAL).unwrap();
        plan.exports.push("not an assignment".to_string());
        plan.packages.apt.push("".to_string());
        plan.editor = Some(EditorSpec {
            source: "missing-vimrc".to_string(),
            target: "${HOME}/.vimrc".to_string(),
        });
        let download = DownloadSpec {
            name: "tool".to_string(),
            url: "https://example.com/tool".to_string(),
            dest: "/tmp/tool".to_string(),
            kind: ArtifactKind::File,
            checksum: Some("md5:abc".to_string()),
            executable: false,
        };
        plan.downloads.push(download.clone());
        plan.downloads.push(download);

        let issues = plan.validate();
        let contexts: Vec<_> = issues.iter().map(|i| i.context.as_str()).collect();
        assert!(contexts.contains(&"exports[1]"));
        assert!(contexts.contains(&"packages"));
        assert!(contexts.contains(&"editor"));
        assert!(contexts.contains(&"downloads.tool"));
        assert!(issues.iter().any(|i| i.message.contains("duplicate")));
    }

    #[test]
    fn test_load_missing_plan_suggests_init() {
        let temp = TempDir::new().unwrap();
        let err = Plan::load(&temp.path().join("edenv.toml")).unwrap_err();
        assert!(err.to_string().contains("edenv init"));
    }
}
