use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::plan::{DEFAULT_PLAN, DEFAULT_VIMRC};

/// Template file definition for workspace initialization
struct TemplateFile {
    /// Path relative to the workspace root
    path: &'static str,
    /// File content embedded at compile time
    content: &'static str,
}

const TEMPLATE_FILES: &[TemplateFile] = &[
    TemplateFile {
        path: "edenv.toml",
        content: DEFAULT_PLAN,
    },
    TemplateFile {
        path: "vimrc",
        content: DEFAULT_VIMRC,
    },
];

/// Workspace path types
#[derive(Debug, Clone, Copy)]
pub enum WorkspacePath {
    /// Workspace root: $XDG_CONFIG_HOME/edenv
    Root,
    /// Default plan: workspace/edenv.toml
    Plan,
    /// Lockfile path: $XDG_STATE_HOME/edenv/edenv.lock
    Lockfile,
    /// Archive staging: $XDG_CACHE_HOME/edenv/downloads
    Staging,
}

/// Outcome of writing one template file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateStatus {
    Created(PathBuf),
    Overwritten(PathBuf),
    Skipped(PathBuf),
}

/// XDG-rooted directories edenv reads and writes
#[derive(Debug)]
pub struct Workspace {
    /// $XDG_CONFIG_HOME/edenv (plan and editor config)
    workspace_dir: PathBuf,
    /// $XDG_STATE_HOME/edenv (lockfile)
    state_dir: PathBuf,
    /// $XDG_CACHE_HOME/edenv (download staging)
    cache_dir: PathBuf,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            workspace_dir: xdg_dir("XDG_CONFIG_HOME", ".config")?.join("edenv"),
            state_dir: xdg_dir("XDG_STATE_HOME", ".local/state")?.join("edenv"),
            cache_dir: xdg_dir("XDG_CACHE_HOME", ".cache")?.join("edenv"),
        })
    }

    /// Get path for a specific workspace location
    pub fn path(&self, path_type: WorkspacePath) -> PathBuf {
        match path_type {
            WorkspacePath::Root => self.workspace_dir.clone(),
            WorkspacePath::Plan => self.workspace_dir.join("edenv.toml"),
            WorkspacePath::Lockfile => self.state_dir.join("edenv.lock"),
            WorkspacePath::Staging => self.cache_dir.join("downloads"),
        }
    }

    /// Plan to use: the explicit one or the workspace default
    pub fn plan_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.path(WorkspacePath::Plan))
    }

    /// Write the default plan and editor config
    ///
    /// Existing files are left alone unless `force` is set.
    pub fn init(&self, force: bool) -> Result<Vec<TemplateStatus>> {
        fs::create_dir_all(&self.workspace_dir).with_context(|| {
            format!("Failed to create workspace directory {:?}", self.workspace_dir)
        })?;

        let mut statuses = Vec::with_capacity(TEMPLATE_FILES.len());
        for template in TEMPLATE_FILES {
            let file_path = self.workspace_dir.join(template.path);
            let existed = file_path.exists();

            if existed && !force {
                statuses.push(TemplateStatus::Skipped(file_path));
                continue;
            }

            fs::write(&file_path, template.content)
                .with_context(|| format!("Failed to write template file {:?}", file_path))?;

            statuses.push(if existed {
                TemplateStatus::Overwritten(file_path)
            } else {
                TemplateStatus::Created(file_path)
            });
        }

        Ok(statuses)
    }
}

fn xdg_dir(var: &str, fallback: &str) -> Result<PathBuf> {
    if let Some(base) = env::var_os(var).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(base));
    }

    let base_dirs = directories::BaseDirs::new().context("Failed to get home directory")?;
    Ok(base_dirs.home_dir().join(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn setup_test_env() -> TempDir {
        let temp = TempDir::new().unwrap();
        env::set_var("XDG_CONFIG_HOME", temp.path());
        env::set_var("XDG_STATE_HOME", temp.path().join("state"));
        env::set_var("XDG_CACHE_HOME", temp.path().join("cache"));
        temp
    }

    #[test]
    #[serial]
    fn test_workspace_paths() {
        let temp = setup_test_env();
        let workspace = Workspace::new().unwrap();

        assert_eq!(workspace.path(WorkspacePath::Root), temp.path().join("edenv"));
        assert_eq!(
            workspace.path(WorkspacePath::Plan),
            temp.path().join("edenv/edenv.toml")
        );
        assert_eq!(
            workspace.path(WorkspacePath::Lockfile),
            temp.path().join("state/edenv/edenv.lock")
        );
        assert_eq!(
            workspace.path(WorkspacePath::Staging),
            temp.path().join("cache/edenv/downloads")
        );
    }

    #[test]
    #[serial]
    fn test_plan_path_prefers_explicit() {
        let _temp = setup_test_env();
        let workspace = Workspace::new().unwrap();
        let explicit = PathBuf::from("/srv/plans/java.toml");

        assert_eq!(workspace.plan_path(Some(&explicit)), explicit);
        assert_eq!(workspace.plan_path(None), workspace.path(WorkspacePath::Plan));
    }

    #[test]
    #[serial]
    fn test_init_creates_then_skips() {
        let _temp = setup_test_env();
        let workspace = Workspace::new().unwrap();

        let statuses = workspace.init(false).unwrap();
        assert!(statuses
            .iter()
            .all(|status| matches!(status, TemplateStatus::Created(_))));
        assert!(workspace.path(WorkspacePath::Plan).exists());
        assert!(workspace.path(WorkspacePath::Root).join("vimrc").exists());

        fs::write(workspace.path(WorkspacePath::Plan), "# custom").unwrap();
        let statuses = workspace.init(false).unwrap();
        assert!(statuses
            .iter()
            .all(|status| matches!(status, TemplateStatus::Skipped(_))));
        assert_eq!(
            fs::read_to_string(workspace.path(WorkspacePath::Plan)).unwrap(),
            "# custom"
        );
    }

    #[test]
    #[serial]
    fn test_init_force_overwrites() {
        let _temp = setup_test_env();
        let workspace = Workspace::new().unwrap();
        workspace.init(false).unwrap();
        fs::write(workspace.path(WorkspacePath::Plan), "# custom").unwrap();

        let statuses = workspace.init(true).unwrap();
        assert!(statuses
            .iter()
            .all(|status| matches!(status, TemplateStatus::Overwritten(_))));
        assert_eq!(
            fs::read_to_string(workspace.path(WorkspacePath::Plan)).unwrap(),
            DEFAULT_PLAN
        );
    }
}
