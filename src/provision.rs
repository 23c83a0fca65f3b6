use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::download::{format_digest, install_artifact, Fetch};
use crate::environment::Environment;
use crate::lockfile::Lockfile;
use crate::plan::Plan;
use crate::platform::OsRelease;
use crate::profile::ProfileExporter;
use crate::runner::{split_argv, CommandRunner};
use crate::ui::{self, Progress};

/// How a run ended when it did not fail
#[derive(Debug)]
pub enum Outcome {
    /// Host is not Debian-family; nothing was touched
    Skipped { os: String },
    Provisioned(Lockfile),
}

/// Runs a plan step by step, aborting on the first failure
///
/// There is no rollback: whatever completed before a failure stays in place.
pub struct Provisioner<'a> {
    plan: &'a Plan,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetch,
    staging_dir: PathBuf,
    env: Environment,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        plan: &'a Plan,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetch,
        staging_dir: PathBuf,
        env: Environment,
    ) -> Self {
        Self {
            plan,
            runner,
            fetcher,
            staging_dir,
            env,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn run(&mut self, os_release: &OsRelease) -> Result<Outcome> {
        if !os_release.is_debian_family() {
            return Ok(Outcome::Skipped {
                os: os_release.pretty_name().to_string(),
            });
        }

        let profile_path = PathBuf::from(self.env.expand(&self.plan.profile.path)?);
        let mut exporter = ProfileExporter::new(&profile_path);

        let progress = Progress::new("Reset", profile_path.display().to_string());
        exporter.reset()?;
        progress.success("Reset", None);

        self.install_packages()?;
        self.clone_plugin_manager()?;
        self.copy_editor_config()?;
        self.write_exports(&mut exporter)?;
        self.install_plugins()?;

        let mut lockfile = Lockfile::new(profile_path);
        lockfile.exports = self
            .env
            .exports()
            .iter()
            .map(|record| record.name.clone())
            .collect();
        self.download_artifacts(&mut lockfile)?;

        Ok(Outcome::Provisioned(lockfile))
    }

    fn run_tool(&self, argv: &[String]) -> Result<()> {
        let (program, args) = split_argv(argv).context("Empty command")?;
        self.runner.run(program, args, &self.env)?;
        Ok(())
    }

    fn apt(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::new();
        if self.plan.packages.sudo {
            argv.push("sudo".to_string());
        }
        argv.push("apt-get".to_string());
        argv.extend(args.iter().map(|arg| arg.to_string()));
        argv
    }

    fn install_packages(&self) -> Result<()> {
        let packages = &self.plan.packages;
        if packages.apt.is_empty() {
            tracing::debug!("No apt packages requested");
            return Ok(());
        }

        if packages.update {
            let progress = Progress::new("Updating", "apt package lists");
            self.run_tool(&self.apt(&["update"]))?;
            progress.success("Updated", None);
        }

        let progress = Progress::new("Installing", format!("{} apt packages", packages.apt.len()));
        let mut argv = self.apt(&["install", "-y"]);
        argv.extend(packages.apt.iter().cloned());
        self.run_tool(&argv)?;
        progress.success("Installed", Some(packages.apt.join(", ")));
        Ok(())
    }

    fn clone_plugin_manager(&self) -> Result<()> {
        let Some(manager) = &self.plan.plugin_manager else {
            return Ok(());
        };

        let path = PathBuf::from(self.env.expand(&manager.path)?);
        let progress = Progress::new("Cloning", manager.repository.clone());

        if path.join(".git").exists() {
            progress.skip(format!("already present at {}", path.display()));
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        git2::Repository::clone(&manager.repository, &path).with_context(|| {
            format!("Failed to clone {} to {:?}", manager.repository, path)
        })?;
        progress.success("Cloned", Some(format!("into {}", path.display())));
        Ok(())
    }

    fn copy_editor_config(&self) -> Result<()> {
        let Some(editor) = &self.plan.editor else {
            return Ok(());
        };

        let source = self.plan.editor_source(editor);
        let target = PathBuf::from(self.env.expand(&editor.target)?);
        let progress = Progress::new("Copying", source.display().to_string());

        copy_file(&source, &target)?;
        progress.success("Copied", Some(format!("to {}", target.display())));
        Ok(())
    }

    fn write_exports(&mut self, exporter: &mut ProfileExporter) -> Result<()> {
        let progress = Progress::new("Exporting", exporter.path().display().to_string());

        exporter.begin_block(&self.plan.profile.header)?;
        for assignments in &self.plan.exports {
            exporter.export(&mut self.env, assignments)?;
        }
        exporter.end_block(&self.plan.profile.footer)?;

        progress.success(
            "Exported",
            Some(format!("{} variables", self.env.exports().len())),
        );
        Ok(())
    }

    fn install_plugins(&self) -> Result<()> {
        let Some(manager) = &self.plan.plugin_manager else {
            return Ok(());
        };
        if manager.install.is_empty() {
            return Ok(());
        }

        let progress = Progress::new("Plugins", manager.install.join(" "));
        self.run_tool(&manager.install)?;
        progress.success("Plugins", None);
        Ok(())
    }

    fn download_artifacts(&self, lockfile: &mut Lockfile) -> Result<()> {
        for download in &self.plan.downloads {
            let url = self.env.expand(&download.url)?;
            let url = Url::parse(&url).with_context(|| format!("Invalid url for '{}'", download.name))?;
            let dest = PathBuf::from(self.env.expand(&download.dest)?);

            let progress = Progress::new("Downloading", download.name.clone());
            let installed = install_artifact(
                self.fetcher,
                &url,
                &dest,
                download.kind,
                download.checksum.as_deref(),
                download.executable,
                &self.staging_dir,
            )
            .with_context(|| format!("Failed to install '{}'", download.name))?;

            let digest = format_digest(&installed.sha256);
            tracing::info!("{} sha256 {}", download.name, digest);
            progress.success(
                "Downloaded",
                Some(format!("to {} ({} files)", installed.dest.display(), installed.files)),
            );
            lockfile.record_download(&download.name, url.as_str(), installed.dest, digest);
        }

        if self.plan.downloads.is_empty() {
            ui::info("No downloads requested");
        }
        Ok(())
    }
}

fn copy_file(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    fs::copy(source, target)
        .with_context(|| format!("Failed to copy {:?} to {:?}", source, target))?;
    Ok(())
}
