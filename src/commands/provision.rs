use crate::download::HttpFetcher;
use crate::provision::{Outcome, Provisioner};
use crate::runner::SystemRunner;
use crate::workspace::WorkspacePath;
use crate::{ui, Environment, OsRelease, Plan, Workspace};
use anyhow::Result;
use std::path::Path;

pub fn execute(workspace: &Workspace, plan: Option<&Path>, os_release: &Path) -> Result<()> {
    let release = OsRelease::load(os_release)?;
    if !release.is_debian_family() {
        report_skip(release.pretty_name());
        return Ok(());
    }

    let plan = Plan::load(&workspace.plan_path(plan))?;
    let fetcher = HttpFetcher::new()?;
    let mut provisioner = Provisioner::new(
        &plan,
        &SystemRunner,
        &fetcher,
        workspace.path(WorkspacePath::Staging),
        Environment::from_process(),
    );

    match provisioner.run(&release)? {
        Outcome::Skipped { os } => report_skip(&os),
        Outcome::Provisioned(lockfile) => {
            lockfile.save(&workspace.path(WorkspacePath::Lockfile))?;
            ui::success(
                "Finished",
                format!(
                    "Open a new shell or run 'source {}' to load the exports.",
                    lockfile.profile.display()
                ),
            );
        }
    }

    Ok(())
}

fn report_skip(os: &str) {
    println!("{os} is not Debian-based; skipping editor environment setup.");
}
