use crate::{ui, Environment, Plan, ProfileExporter, Workspace};
use anyhow::Result;
use std::path::{Path, PathBuf};

pub fn execute(workspace: &Workspace, plan: Option<&Path>, profile: Option<&Path>) -> Result<()> {
    let profile_path = match profile {
        Some(path) => path.to_path_buf(),
        None => {
            let plan = Plan::load(&workspace.plan_path(plan))?;
            PathBuf::from(Environment::from_process().expand(&plan.profile.path)?)
        }
    };

    ProfileExporter::new(&profile_path).reset()?;
    ui::success("Reset", profile_path.display());
    Ok(())
}
