use crate::{ui, Plan, Workspace};
use anyhow::Result;
use std::path::Path;

pub fn execute(workspace: &Workspace, plan: Option<&Path>) -> Result<()> {
    let plan_path = workspace.plan_path(plan);
    let plan = Plan::load(&plan_path)?;
    let issues = plan.validate();

    if issues.is_empty() {
        ui::success(
            "Check",
            format!(
                "{} is valid ({} packages, {} exports, {} downloads).",
                plan_path.display(),
                plan.packages.apt.len(),
                plan.exports.len(),
                plan.downloads.len()
            ),
        );
        return Ok(());
    }

    for issue in &issues {
        ui::error(format!("{} [{}]: {}", plan_path.display(), issue.context, issue.message));
    }
    anyhow::bail!("Plan validation failed ({} issue(s)).", issues.len());
}
