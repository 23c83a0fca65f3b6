use crate::workspace::{TemplateStatus, WorkspacePath};
use crate::{ui, Workspace};
use anyhow::Result;

pub fn execute(workspace: &Workspace, force: bool) -> Result<()> {
    for status in workspace.init(force)? {
        match status {
            TemplateStatus::Created(path) => ui::success("Created", path.display()),
            TemplateStatus::Overwritten(path) => ui::success("Overwrote", path.display()),
            TemplateStatus::Skipped(path) => {
                ui::info(format!("{} exists (use --force to overwrite)", path.display()))
            }
        }
    }
    ui::info(format!(
        "Workspace ready at {}",
        workspace.path(WorkspacePath::Root).display()
    ));
    Ok(())
}
