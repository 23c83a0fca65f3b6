use crate::profile::render_block;
use crate::{Environment, Plan, Workspace};
use anyhow::Result;
use std::path::Path;

pub fn execute(workspace: &Workspace, plan: Option<&Path>) -> Result<()> {
    let plan = Plan::load(&workspace.plan_path(plan))?;
    let mut env = Environment::from_process();

    let block = render_block(
        &mut env,
        &plan.profile.header,
        plan.exports.iter().map(String::as_str),
        &plan.profile.footer,
    )?;
    println!("{block}");

    Ok(())
}
