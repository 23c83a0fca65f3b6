use crate::cli::{Cli, Commands};
use crate::Workspace;
use anyhow::Result;

mod check;
mod env;
mod init;
mod provision;
mod reset;
mod status;

pub fn execute(cli: Cli) -> Result<()> {
    let workspace = Workspace::new()?;

    match cli.command {
        Commands::Init { force } => init::execute(&workspace, force),

        Commands::Provision { plan, os_release } => {
            provision::execute(&workspace, plan.as_deref(), &os_release)
        }

        Commands::Reset { plan, profile } => {
            reset::execute(&workspace, plan.as_deref(), profile.as_deref())
        }

        Commands::Env { plan } => env::execute(&workspace, plan.as_deref()),

        Commands::Check { plan } => check::execute(&workspace, plan.as_deref()),

        Commands::Status { name } => status::execute(&workspace, name.as_deref()),
    }
}
