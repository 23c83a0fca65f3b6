use crate::workspace::WorkspacePath;
use crate::{ui, Lockfile, Workspace};
use anyhow::{bail, Result};

pub fn execute(workspace: &Workspace, name: Option<&str>) -> Result<()> {
    let lockfile_path = workspace.path(WorkspacePath::Lockfile);
    if !lockfile_path.exists() {
        ui::info("Not provisioned yet. Run 'edenv provision'.");
        return Ok(());
    }

    let lockfile = Lockfile::load(&lockfile_path)?;

    if let Some(name) = name {
        let Some(receipt) = lockfile.download(name) else {
            bail!("No download named '{}' in {:?}", name, lockfile_path);
        };
        println!("Name:        {}", receipt.name);
        println!("Url:         {}", receipt.url);
        println!("Dest:        {}", receipt.dest.display());
        println!("Sha256:      {}", receipt.sha256);
        println!("Installed:   {}", receipt.installed_at);
        return Ok(());
    }

    println!("Provisioned: {}", lockfile.provisioned_at);
    println!("Profile:     {}", lockfile.profile.display());
    println!("Exports:     {}", lockfile.exports.join(", "));

    if lockfile.downloads.is_empty() {
        println!("Downloads:   none");
    } else {
        println!("Downloads:");
        for receipt in &lockfile.downloads {
            println!(
                "  {:<20} {} (sha256 {})",
                receipt.name,
                receipt.dest.display(),
                &receipt.sha256[..receipt.sha256.len().min(12)]
            );
        }
    }

    Ok(())
}
