// Public API
pub mod cli;
pub mod commands;
pub mod error;

// Core domain types
mod download;
mod environment;
mod lockfile;
mod plan;
mod platform;
mod profile;
mod provision;
mod runner;
mod ui;
mod workspace;

// Re-export main types
pub use download::{Fetch, HttpFetcher};
pub use environment::{Environment, ExportRecord};
pub use error::Error;
pub use lockfile::Lockfile;
pub use plan::{ArtifactKind, DownloadSpec, Plan};
pub use platform::OsRelease;
pub use profile::{strip_managed_block, BlockState, ProfileExporter, END_MARKER, START_MARKER};
pub use provision::{Outcome, Provisioner};
pub use runner::{CommandRunner, SystemRunner};
pub use workspace::{Workspace, WorkspacePath};

/// Print a fatal error the way the rest of the CLI reports status
pub fn report_error(err: &anyhow::Error) {
    ui::error(format!("{err:#}"));
}

/// Process exit code for a failed run
///
/// A failing external tool's own exit code is passed through.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(Error::exit_code)
        .unwrap_or(1)
}
