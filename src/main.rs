use clap::Parser;
use edenv::cli::Cli;
use edenv::commands;
use std::process;

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "edenv=debug,info"
    } else {
        "edenv=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    if let Err(err) = commands::execute(cli) {
        edenv::report_error(&err);
        process::exit(edenv::exit_code(&err));
    }
}
