//! `swh-alter`: plans and carries out removals of archive objects, backed
//! by an encrypted, threshold-sealed recovery bundle.

mod backends;
mod commands;
mod config;
mod key_recovery;
mod progress;
mod swhid_arg;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::list_candidates::ListCandidatesArgs;
use commands::recovery_bundle::RecoveryBundleArgs;
use commands::remove::RemoveArgs;

#[derive(Debug, Parser)]
#[command(name = "swh-alter", version, about = "Plan and carry out archive object removals")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Remove a set of objects (and everything exclusively reachable from
    /// them) from every configured backend.
    Remove(RemoveArgs),
    /// Show which objects would be removed, without doing anything.
    ListCandidates(ListCandidatesArgs),
    /// Inspect or act on an existing recovery bundle.
    RecoveryBundle(RecoveryBundleArgs),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = config::load().and_then(|config| match cli.command {
        Command::Remove(args) => commands::remove::run(args, &config),
        Command::ListCandidates(args) => commands::list_candidates::run(args, &config),
        Command::RecoveryBundle(args) => commands::recovery_bundle::run(args, &config),
    });

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("swh-alter: {e}");
            ExitCode::from(1)
        }
    }
}
