use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, ValueEnum};
use swh_model::ExtendedSwhid;

use crate::config::Config;
use crate::progress::IndicatifProgress;
use crate::swhid_arg::parse_swhid_or_url;

use super::{build_backends, exit_removal_error, EXIT_OK};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DryRun {
    StopBeforeRecoveryBundle,
    StopBeforeRemoval,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    #[arg(long, value_enum)]
    dry_run: Option<DryRun>,
    #[arg(long)]
    identifier: String,
    #[arg(long)]
    reason: Option<String>,
    #[arg(long, value_parser = parse_expire)]
    expire: Option<DateTime<Utc>>,
    #[arg(long = "recovery-bundle")]
    recovery_bundle: PathBuf,
    #[arg(value_parser = parse_swhid_or_url, num_args = 1.., required = true)]
    swhids: Vec<ExtendedSwhid>,
}

fn parse_expire(s: &str) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| "invalid expiration date".to_string())
}

pub fn run(args: RemoveArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let backends = build_backends(config)?;
    let progress = IndicatifProgress::new();
    let mut remover = backends.remover(&progress);

    let removable = remover.get_removable(&args.swhids)?;
    println!("{} objects are candidates for removal:", removable.len());
    super::print_swhids(&removable);

    if matches!(args.dry_run, Some(DryRun::StopBeforeRecoveryBundle)) {
        return Ok(EXIT_OK);
    }

    let secret_sharing = config
        .recovery_bundles
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("missing [recovery_bundles.secret_sharing] configuration"))?
        .secret_sharing
        .clone()
        .into_config();

    remover.create_recovery_bundle(
        &secret_sharing,
        &removable,
        &args.recovery_bundle,
        args.identifier,
        args.reason,
        args.expire,
    )?;
    println!("Recovery bundle written to {}", args.recovery_bundle.display());

    if matches!(args.dry_run, Some(DryRun::StopBeforeRemoval)) {
        return Ok(EXIT_OK);
    }

    if let Err(e) = remover.remove() {
        eprintln!("removal failed ({e}), restoring from recovery bundle…");
        match remover.restore_recovery_bundle() {
            Ok(counters) => eprintln!("rollback complete: {counters:?}"),
            Err(rollback_err) => eprintln!("rollback also failed: {rollback_err}"),
        }
        return Ok(exit_removal_error());
    }

    println!("{} objects removed.", removable.len());
    Ok(EXIT_OK)
}
