use std::process::ExitCode;

use clap::Args;
use swh_model::ExtendedSwhid;

use crate::config::Config;
use crate::progress::IndicatifProgress;
use crate::swhid_arg::parse_swhid_or_url;

use super::{build_backends, EXIT_OK};

#[derive(Debug, Args)]
pub struct ListCandidatesArgs {
    /// Skip the removability analysis and print the raw, unpruned
    /// inventory, including objects still referenced from outside it.
    #[arg(long = "no-omit-referenced", action = clap::ArgAction::SetFalse, default_value_t = true)]
    omit_referenced: bool,
    #[arg(value_parser = parse_swhid_or_url, num_args = 1.., required = true)]
    swhids: Vec<ExtendedSwhid>,
}

pub fn run(args: ListCandidatesArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let backends = build_backends(config)?;
    let progress = IndicatifProgress::new();
    let remover = backends.remover(&progress);

    let swhids = if args.omit_referenced {
        remover.get_removable(&args.swhids)?
    } else {
        remover.get_inventory(&args.swhids)?
    };
    super::print_swhids(&swhids);
    Ok(EXIT_OK)
}
