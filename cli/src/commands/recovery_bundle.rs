use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Subcommand};
use swh_bundle::{rollover as bundle_rollover, BundleReader, DecryptionKeyProvider};
use swh_model::ExtendedSwhid;

use crate::config::{Config, RawSecretSharingConfig};
use crate::key_recovery::{open_and_unlock, InteractiveKeyProvider};
use crate::progress::IndicatifProgress;
use crate::swhid_arg::parse_swhid_or_url;

use super::{build_backends, exit_wrong_key, EXIT_OK};

#[derive(Debug, Args)]
pub struct RecoveryBundleArgs {
    #[command(subcommand)]
    pub command: RecoveryBundleCommand,
}

#[derive(Debug, Subcommand)]
pub enum RecoveryBundleCommand {
    /// Print the manifest and basic statistics about a recovery bundle.
    Info(InfoArgs),
    /// Extract one content object's raw bytes from a recovery bundle.
    ExtractContent(ExtractContentArgs),
    /// Restore every object in a recovery bundle into the configured
    /// restoration storage.
    Restore(PathArgs),
    /// Resume a removal that was interrupted after the bundle was created
    /// but before (or during) deletion.
    ResumeRemoval(PathArgs),
    /// Reconstruct and print the object decryption key from a quorum of
    /// shares.
    RecoverDecryptionKey(PathArgs),
    /// Re-seal a bundle's object decryption key under a new secret-sharing
    /// configuration.
    Rollover(RolloverArgs),
}

#[derive(Debug, Args)]
pub struct PathArgs {
    path: PathBuf,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    path: PathBuf,
    #[arg(long)]
    dump_manifest: bool,
    #[arg(long)]
    show_encrypted_secrets: bool,
}

#[derive(Debug, Args)]
pub struct ExtractContentArgs {
    path: PathBuf,
    #[arg(value_parser = parse_swhid_or_url)]
    swhid: ExtendedSwhid,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RolloverArgs {
    path: PathBuf,
    #[arg(long = "new-config")]
    new_config: PathBuf,
}

pub fn run(args: RecoveryBundleArgs, config: &Config) -> anyhow::Result<ExitCode> {
    match args.command {
        RecoveryBundleCommand::Info(args) => info(args),
        RecoveryBundleCommand::ExtractContent(args) => extract_content(args),
        RecoveryBundleCommand::Restore(args) => restore(args, config),
        RecoveryBundleCommand::ResumeRemoval(args) => resume_removal(args, config),
        RecoveryBundleCommand::RecoverDecryptionKey(args) => recover_decryption_key(args),
        RecoveryBundleCommand::Rollover(args) => rollover(args),
    }
}

fn info(args: InfoArgs) -> anyhow::Result<ExitCode> {
    let bundle = BundleReader::open(&args.path)?;
    let manifest = bundle.manifest();

    if args.dump_manifest {
        print!("{}", manifest.dump()?);
        return Ok(EXIT_OK);
    }

    println!("removal identifier: {}", manifest.removal_identifier);
    println!("version: {}", manifest.version);
    println!("created: {}", manifest.created);
    if let Some(reason) = &manifest.reason {
        println!("reason: {reason}");
    }
    if let Some(expire) = &manifest.expire {
        println!("expire: {expire}");
    }
    println!("objects: {}", manifest.swhids.len());
    println!("decryption key shares: {}", manifest.decryption_key_shares.len());
    if args.show_encrypted_secrets {
        for (share_id, ciphertext) in &manifest.decryption_key_shares {
            println!("--- {share_id} ---\n{ciphertext}");
        }
    }
    Ok(EXIT_OK)
}

fn extract_content(args: ExtractContentArgs) -> anyhow::Result<ExitCode> {
    let mut bundle = match open_and_unlock(&args.path) {
        Ok(bundle) => bundle,
        Err(swh_bundle::Error::WrongDecryptionKey) => return Ok(exit_wrong_key()),
        Err(e) => return Err(e.into()),
    };

    let output_path = if let Some(output) = args.output {
        output
    } else if let Some(dir) = args.output_dir {
        dir.join(args.swhid.to_string())
    } else {
        PathBuf::from(args.swhid.to_string())
    };

    let mut file = File::create(&output_path)?;
    bundle.write_content_data(args.swhid, &mut file)?;
    println!("Wrote {}", output_path.display());
    Ok(EXIT_OK)
}

fn restore(args: PathArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let backends = build_backends(config)?;
    if backends.restoration_storage.is_none() {
        anyhow::bail!("missing [restoration_storage] configuration");
    }
    let progress = IndicatifProgress::new();
    let mut remover = backends.remover(&progress);

    remover.register_objects_from_bundle(&args.path, recover_secret_key(&args.path)?)?;
    let counters = remover.restore_recovery_bundle()?;
    println!("restored: {counters:?}");
    Ok(EXIT_OK)
}

fn resume_removal(args: PathArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let backends = build_backends(config)?;
    let progress = IndicatifProgress::new();
    let mut remover = backends.remover(&progress);

    remover.register_objects_from_bundle(&args.path, recover_secret_key(&args.path)?)?;
    if let Err(e) = remover.remove() {
        eprintln!("removal failed ({e}), restoring from recovery bundle…");
        remover.restore_recovery_bundle()?;
        return Ok(super::exit_removal_error());
    }
    println!("removal resumed and completed.");
    Ok(EXIT_OK)
}

fn recover_decryption_key(args: PathArgs) -> anyhow::Result<ExitCode> {
    match recover_secret_key(&args.path) {
        Ok(key) => {
            println!("{key}");
            Ok(EXIT_OK)
        }
        Err(_) => Ok(exit_wrong_key()),
    }
}

fn recover_secret_key(path: &PathBuf) -> anyhow::Result<String> {
    let bundle = BundleReader::open(path)?;
    InteractiveKeyProvider
        .object_decryption_key(bundle.manifest())
        .map_err(anyhow::Error::from)
}

fn rollover(args: RolloverArgs) -> anyhow::Result<ExitCode> {
    let new_config_text = std::fs::read_to_string(&args.new_config)?;
    let new_config: RawSecretSharingConfig = toml::from_str(&new_config_text)?;
    bundle_rollover(&args.path, &InteractiveKeyProvider, &new_config.into_config())?;
    println!("Rolled over {}", args.path.display());
    Ok(EXIT_OK)
}
