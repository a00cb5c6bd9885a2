pub mod list_candidates;
pub mod recovery_bundle;
pub mod remove;

use std::process::ExitCode;

use indexmap::IndexMap;
use swh_graph::traits::{JournalWriter, ObjectDeletionInterface, ObjectStore, Search};
use swh_graph::{GraphService, ProgressReporter};
use swh_model::ExtendedSwhid;
use swh_remover::Remover;

use crate::backends;
use crate::config::Config;

pub const EXIT_OK: ExitCode = ExitCode::SUCCESS;

pub fn exit_removal_error() -> ExitCode {
    ExitCode::from(1)
}

pub fn exit_wrong_key() -> ExitCode {
    ExitCode::from(2)
}

/// Everything a `Remover` needs, built once from the loaded configuration
/// and kept alive for the duration of one subcommand.
pub struct Backends {
    pub storage: Box<dyn swh_graph::traits::ArchiveStorage>,
    pub graph_service: Box<dyn GraphService>,
    pub restoration_storage: Option<Box<dyn swh_graph::traits::ArchiveStorage>>,
    pub removal_searches: IndexMap<String, backends::NoopBackend>,
    pub removal_storages: IndexMap<String, backends::NoopBackend>,
    pub removal_objstorages: IndexMap<String, backends::NoopBackend>,
    pub removal_journals: IndexMap<String, backends::NoopBackend>,
}

pub fn build_backends(config: &Config) -> anyhow::Result<Backends> {
    let storage_cfg = config
        .storage
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("missing [storage] configuration"))?;
    let graph_cfg = config
        .graph
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("missing [graph] configuration"))?;

    Ok(Backends {
        storage: backends::build_archive_storage(storage_cfg)?,
        graph_service: backends::build_graph_service(graph_cfg)?,
        restoration_storage: config
            .restoration_storage
            .as_ref()
            .map(backends::build_archive_storage)
            .transpose()?,
        removal_searches: config
            .removal_searches
            .iter()
            .map(|(name, cfg)| Ok((name.clone(), backends::build_noop(name, cfg)?)))
            .collect::<anyhow::Result<_>>()?,
        removal_storages: config
            .removal_storages
            .iter()
            .map(|(name, cfg)| Ok((name.clone(), backends::build_noop(name, cfg)?)))
            .collect::<anyhow::Result<_>>()?,
        removal_objstorages: config
            .removal_objstorages
            .iter()
            .map(|(name, cfg)| Ok((name.clone(), backends::build_noop(name, cfg)?)))
            .collect::<anyhow::Result<_>>()?,
        removal_journals: config
            .removal_journals
            .iter()
            .map(|(name, cfg)| Ok((name.clone(), backends::build_noop(name, cfg)?)))
            .collect::<anyhow::Result<_>>()?,
    })
}

impl Backends {
    pub fn remover<'a>(&'a self, progress: &'a dyn ProgressReporter) -> Remover<'a> {
        let searches: IndexMap<String, &dyn Search> = self
            .removal_searches
            .iter()
            .map(|(name, b)| (name.clone(), b as &dyn Search))
            .collect();
        let storages: IndexMap<String, &dyn ObjectDeletionInterface> = self
            .removal_storages
            .iter()
            .map(|(name, b)| (name.clone(), b as &dyn ObjectDeletionInterface))
            .collect();
        let objstorages: IndexMap<String, &dyn ObjectStore> = self
            .removal_objstorages
            .iter()
            .map(|(name, b)| (name.clone(), b as &dyn ObjectStore))
            .collect();
        let journals: IndexMap<String, &dyn JournalWriter> = self
            .removal_journals
            .iter()
            .map(|(name, b)| (name.clone(), b as &dyn JournalWriter))
            .collect();

        Remover::new(
            self.storage.as_ref(),
            self.graph_service.as_ref(),
            self.restoration_storage.as_deref(),
            searches,
            storages,
            objstorages,
            journals,
            progress,
        )
    }
}

pub fn print_swhids(swhids: &[ExtendedSwhid]) {
    for swhid in swhids {
        println!("{swhid}");
    }
}
