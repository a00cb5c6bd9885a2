use std::fs::File;
use std::io::{Read as _, Seek};
use std::path::Path;

use swh_graph::traits::{ArchiveStorage, ObjectCounters};
use swh_model::{ArchivedObject, ExtendedSwhid};
use swh_secret_sharing::SecretSharingConfig;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::age;
use crate::error::Error;
use crate::manifest::Manifest;

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_big_endian()
        .with_no_limit()
}

/// Something that can hand back the secret key (or YubiKey plugin identity)
/// needed to decrypt this bundle's object-decryption key, once the holder
/// has supplied enough shares. Left abstract so the CLI can prompt
/// interactively while tests can supply a canned key.
pub trait DecryptionKeyProvider {
    fn object_decryption_key(&self, manifest: &Manifest) -> Result<String, Error>;
}

/// A read-only view of a recovery bundle: the manifest is loaded eagerly
/// (it's plaintext), every other entry is decrypted lazily and only once
/// a decryption key provider has been attached.
pub struct BundleReader<R> {
    archive: ZipArchive<R>,
    manifest: Manifest,
    object_decryption_key: Option<String>,
}

impl BundleReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: std::io::Read + Seek> BundleReader<R> {
    pub fn from_reader(reader: R) -> Result<Self, Error> {
        let mut archive = ZipArchive::new(reader)?;
        let manifest = {
            let mut entry = archive
                .by_name("manifest.yml")
                .map_err(|_| Error::NotFound("manifest.yml".to_string()))?;
            let mut contents = String::new();
            entry.read_to_string(&mut contents)?;
            Manifest::load(&contents)?
        };
        Ok(BundleReader {
            archive,
            manifest,
            object_decryption_key: None,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn removal_identifier(&self) -> &str {
        &self.manifest.removal_identifier
    }

    pub fn swhids(&self) -> &[ExtendedSwhid] {
        &self.manifest.swhids
    }

    pub fn encrypted_secret(&self, share_id: &str) -> Option<&str> {
        self.manifest
            .decryption_key_shares
            .get(share_id)
            .map(String::as_str)
    }

    /// Caches the object decryption key for the lifetime of this reader,
    /// asking `provider` for it at most once.
    pub fn unlock(&mut self, provider: &dyn DecryptionKeyProvider) -> Result<(), Error> {
        if self.object_decryption_key.is_none() {
            self.object_decryption_key = Some(provider.object_decryption_key(&self.manifest)?);
        }
        Ok(())
    }

    fn decryption_key(&self) -> Result<&str, Error> {
        self.object_decryption_key
            .as_deref()
            .ok_or(Error::NoDecryptionKeyProvider)
    }

    fn read_entry(&mut self, name: &str) -> Result<ArchivedObject, Error> {
        let identity = self.decryption_key()?.to_string();
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|_| Error::NotFound(name.to_string()))?;
        let mut ciphertext = Vec::new();
        entry.read_to_end(&mut ciphertext)?;
        drop(entry);
        let plaintext = age::decrypt(&identity, &ciphertext)?;
        let (object, _) = bincode::decode_from_slice(&plaintext, bincode_config())?;
        Ok(object)
    }

    /// Finds the zip entry backing `swhid`, without assuming a 1:1 mapping
    /// from SWHID to file name: contents and skipped contents share the
    /// same `cnt` marker, and raw extrinsic metadata entries carry an
    /// ordinal prefix that can't be derived from the SWHID alone.
    fn find_entry_name(&self, swhid: ExtendedSwhid) -> Option<String> {
        use swh_model::ExtendedObjectType;
        let hex = swhid.object_id.to_hex();
        let candidates: Vec<String> = match swhid.object_type {
            ExtendedObjectType::Content => vec![format!("contents/swh_1_cnt_{hex}.age")],
            ExtendedObjectType::Directory => vec![format!("directories/swh_1_dir_{hex}.age")],
            ExtendedObjectType::Revision => vec![format!("revisions/swh_1_rev_{hex}.age")],
            ExtendedObjectType::Release => vec![format!("releases/swh_1_rel_{hex}.age")],
            ExtendedObjectType::Snapshot => vec![format!("snapshots/swh_1_snp_{hex}.age")],
            ExtendedObjectType::Origin => vec![format!("origins/swh_1_ori_{hex}.age")],
            ExtendedObjectType::ExtId => vec![format!("extids/{hex}.age")],
            ExtendedObjectType::RawExtrinsicMetadata => {
                let suffix = format!("_swh_1_emd_{hex}.age");
                return self
                    .archive
                    .file_names()
                    .find(|n| n.starts_with("raw_extrinsic_metadata/") && n.ends_with(&suffix))
                    .map(str::to_string);
            }
        };
        let skipped = if swhid.object_type == ExtendedObjectType::Content {
            self.archive
                .file_names()
                .find(|n| n.starts_with("skipped_contents/") && n.contains(&hex))
                .map(str::to_string)
        } else {
            None
        };
        candidates
            .into_iter()
            .find(|name| self.archive.file_names().any(|n| n == name))
            .or(skipped)
    }

    /// Fetches the archived record for one of the bundle's SWHIDs, in the
    /// bundle's own canonical on-disk representation.
    pub fn get_dict(&mut self, swhid: ExtendedSwhid) -> Result<ArchivedObject, Error> {
        let name = self
            .find_entry_name(swhid)
            .ok_or_else(|| Error::NotFound(swhid.to_string()))?;
        self.read_entry(&name)
    }

    /// Every object of a given prefix, decrypted in the zip's own order
    /// (which is also archival order, per `select_ordered`).
    fn read_all(&mut self, prefix: &str) -> Result<Vec<ArchivedObject>, Error> {
        let names: Vec<String> = self
            .archive
            .file_names()
            .filter(|n| n.starts_with(prefix))
            .map(str::to_string)
            .collect();
        names.iter().map(|n| self.read_entry(n)).collect()
    }

    pub fn contents(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("contents/")
    }

    pub fn skipped_contents(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("skipped_contents/")
    }

    pub fn directories(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("directories/")
    }

    pub fn revisions(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("revisions/")
    }

    pub fn releases(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("releases/")
    }

    pub fn snapshots(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("snapshots/")
    }

    pub fn origins(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("origins/")
    }

    pub fn extids(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("extids/")
    }

    pub fn raw_extrinsic_metadata(&mut self) -> Result<Vec<ArchivedObject>, Error> {
        self.read_all("raw_extrinsic_metadata/")
    }

    /// Every visit recorded for `origin_url`.
    pub fn origin_visits(&mut self, origin_url: &str) -> Result<Vec<ArchivedObject>, Error> {
        let hex = swh_model::ObjectId::of_origin_url(origin_url).to_hex();
        self.read_all(&format!("origin_visits/swh_1_ori_{hex}_"))
    }

    /// Every visit-status recorded for `origin_url`.
    pub fn origin_visit_statuses(&mut self, origin_url: &str) -> Result<Vec<ArchivedObject>, Error> {
        let hex = swh_model::ObjectId::of_origin_url(origin_url).to_hex();
        self.read_all(&format!("origin_visit_statuses/swh_1_ori_{hex}_"))
    }

    /// Writes a content object's raw bytes to `sink`, failing if the bundle
    /// didn't embed the content's data (a skipped content never does).
    pub fn write_content_data(
        &mut self,
        swhid: ExtendedSwhid,
        sink: &mut dyn std::io::Write,
    ) -> Result<(), Error> {
        let object = self.get_dict(swhid)?;
        match object {
            ArchivedObject::Content(c) => {
                let data = c
                    .data
                    .ok_or_else(|| Error::NotFound(format!("content data for {swhid}")))?;
                sink.write_all(&data)?;
                Ok(())
            }
            _ => Err(Error::Validation(format!("{swhid} is not a content"))),
        }
    }

    /// Replays every object in the bundle back into `storage`, in archival
    /// order, returning aggregate per-kind counts. Origins additionally
    /// carry their visits and visit-statuses, which have no SWHID of their
    /// own and so aren't covered by the other typed iterators.
    pub fn restore(&mut self, storage: &dyn ArchiveStorage) -> Result<ObjectCounters, Error> {
        let mut counters = ObjectCounters::default();

        let mut objects = self.contents()?;
        objects.extend(self.skipped_contents()?);
        objects.extend(self.directories()?);
        objects.extend(self.revisions()?);
        objects.extend(self.releases()?);
        objects.extend(self.snapshots()?);
        for object in &objects {
            restore_one(storage, object, &mut counters)?;
        }

        for origin in self.origins()? {
            restore_one(storage, &origin, &mut counters)?;
            if let ArchivedObject::Origin(o) = &origin {
                for visit in self.origin_visits(&o.url)? {
                    restore_one(storage, &visit, &mut counters)?;
                }
                for status in self.origin_visit_statuses(&o.url)? {
                    restore_one(storage, &status, &mut counters)?;
                }
            }
        }

        Ok(counters)
    }
}

/// Restores one object and tallies it, including a `:bytes` counter for
/// content objects that carried their raw data.
fn restore_one(
    storage: &dyn ArchiveStorage,
    object: &ArchivedObject,
    counters: &mut ObjectCounters,
) -> Result<(), Error> {
    let kind = object.object_type();
    storage.restore_object(object).map_err(Error::Storage)?;
    counters.add(format!("{kind}:add"), 1);
    match object {
        ArchivedObject::Content(c) => counters.add(format!("{kind}:add:bytes"), c.length),
        ArchivedObject::SkippedContent(c) => {
            counters.add(format!("{kind}:add:bytes"), c.length.unwrap_or(0))
        }
        _ => {}
    }
    Ok(())
}

/// Re-seals a recovery bundle's object-decryption key under a new
/// secret-sharing configuration, rewriting `manifest.yml` in place.
///
/// The object-decryption key itself never changes and bundle contents are
/// never re-encrypted: only the set of sealed shares in the manifest is
/// replaced. Recovers the current key through `old_provider`, which must
/// already be able to satisfy the bundle's existing threshold.
pub fn rollover(
    path: impl AsRef<Path>,
    old_provider: &dyn DecryptionKeyProvider,
    new_config: &SecretSharingConfig,
) -> Result<(), Error> {
    new_config
        .validate()
        .map_err(|e| Error::Validation(e.to_string()))?;

    let path = path.as_ref();
    let mut reader = BundleReader::open(path)?;
    reader.unlock(old_provider)?;
    let object_decryption_key = reader.decryption_key()?.to_string();

    let mut manifest = reader.manifest.clone();
    let new_shares = swh_secret_sharing::generate_encrypted_shares(
        &manifest.removal_identifier,
        object_decryption_key.as_bytes(),
        new_config,
    )
    .map_err(|e| Error::Validation(e.to_string()))?;
    manifest.decryption_key_shares = new_shares.into_iter().collect();
    let manifest_yaml = manifest.dump()?;
    drop(reader);

    let tmp_path = path.with_extension("rollover-tmp");
    {
        let input = File::open(path)?;
        let mut input_archive = ZipArchive::new(input)?;
        let output = File::create(&tmp_path)?;
        let mut writer = ZipWriter::new(output);
        for i in 0..input_archive.len() {
            let mut entry = input_archive.by_index(i)?;
            if entry.name() == "manifest.yml" {
                continue;
            }
            let name = entry.name().to_string();
            writer.start_file(name, SimpleFileOptions::default())?;
            std::io::copy(&mut entry, &mut writer)?;
        }
        writer.start_file("manifest.yml", SimpleFileOptions::default())?;
        std::io::Write::write_all(&mut writer, manifest_yaml.as_bytes())?;
        writer.finish()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
