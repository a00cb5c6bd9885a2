#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid manifest: {0}")]
    Validation(String),
    #[error("manifest yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("swhid error: {0}")]
    Swhid(#[from] swh_model::Error),
    #[error("unable to encode object record: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("unable to decode object record: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("wrong decryption key for this recovery bundle")]
    WrongDecryptionKey,
    #[error("age subprocess failed: {0}")]
    Subprocess(String),
    #[error("no decryption key provider configured for this bundle")]
    NoDecryptionKeyProvider,
    #[error("{0} is not present in this recovery bundle")]
    NotFound(String),
    #[error("archive storage error: {0}")]
    Storage(#[source] swh_graph::CollaboratorError),
}
