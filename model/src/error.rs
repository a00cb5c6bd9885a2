/// Errors raised while parsing or validating archived-object identifiers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed SWHID: {0}")]
    MalformedSwhid(String),
    #[error("unknown SWHID object type marker: {0}")]
    UnknownObjectType(String),
    #[error("extended SWHID cannot be narrowed to a core SWHID: {0}")]
    NotACoreSwhid(String),
}
