#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("duplicate share identifier: {0}")]
    DuplicateShareIdentifier(String),
    #[error("duplicate recipient public key: {0}")]
    DuplicateRecipientKey(String),
    #[error("invalid secret sharing configuration: {0}")]
    InvalidConfiguration(String),
    #[error("slip39 error: {0}")]
    Slip39(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SecretRecoveryError {
    #[error("not enough mnemonics were supplied to recover the secret")]
    NotEnoughShares,
    #[error("a supplied mnemonic does not belong to this secret sharing scheme")]
    UnknownMnemonic,
    #[error("slip39 error: {0}")]
    Slip39(String),
}
