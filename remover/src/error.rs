#[derive(Debug, thiserror::Error)]
pub enum RemoverError {
    #[error("inventory error: {0}")]
    Inventory(#[from] swh_inventory::Error),
    #[error("removability error: {0}")]
    Removability(#[from] swh_removability::Error),
    #[error("recovery bundle error: {0}")]
    Bundle(#[from] swh_bundle::Error),
    #[error("secret sharing error: {0}")]
    SecretSharing(#[from] swh_secret_sharing::Error),
    #[error("unable to set expiration date: {0}")]
    InvalidExpire(String),
    #[error("collaborator error: {0}")]
    Collaborator(#[from] swh_graph::traits::CollaboratorError),
    #[error("object store error: {0}")]
    ObjectStore(#[from] swh_graph::traits::ObjectStoreError),
    #[error("new references have been added to removed objects")]
    NewReferences,
    #[error("a recovery bundle is already attached to this remover")]
    BundleAlreadyAttached,
}
