#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graph service error: {0}")]
    GraphService(#[source] swh_graph::CollaboratorError),
    #[error("archive storage error: {0}")]
    Storage(#[source] swh_graph::CollaboratorError),
    #[error("subgraph error: {0}")]
    Subgraph(#[from] swh_graph::Error),
}
