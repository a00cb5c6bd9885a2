use swh_model::ExtendedSwhid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("self-loop rejected: {0}")]
    SelfLoop(ExtendedSwhid),
    #[error("edge endpoint not present in subgraph: {0}")]
    MissingVertex(ExtendedSwhid),
    #[error("duplicate edge {0} -> {1}")]
    DuplicateEdge(ExtendedSwhid, ExtendedSwhid),
}
