use crate::model::SourceKind;
use thiserror::Error;

/// Fatal outcome classes for one export item.
///
/// The split matters to the user: `Network` means "try again later",
/// `Query` means "this saved query no longer runs as committed". Neither
/// aborts the run; failures are isolated per item and nothing retries
/// automatically.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("network failure while replaying query: {0}")]
    Network(String),
    #[error("query failed to replay: {0}")]
    Query(String),
    #[error("{} cannot be exported yet", .0.label())]
    NotImplemented(SourceKind),
    #[error("could not write export output: {0}")]
    Sink(String),
}

/// Error surfaced by a single page fetch.
#[derive(Error, Debug)]
pub enum PageFetchError {
    /// The source refused one predicate parameter. Recoverable on the first
    /// page only, by dropping the owning clause.
    #[error("predicate `{filter}` rejected by source")]
    PredicateRejected { filter: String },
    #[error("network: {0}")]
    Network(String),
    #[error("malformed page payload: {0}")]
    Malformed(String),
}
