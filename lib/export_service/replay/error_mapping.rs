use super::super::error::PageFetchError;
use crate::source_client::GatewayError;

/// Collapses gateway error detail into the three classes the replay loop
/// acts on.
///
/// Classification rules:
/// - a well-formed 422 rejection names the offending parameter and is the
///   only recoverable class
/// - connect failures and 5xx are `Network`: the query is fine, the wire is
///   not, and a later manual retry may succeed
/// - decode failures and other 4xx are `Malformed`: retrying will not help
pub(crate) fn map_gateway_error(err: GatewayError) -> PageFetchError {
    match err {
        GatewayError::FilterRejected { filter, .. } => {
            PageFetchError::PredicateRejected { filter }
        }
        connect @ GatewayError::Connect { .. } => PageFetchError::Network(connect.to_string()),
        GatewayError::UnexpectedStatus { resource, status } if status.is_server_error() => {
            PageFetchError::Network(format!(
                "gateway returned {status} on /{resource}"
            ))
        }
        status @ GatewayError::UnexpectedStatus { .. } => {
            PageFetchError::Malformed(status.to_string())
        }
        decode @ GatewayError::Decode { .. } => PageFetchError::Malformed(decode.to_string()),
    }
}
