use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by the field-data gateway client.
///
/// `FilterRejected` is the one callers branch on: it marks an HTTP 422 with
/// a well-formed `unsupported_filter` body, which the replay layer treats as
/// "this predicate cannot be pushed down" rather than as a failure.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway rejected filter `{filter}` on /{resource}")]
    FilterRejected {
        resource: &'static str,
        filter: String,
    },
    #[error("unexpected status {status} from gateway on /{resource}")]
    UnexpectedStatus {
        resource: &'static str,
        status: StatusCode,
    },
    #[error("could not reach gateway on /{resource}: {message}")]
    Connect {
        resource: &'static str,
        message: String,
    },
    #[error("could not decode gateway payload on /{resource}: {message}")]
    Decode {
        resource: &'static str,
        message: String,
    },
}

/// One page of wire rows plus the server's total, when it sent one.
#[derive(Debug, Clone)]
pub struct WirePage<T> {
    pub rows: Vec<T>,
    pub total_count: Option<u64>,
}

/// Camera-trap media row as served by `/v1/media`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaRow {
    pub media_id: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub device_id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Occurrence row as served by `/v1/occurrences`.
#[derive(Debug, Clone, Deserialize)]
pub struct OccurrenceRow {
    pub occurrence_id: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub taxon_id: Option<i64>,
    #[serde(default)]
    pub scientific_name: String,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub quality_grade: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaEnvelope {
    #[serde(default)]
    media: Vec<MediaRow>,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OccurrenceEnvelope {
    #[serde(default)]
    occurrences: Vec<OccurrenceRow>,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RejectionBody {
    error: String,
    #[serde(default)]
    filter: Option<String>,
}

const MEDIA_RESOURCE: &str = "v1/media";
const OCCURRENCE_RESOURCE: &str = "v1/occurrences";

/// Thin typed client over the gateway's JSON endpoints.
///
/// The client is deliberately dumb: callers own query parameters (including
/// paging), and the client only handles transport, status mapping, and decode.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_media(
        &self,
        params: &[(String, String)],
    ) -> Result<WirePage<MediaRow>, GatewayError> {
        let envelope: MediaEnvelope = self.get_envelope(MEDIA_RESOURCE, params).await?;
        Ok(WirePage {
            rows: envelope.media,
            total_count: envelope.total_count,
        })
    }

    pub async fn fetch_occurrences(
        &self,
        params: &[(String, String)],
    ) -> Result<WirePage<OccurrenceRow>, GatewayError> {
        let envelope: OccurrenceEnvelope = self.get_envelope(OCCURRENCE_RESOURCE, params).await?;
        Ok(WirePage {
            rows: envelope.occurrences,
            total_count: envelope.total_count,
        })
    }

    /// Count-only probe against `/v1/media`. Returns the server-side total
    /// without transferring rows.
    pub async fn count_media(&self, params: &[(String, String)]) -> Result<u64, GatewayError> {
        let query = with_count_only(params);
        let envelope: MediaEnvelope = self.get_envelope(MEDIA_RESOURCE, &query).await?;
        Ok(envelope.total_count.unwrap_or(0))
    }

    /// Count-only probe against `/v1/occurrences`.
    pub async fn count_occurrences(
        &self,
        params: &[(String, String)],
    ) -> Result<u64, GatewayError> {
        let query = with_count_only(params);
        let envelope: OccurrenceEnvelope = self.get_envelope(OCCURRENCE_RESOURCE, &query).await?;
        Ok(envelope.total_count.unwrap_or(0))
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        params: &[(String, String)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}/{}", self.base_url, resource);
        debug!("GET /{} with {} params", resource, params.len());
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|err| GatewayError::Connect {
                resource,
                message: err.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_rejection(resource, &body));
        }
        if !status.is_success() {
            return Err(GatewayError::UnexpectedStatus { resource, status });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| GatewayError::Decode {
                resource,
                message: err.to_string(),
            })
    }
}

fn with_count_only(params: &[(String, String)]) -> Vec<(String, String)> {
    let mut query = params.to_vec();
    query.push(("count_only".to_string(), "1".to_string()));
    query
}

/// A 422 only counts as a filter rejection when the body says so. Anything
/// else stays an unexpected status so it cannot trigger predicate relaxation.
fn parse_rejection(resource: &'static str, body: &str) -> GatewayError {
    match serde_json::from_str::<RejectionBody>(body) {
        Ok(rejection) if rejection.error == "unsupported_filter" => GatewayError::FilterRejected {
            resource,
            filter: rejection.filter.unwrap_or_default(),
        },
        _ => GatewayError::UnexpectedStatus {
            resource,
            status: StatusCode::UNPROCESSABLE_ENTITY,
        },
    }
}
