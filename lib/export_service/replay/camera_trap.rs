use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use super::super::error::PageFetchError;
use super::super::types::{
    FetchPlan, FilterClause, PageRequest, SizingPolicy, SourceRateLimiter,
};
use super::adapter::{page_params, SourceAdapter};
use super::error_mapping::map_gateway_error;
use crate::model::{
    CoreFilters, CustomFilters, FilterSnapshot, RemoteRow, ResolvedWindow, RowPayload, SourceKind,
};
use crate::source_client::{GatewayClient, MediaRow};

/// Replays camera-trap snapshots against `/v1/media`.
pub struct CameraTrapAdapter {
    client: GatewayClient,
    rate_limiter: SourceRateLimiter,
}

impl CameraTrapAdapter {
    pub fn new(client: GatewayClient, rate_limiter: SourceRateLimiter) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }
}

/// Push-down clauses for a camera query. Classifier labels are evaluated
/// client-side only and never appear here.
pub fn camera_clauses(
    core: &CoreFilters,
    custom: &CustomFilters,
    now: DateTime<Utc>,
) -> (Vec<FilterClause>, ResolvedWindow) {
    let window = core.window.resolve(now);
    let mut clauses = vec![FilterClause::TimeRange(window)];
    if let Some(bbox) = core.bbox {
        clauses.push(FilterClause::Region(bbox));
    }
    if let CustomFilters::CameraTrap {
        device_ids,
        require_image,
        ..
    } = custom
    {
        if !device_ids.is_empty() {
            clauses.push(FilterClause::DeviceIds(device_ids.clone()));
        }
        if *require_image {
            clauses.push(FilterClause::RequireImage);
        }
    }
    (clauses, window)
}

/// Device or label constraints usually cut the result set hard, so the
/// overfetch buffer scales down to a fraction.
pub fn camera_is_narrow(custom: &CustomFilters) -> bool {
    matches!(
        custom,
        CustomFilters::CameraTrap {
            device_ids,
            labels,
            ..
        } if !device_ids.is_empty() || !labels.is_empty()
    )
}

pub(crate) fn media_to_remote(row: MediaRow) -> RemoteRow {
    RemoteRow {
        entity_id: row.media_id,
        observed_at: row.captured_at,
        latitude: row.latitude,
        longitude: row.longitude,
        payload: RowPayload::CameraTrap {
            device_id: row.device_id,
            labels: row.labels,
            image_url: row.image_url,
        },
    }
}

impl SourceAdapter for CameraTrapAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::CameraTrap
    }

    fn build_plan(
        &self,
        snapshot: &FilterSnapshot,
        now: DateTime<Utc>,
        sizing: &SizingPolicy,
    ) -> FetchPlan {
        let (clauses, window) = camera_clauses(&snapshot.core, &snapshot.custom, now);
        FetchPlan {
            source: SourceKind::CameraTrap,
            max_records: sizing.budget(snapshot.estimated_count, camera_is_narrow(&snapshot.custom)),
            clauses,
            window,
        }
    }

    fn fetch_page<'a>(
        &'a self,
        clauses: &'a [FilterClause],
        request: PageRequest,
    ) -> BoxFuture<'a, Result<Vec<RemoteRow>, PageFetchError>> {
        Box::pin(async move {
            self.rate_limiter.until_ready().await;
            let params = page_params(clauses, request);
            let page = self
                .client
                .fetch_media(&params)
                .await
                .map_err(map_gateway_error)?;
            Ok(page.rows.into_iter().map(media_to_remote).collect())
        })
    }
}
