use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;

use super::super::error::PageFetchError;
use super::super::generation::GenerationGate;
use super::super::sink::ExportSink;
use super::super::types::{FetchPlan, FilterClause, PageRequest, SizingPolicy};
use super::{
    camera_clauses, camera_is_narrow, occurrence_clauses, occurrence_is_narrow, SourceAdapter,
};
use crate::model::{
    CanonicalRecord, CoreFilters, CustomFilters, FilterSnapshot, RemoteRow, RowPayload, SourceKind,
    TimeWindow,
};

pub(crate) fn june(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

pub(crate) fn camera_row(id: &str, observed_at: DateTime<Utc>, labels: &[&str]) -> RemoteRow {
    RemoteRow {
        entity_id: id.to_string(),
        observed_at,
        latitude: Some(45.5),
        longitude: Some(5.5),
        payload: RowPayload::CameraTrap {
            device_id: "d-1".to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            image_url: Some(format!("https://example.test/{id}.jpg")),
        },
    }
}

pub(crate) fn camera_row_for_device(id: &str, device_id: &str) -> RemoteRow {
    let mut row = camera_row(id, june(15, 0), &["fox"]);
    if let RowPayload::CameraTrap {
        device_id: device, ..
    } = &mut row.payload
    {
        *device = device_id.to_string();
    }
    row
}

pub(crate) fn camera_rows(prefix: &str, count: usize) -> Vec<RemoteRow> {
    (0..count)
        .map(|i| camera_row(&format!("{prefix}-{i}"), june(15, 0), &["fox"]))
        .collect()
}

/// Absolute window covering all of 2024, so client-side re-filtering keeps
/// scripted rows unless a test narrows it on purpose.
pub(crate) fn wide_window() -> TimeWindow {
    TimeWindow::Absolute {
        start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub(crate) fn camera_snapshot(estimated_count: u64) -> FilterSnapshot {
    FilterSnapshot::new(
        CoreFilters {
            window: wide_window(),
            bbox: None,
        },
        CustomFilters::CameraTrap {
            device_ids: vec![],
            labels: vec![],
            require_image: false,
        },
        estimated_count,
        vec![],
        june(1, 0),
    )
}

pub(crate) fn acoustic_snapshot() -> FilterSnapshot {
    FilterSnapshot::new(
        CoreFilters {
            window: TimeWindow::LastDays { days: 30 },
            bbox: None,
        },
        CustomFilters::Acoustic {
            station_ids: vec!["st-1".to_string()],
        },
        10,
        vec![],
        june(1, 0),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub request: PageRequest,
    pub clause_names: Vec<&'static str>,
}

/// Scripted adapter for paginator and service tests.
///
/// Pages are keyed by offset; each offset holds a queue of outcomes so tests
/// can script rejection-then-success sequences on the same offset. Plans are
/// built with the production clause builders so tests exercise real plan
/// construction.
pub(crate) struct ScriptedAdapter {
    source: SourceKind,
    fan_out: usize,
    pages: Mutex<HashMap<u64, VecDeque<Result<Vec<RemoteRow>, PageFetchError>>>>,
    calls: Mutex<Vec<RecordedCall>>,
    cancel_on_call: Mutex<Option<(usize, Arc<GenerationGate>)>>,
}

impl ScriptedAdapter {
    pub(crate) fn new(source: SourceKind) -> Self {
        Self {
            source,
            fan_out: 1,
            pages: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            cancel_on_call: Mutex::new(None),
        }
    }

    pub(crate) fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub(crate) fn script_page(&self, offset: u64, outcome: Result<Vec<RemoteRow>, PageFetchError>) {
        self.pages
            .lock()
            .expect("pages mutex poisoned")
            .entry(offset)
            .or_default()
            .push_back(outcome);
    }

    /// Cancels `gate` during the `call_index`-th page request (1-based),
    /// before its scripted result is returned. Models a user cancelling
    /// while that request is in flight.
    pub(crate) fn cancel_on_call(&self, call_index: usize, gate: Arc<GenerationGate>) {
        *self
            .cancel_on_call
            .lock()
            .expect("cancel mutex poisoned") = Some((call_index, gate));
    }

    pub(crate) fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub(crate) fn calls_for_offset(&self, offset: u64) -> usize {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .iter()
            .filter(|call| call.request.offset == offset)
            .count()
    }
}

impl SourceAdapter for ScriptedAdapter {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn build_plan(
        &self,
        snapshot: &FilterSnapshot,
        now: DateTime<Utc>,
        sizing: &SizingPolicy,
    ) -> FetchPlan {
        let (clauses, window) = match self.source {
            SourceKind::Occurrence => occurrence_clauses(&snapshot.core, &snapshot.custom, now),
            _ => camera_clauses(&snapshot.core, &snapshot.custom, now),
        };
        let narrow = match self.source {
            SourceKind::Occurrence => occurrence_is_narrow(&snapshot.custom),
            _ => camera_is_narrow(&snapshot.custom),
        };
        FetchPlan {
            source: self.source,
            max_records: sizing.budget(snapshot.estimated_count, narrow),
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
            let call_number = {
                let mut calls = self.calls.lock().expect("calls mutex poisoned");
                calls.push(RecordedCall {
                    request,
                    clause_names: clauses.iter().map(|c| c.name()).collect(),
                });
                calls.len()
            };

            if let Some((call_index, gate)) = self
                .cancel_on_call
                .lock()
                .expect("cancel mutex poisoned")
                .as_ref()
            {
                if *call_index == call_number {
                    gate.cancel();
                }
            }

            let mut pages = self.pages.lock().expect("pages mutex poisoned");
            let queue = pages.get_mut(&request.offset).ok_or_else(|| {
                PageFetchError::Malformed(format!(
                    "no scripted page for offset {}",
                    request.offset
                ))
            })?;
            queue.pop_front().ok_or_else(|| {
                PageFetchError::Malformed(format!(
                    "scripted pages exhausted for offset {}",
                    request.offset
                ))
            })?
        })
    }

    fn fan_out(&self) -> usize {
        self.fan_out
    }
}

/// In-memory sink recording exactly what the service delivered.
#[derive(Default)]
pub(crate) struct MemorySink {
    pub items: Vec<(String, Vec<CanonicalRecord>)>,
    pub fail_for: Option<String>,
}

impl ExportSink for MemorySink {
    fn write_item(
        &mut self,
        snapshot: &FilterSnapshot,
        records: &[CanonicalRecord],
    ) -> Result<(), io::Error> {
        if self.fail_for.as_deref() == Some(snapshot.id.as_str()) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.items.push((snapshot.id.clone(), records.to_vec()));
        Ok(())
    }
}
