mod error;
mod generation;
pub mod replay;
mod sink;
pub mod types;

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

pub use error::{ExportError, PageFetchError};
pub use generation::GenerationGate;
pub use sink::{ExportSink, JsonlDirSink};
pub use types::{ExportAnnotation, ExportItemReport, ExportOptions, ExportRunSummary};

use replay::{
    aggregate, fetch_all, order_rows_most_recent_first, reconcile, AdapterRegistry, FetchHalt,
    ReconciledExport,
};
use types::WorkingSet;

use crate::model::{FilterSnapshot, ResolvedWindow};

/// Replays every snapshot in a cart against its source and hands the results
/// to a sink, one item at a time.
///
/// Items are independent: a failed snapshot is reported and skipped, never
/// allowed to sink the run. Cancellation goes through the generation gate;
/// a cancelled run stops between pages and drops undelivered results.
pub struct ExportService {
    registry: AdapterRegistry,
    options: ExportOptions,
    gate: Arc<GenerationGate>,
}

impl ExportService {
    pub fn new(registry: AdapterRegistry, options: ExportOptions) -> Self {
        Self {
            registry,
            options,
            gate: Arc::new(GenerationGate::new()),
        }
    }

    /// Handle for cancelling the run from outside (signal handlers, a UI).
    pub fn generation_gate(&self) -> Arc<GenerationGate> {
        Arc::clone(&self.gate)
    }

    /// Exports the given snapshots in order. Always returns a summary; the
    /// only way to end early is cancellation, and that is recorded in it.
    pub async fn export_all(
        &self,
        snapshots: &[FilterSnapshot],
        sink: &mut dyn ExportSink,
    ) -> ExportRunSummary {
        let generation = self.gate.begin();
        info!(
            event = "export_run_started",
            items = snapshots.len(),
            generation,
            "replaying cart entries"
        );

        let mut reports = Vec::with_capacity(snapshots.len());
        let mut cancelled = false;
        for snapshot in snapshots {
            if !self.gate.is_current(generation) {
                cancelled = true;
                break;
            }
            match self.export_item(snapshot, generation, sink).await {
                Some(report) => {
                    log_item(&report);
                    reports.push(report);
                }
                None => {
                    cancelled = true;
                    break;
                }
            }
        }

        if cancelled {
            warn!(
                event = "export_run_cancelled",
                completed = reports.len(),
                remaining = snapshots.len() - reports.len(),
                "run superseded; remaining cart entries were not attempted"
            );
        }

        let summary = ExportRunSummary { reports, cancelled };
        info!(
            event = "export_run_finished",
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            cancelled = summary.cancelled,
            "export run finished"
        );
        summary
    }

    /// Exports one snapshot. `None` means the run went stale mid-item and
    /// nothing was delivered.
    async fn export_item(
        &self,
        snapshot: &FilterSnapshot,
        generation: u64,
        sink: &mut dyn ExportSink,
    ) -> Option<ExportItemReport> {
        let adapter = match self.registry.get(snapshot.source()) {
            Some(adapter) => adapter,
            None => {
                return Some(ExportItemReport::failed(
                    snapshot,
                    ExportError::NotImplemented(snapshot.source()),
                ))
            }
        };

        let plan = adapter.build_plan(snapshot, Utc::now(), &self.options.sizing);
        let fetched = match fetch_all(
            adapter.as_ref(),
            &plan,
            &self.options.paging,
            &self.gate,
            generation,
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(FetchHalt::Stale) => return None,
            Err(FetchHalt::Failed(err)) => {
                if self.options.preview_fallback && matches!(err, ExportError::Network(_)) {
                    return self.export_preview(snapshot, plan.window, generation, sink, &err);
                }
                return Some(ExportItemReport::failed(snapshot, err));
            }
        };

        let records = aggregate(fetched.rows, snapshot, plan.window, fetched.relaxed.as_ref());
        let working = WorkingSet {
            records,
            page_limit_exceeded: fetched.page_limit_exceeded,
            relaxed: fetched.relaxed,
        };
        let reconciled = reconcile(working, snapshot.estimated_count);

        // Delivery is the point of no return; a stale run stops short of it.
        if !self.gate.is_current(generation) {
            return None;
        }
        Some(self.deliver(snapshot, reconciled, false, sink))
    }

    /// Degraded path: the source is unreachable, so export the preview rows
    /// captured at commit time. They go through the same aggregation and
    /// reconciliation as a real replay, so exclusions and the snapshot's own
    /// filters still hold and the shortfall shows up as a count mismatch.
    fn export_preview(
        &self,
        snapshot: &FilterSnapshot,
        window: ResolvedWindow,
        generation: u64,
        sink: &mut dyn ExportSink,
        cause: &ExportError,
    ) -> Option<ExportItemReport> {
        warn!(
            event = "preview_fallback",
            snapshot = snapshot.short_id(),
            error = %cause,
            "replay failed; exporting the cached preview sample instead"
        );

        let mut rows = snapshot.preview.clone();
        order_rows_most_recent_first(&mut rows);
        let records = aggregate(rows, snapshot, window, None);
        let working = WorkingSet {
            records,
            page_limit_exceeded: false,
            relaxed: None,
        };
        let reconciled = reconcile(working, snapshot.estimated_count);

        if !self.gate.is_current(generation) {
            return None;
        }
        Some(self.deliver(snapshot, reconciled, true, sink))
    }

    /// Writes one reconciled item and assembles its report. Annotations are
    /// kept even when the sink fails, so the report still explains what the
    /// export would have contained.
    fn deliver(
        &self,
        snapshot: &FilterSnapshot,
        reconciled: ReconciledExport,
        from_preview: bool,
        sink: &mut dyn ExportSink,
    ) -> ExportItemReport {
        let mut annotations = Vec::new();
        if let Some(clause) = &reconciled.relaxed {
            annotations.push(ExportAnnotation::FilterRelaxed {
                filter: clause.name().to_string(),
            });
        }
        if reconciled.page_limit_exceeded {
            annotations.push(ExportAnnotation::PaginationLimitExceeded {
                pages: self.options.paging.max_pages,
            });
        }
        if let Some(mismatch) = reconciled.mismatch {
            annotations.push(ExportAnnotation::CountMismatch {
                expected: mismatch.expected,
                actual: mismatch.actual,
            });
        }
        if from_preview {
            annotations.push(ExportAnnotation::PreviewFallback);
        }

        match sink.write_item(snapshot, &reconciled.records) {
            Ok(()) => ExportItemReport {
                snapshot_id: snapshot.id.clone(),
                source: snapshot.source(),
                exported: reconciled.records.len() as u64,
                annotations,
                error: None,
            },
            Err(err) => ExportItemReport {
                snapshot_id: snapshot.id.clone(),
                source: snapshot.source(),
                exported: 0,
                annotations,
                error: Some(ExportError::Sink(err.to_string())),
            },
        }
    }
}

fn log_item(report: &ExportItemReport) {
    match &report.error {
        None => info!(
            event = "export_item_finished",
            snapshot = %report.snapshot_id,
            source = ?report.source,
            exported = report.exported,
            annotations = report.annotations.len(),
            "exported one cart entry"
        ),
        Some(error) => warn!(
            event = "export_item_failed",
            snapshot = %report.snapshot_id,
            source = ?report.source,
            error = %error,
            "cart entry failed; continuing with the remaining entries"
        ),
    }
}
