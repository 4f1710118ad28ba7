use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::model::{CanonicalRecord, FilterSnapshot, SourceKind};

/// Receives one snapshot's reconciled records.
///
/// Sinks are infallible from the run's perspective: a write error fails that
/// item, never the run.
pub trait ExportSink {
    fn write_item(
        &mut self,
        snapshot: &FilterSnapshot,
        records: &[CanonicalRecord],
    ) -> Result<(), io::Error>;
}

/// Writes each snapshot as one newline-delimited JSON file under a directory.
pub struct JsonlDirSink {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl JsonlDirSink {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(snapshot: &FilterSnapshot) -> String {
        let tag = match snapshot.source() {
            SourceKind::CameraTrap => "camera_trap",
            SourceKind::Occurrence => "occurrence",
            SourceKind::Acoustic => "acoustic",
        };
        format!("{tag}-{}.jsonl", snapshot.short_id())
    }
}

impl ExportSink for JsonlDirSink {
    fn write_item(
        &mut self,
        snapshot: &FilterSnapshot,
        records: &[CanonicalRecord],
    ) -> Result<(), io::Error> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(Self::file_name(snapshot));
        let mut out = BufWriter::new(File::create(&path)?);
        for record in records {
            let line = serde_json::to_string(&record.row)?;
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        debug!(
            event = "export_file_written",
            path = %path.display(),
            records = records.len(),
            "wrote export file"
        );
        self.written.push(path);
        Ok(())
    }
}
