use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of preview rows captured alongside a snapshot.
///
/// The preview is a courtesy sample for `cart list` and for degraded exports,
/// never a substitute for replaying the query.
pub const MAX_PREVIEW_ROWS: usize = 10;

/// The kind of remote dataset a snapshot draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    CameraTrap,
    Occurrence,
    Acoustic,
}

impl SourceKind {
    /// Human-readable label used in CLI output and log fields.
    pub fn label(self) -> &'static str {
        match self {
            Self::CameraTrap => "camera traps",
            Self::Occurrence => "occurrences",
            Self::Acoustic => "acoustic detections",
        }
    }
}

/// Time window as captured in a snapshot.
///
/// `LastDays` is stored symbolically and re-anchored every time the snapshot
/// is replayed, so "last 7 days" means the 7 days before the replay, not the
/// 7 days before the snapshot was created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeWindow {
    LastDays { days: u32 },
    Absolute { start: DateTime<Utc>, end: DateTime<Utc> },
}

impl TimeWindow {
    /// Resolves the window against a concrete anchor instant.
    pub fn resolve(&self, now: DateTime<Utc>) -> ResolvedWindow {
        match *self {
            Self::LastDays { days } => {
                let start = now
                    .checked_sub_signed(Duration::days(i64::from(days)))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                ResolvedWindow { start, end: now }
            }
            Self::Absolute { start, end } => ResolvedWindow { start, end },
        }
    }
}

/// A fully resolved, half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ResolvedWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Inclusive containment on all four edges.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Filters shared by every source kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreFilters {
    pub window: TimeWindow,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

/// Occurrence verification tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Research,
    NeedsId,
    Casual,
}

impl QualityGrade {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::NeedsId => "needs_id",
            Self::Casual => "casual",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "research" => Some(Self::Research),
            "needs_id" => Some(Self::NeedsId),
            "casual" => Some(Self::Casual),
            _ => None,
        }
    }
}

/// Source-specific filters. The variant doubles as the snapshot's source tag.
///
/// Empty vectors and `None` mean "no constraint", so a default-constructed
/// variant matches everything inside the core window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CustomFilters {
    CameraTrap {
        #[serde(default)]
        device_ids: Vec<String>,
        #[serde(default)]
        labels: Vec<String>,
        #[serde(default)]
        require_image: bool,
    },
    Occurrence {
        #[serde(default)]
        taxon_ids: Vec<i64>,
        #[serde(default)]
        quality_grade: Option<QualityGrade>,
        #[serde(default)]
        name_query: Option<String>,
        #[serde(default)]
        months: Vec<u32>,
    },
    Acoustic {
        #[serde(default)]
        station_ids: Vec<String>,
    },
}

impl CustomFilters {
    pub fn source(&self) -> SourceKind {
        match self {
            Self::CameraTrap { .. } => SourceKind::CameraTrap,
            Self::Occurrence { .. } => SourceKind::Occurrence,
            Self::Acoustic { .. } => SourceKind::Acoustic,
        }
    }

    /// One-line filter description for `cart list`.
    pub fn summary(&self) -> String {
        match self {
            Self::CameraTrap {
                device_ids,
                labels,
                require_image,
            } => {
                let mut parts = Vec::new();
                if !device_ids.is_empty() {
                    parts.push(format!("devices={}", device_ids.join("|")));
                }
                if !labels.is_empty() {
                    parts.push(format!("labels={}", labels.join("|")));
                }
                if *require_image {
                    parts.push("with-image".to_string());
                }
                if parts.is_empty() {
                    "all media".to_string()
                } else {
                    parts.join(" ")
                }
            }
            Self::Occurrence {
                taxon_ids,
                quality_grade,
                name_query,
                months,
            } => {
                let mut parts = Vec::new();
                if !taxon_ids.is_empty() {
                    let rendered: Vec<String> =
                        taxon_ids.iter().map(|id| id.to_string()).collect();
                    parts.push(format!("taxa={}", rendered.join("|")));
                }
                if let Some(grade) = quality_grade {
                    parts.push(format!("grade={}", grade.as_param()));
                }
                if let Some(query) = name_query {
                    parts.push(format!("name~\"{query}\""));
                }
                if !months.is_empty() {
                    let rendered: Vec<String> = months.iter().map(|m| m.to_string()).collect();
                    parts.push(format!("months={}", rendered.join("|")));
                }
                if parts.is_empty() {
                    "all occurrences".to_string()
                } else {
                    parts.join(" ")
                }
            }
            Self::Acoustic { station_ids } => {
                if station_ids.is_empty() {
                    "all stations".to_string()
                } else {
                    format!("stations={}", station_ids.join("|"))
                }
            }
        }
    }
}

/// Source-specific columns carried by a fetched row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RowPayload {
    CameraTrap {
        device_id: String,
        #[serde(default)]
        labels: Vec<String>,
        #[serde(default)]
        image_url: Option<String>,
    },
    Occurrence {
        #[serde(default)]
        taxon_id: Option<i64>,
        scientific_name: String,
        #[serde(default)]
        common_name: Option<String>,
        #[serde(default)]
        quality_grade: Option<String>,
    },
}

/// One row as returned by a remote source, normalized across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub entity_id: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub payload: RowPayload,
}

/// A row that survived deduplication and client-side filtering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub row: RemoteRow,
}

/// Immutable record of a query the user committed to their cart.
///
/// Snapshots never change after construction. Editing filters in the UI always
/// produces a new snapshot; the cart's entries are point-in-time commitments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub core: CoreFilters,
    pub custom: CustomFilters,
    /// Count-only probe result at commit time. Display hint only; exports
    /// must never exceed it, but the replayed result decides the real total.
    pub estimated_count: u64,
    #[serde(default)]
    pub preview: Vec<RemoteRow>,
}

impl FilterSnapshot {
    pub fn new(
        core: CoreFilters,
        custom: CustomFilters,
        estimated_count: u64,
        mut preview: Vec<RemoteRow>,
        created_at: DateTime<Utc>,
    ) -> Self {
        preview.truncate(MAX_PREVIEW_ROWS);
        Self {
            id: Uuid::new_v4().to_string(),
            created_at,
            core,
            custom,
            estimated_count,
            preview,
        }
    }

    pub fn source(&self) -> SourceKind {
        self.custom.source()
    }

    /// Shortened id for terminal output.
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(8);
        &self.id[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn minimal_camera_filters() -> CustomFilters {
        CustomFilters::CameraTrap {
            device_ids: vec![],
            labels: vec![],
            require_image: false,
        }
    }

    #[test]
    fn last_days_window_is_anchored_at_resolution_time() {
        let window = TimeWindow::LastDays { days: 7 };
        let first_now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let later_now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();

        let first = window.resolve(first_now);
        let later = window.resolve(later_now);

        assert_eq!(first.end, first_now);
        assert_eq!(later.end, later_now);
        assert_eq!(later.start - first.start, Duration::days(10));
    }

    #[test]
    fn resolved_window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let window = ResolvedWindow { start, end };

        assert!(window.contains(start));
        assert!(window.contains(end - Duration::seconds(1)));
        assert!(!window.contains(end));
        assert!(!window.contains(start - Duration::seconds(1)));
    }

    #[test]
    fn bounding_box_contains_is_inclusive() {
        let bbox = BoundingBox {
            min_lon: -1.0,
            min_lat: -2.0,
            max_lon: 1.0,
            max_lat: 2.0,
        };

        assert!(bbox.contains(0.0, 0.0));
        assert!(bbox.contains(-1.0, 2.0));
        assert!(!bbox.contains(1.1, 0.0));
        assert!(!bbox.contains(0.0, -2.1));
    }

    #[test]
    fn custom_filters_report_their_source() {
        assert_eq!(minimal_camera_filters().source(), SourceKind::CameraTrap);
        let occ = CustomFilters::Occurrence {
            taxon_ids: vec![],
            quality_grade: None,
            name_query: None,
            months: vec![],
        };
        assert_eq!(occ.source(), SourceKind::Occurrence);
    }

    #[test]
    fn snapshot_truncates_oversized_previews() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let rows: Vec<RemoteRow> = (0..MAX_PREVIEW_ROWS + 5)
            .map(|i| RemoteRow {
                entity_id: format!("m-{i}"),
                observed_at: now,
                latitude: None,
                longitude: None,
                payload: RowPayload::CameraTrap {
                    device_id: "d1".to_string(),
                    labels: vec![],
                    image_url: None,
                },
            })
            .collect();

        let snapshot = FilterSnapshot::new(
            CoreFilters {
                window: TimeWindow::LastDays { days: 30 },
                bbox: None,
            },
            minimal_camera_filters(),
            42,
            rows,
            now,
        );

        assert_eq!(snapshot.preview.len(), MAX_PREVIEW_ROWS);
        assert_eq!(snapshot.source(), SourceKind::CameraTrap);
        assert!(!snapshot.id.is_empty());
    }

    #[test]
    fn quality_grade_parsing_is_case_insensitive() {
        assert_eq!(QualityGrade::parse("Research"), Some(QualityGrade::Research));
        assert_eq!(QualityGrade::parse("needs_id"), Some(QualityGrade::NeedsId));
        assert_eq!(QualityGrade::parse("CASUAL"), Some(QualityGrade::Casual));
        assert_eq!(QualityGrade::parse("verified"), None);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let snapshot = FilterSnapshot::new(
            CoreFilters {
                window: TimeWindow::Absolute {
                    start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    end: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
                },
                bbox: Some(BoundingBox {
                    min_lon: 5.0,
                    min_lat: 45.0,
                    max_lon: 6.0,
                    max_lat: 46.0,
                }),
            },
            CustomFilters::Occurrence {
                taxon_ids: vec![1234],
                quality_grade: Some(QualityGrade::Research),
                name_query: Some("lynx".to_string()),
                months: vec![5, 6],
            },
            900,
            vec![],
            now,
        );

        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: FilterSnapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
