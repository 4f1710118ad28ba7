use crate::{
    cart::{CartError, CartStore},
    config::Config,
    export_service::replay::{
        camera_clauses, media_to_remote, occurrence_clauses, occurrence_to_remote, page_params,
        AdapterRegistry, CameraTrapAdapter, OccurrenceAdapter, DEFAULT_OCCURRENCE_FAN_OUT,
    },
    export_service::types::{
        clause_params, ExportOptions, PageRequest, PagingPolicy, SizingPolicy, SourceRateLimiter,
    },
    export_service::{ExportRunSummary, ExportService, JsonlDirSink},
    logging::{format_error_report, init_logging},
    model::{
        BoundingBox, CoreFilters, CustomFilters, FilterSnapshot, QualityGrade, RemoteRow,
        SourceKind, TimeWindow, MAX_PREVIEW_ROWS,
    },
    source_client::{GatewayClient, GatewayError},
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser};
use dotenv::dotenv;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

const DEFAULT_LAST_DAYS: u32 = 30;

/// Cart location and logging flags shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct StoreArgs {
    #[arg(long = "cart-path")]
    /// Cart file location (default: the platform data directory)
    pub cart_path: Option<PathBuf>,
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

/// Time and space scope shared by every `cart add-*` subcommand.
#[derive(Debug, Args, Clone)]
pub struct WindowArgs {
    #[arg(long = "last-days", conflicts_with_all = ["from", "to"])]
    /// Relative window: the N days before each replay (default 30)
    pub last_days: Option<u32>,
    #[arg(long, requires = "to")]
    /// Absolute window start, RFC 3339
    pub from: Option<String>,
    #[arg(long, requires = "from")]
    /// Absolute window end, RFC 3339, exclusive
    pub to: Option<String>,
    #[arg(long)]
    /// Bounding box as min_lon,min_lat,max_lon,max_lat
    pub bbox: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct CartAddCameraArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    #[arg(long = "device-id")]
    /// Restrict to these camera devices (repeatable)
    pub device_ids: Vec<String>,
    #[arg(long = "label")]
    /// Keep only rows carrying one of these classifier labels (repeatable)
    pub labels: Vec<String>,
    #[arg(long = "require-image", default_value_t = false)]
    /// Drop rows without a stored image
    pub require_image: bool,

    #[arg(long = "gateway-url")]
    pub gateway_url: Option<String>,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct CartAddOccurrenceArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    #[arg(long = "taxon-id")]
    /// Restrict to these taxon ids (repeatable)
    pub taxon_ids: Vec<i64>,
    #[arg(long = "quality-grade")]
    /// research, needs_id, or casual
    pub quality_grade: Option<String>,
    #[arg(long = "name")]
    /// Substring match on scientific or common name
    pub name_query: Option<String>,
    #[arg(long = "month")]
    /// Keep only observations from these months, 1-12 (repeatable)
    pub months: Vec<u32>,

    #[arg(long = "gateway-url")]
    pub gateway_url: Option<String>,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct CartListArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct CartRemoveArgs {
    #[arg(value_name = "SNAPSHOT_ID")]
    pub id: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct CartClearArgs {
    #[arg(long, default_value_t = false)]
    /// Required confirmation; without it the command refuses to run
    pub yes: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    /// Export only these snapshot ids (unique prefixes work); default is
    /// the whole cart
    #[arg(value_name = "SNAPSHOT_ID")]
    pub ids: Vec<String>,

    #[arg(long = "output-dir", default_value = "./exports")]
    pub output_dir: PathBuf,
    #[arg(long = "gateway-url")]
    pub gateway_url: Option<String>,

    #[arg(long = "page-size", default_value_t = 1000)]
    pub page_size: u32,
    #[arg(long = "max-pages", default_value_t = 50)]
    pub max_pages: u32,
    #[arg(long = "hard-ceiling", default_value_t = 10_000)]
    pub hard_ceiling: u64,
    #[arg(long = "narrow-floor", default_value_t = 50)]
    pub narrow_floor: u64,
    #[arg(long = "broad-buffer", default_value_t = 100)]
    pub broad_buffer: u64,
    #[arg(long = "narrow-fraction", default_value_t = 0.10)]
    pub narrow_fraction: f64,
    #[arg(long = "fan-out", default_value_t = DEFAULT_OCCURRENCE_FAN_OUT)]
    /// Concurrent page requests for the occurrence source
    pub fan_out: usize,
    #[arg(long = "rps", default_value_t = 5)]
    /// Per-source request rate limit
    pub rps: u32,
    #[arg(long = "preview-fallback", default_value_t = false)]
    /// Export the cached preview sample when a source is unreachable
    pub preview_fallback: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

fn start_run(mode: &str, log_level: &str) -> tracing::span::EnteredSpan {
    dotenv().ok();
    let logging_context = init_logging("fieldcart", mode, log_level);
    tracing::info_span!(
        "fieldcart_run",
        service = %logging_context.service,
        mode = %logging_context.mode,
        run_id = %logging_context.run_id,
        build_version = %logging_context.build_version,
        build_commit = %logging_context.build_commit
    )
    .entered()
}

fn resolve_store(flag: Option<PathBuf>, env: Option<PathBuf>) -> Result<CartStore, CartError> {
    match flag.or(env) {
        Some(path) => Ok(CartStore::at_path(path)),
        None => CartStore::at_default_location(),
    }
}

fn parse_rfc3339(raw: &str, flag: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("invalid {flag} timestamp `{raw}`: {err}"))
}

pub fn resolve_window(args: &WindowArgs) -> Result<TimeWindow, String> {
    if let Some(days) = args.last_days {
        if days == 0 {
            return Err("--last-days must be > 0".to_string());
        }
    }
    match (&args.from, &args.to) {
        (Some(from), Some(to)) => {
            let start = parse_rfc3339(from, "--from")?;
            let end = parse_rfc3339(to, "--to")?;
            if end <= start {
                return Err(format!("--to ({to}) must be after --from ({from})"));
            }
            Ok(TimeWindow::Absolute { start, end })
        }
        (None, None) => Ok(TimeWindow::LastDays {
            days: args.last_days.unwrap_or(DEFAULT_LAST_DAYS),
        }),
        _ => Err("--from and --to must be given together".to_string()),
    }
}

pub fn parse_bbox(raw: &str) -> Result<BoundingBox, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!(
            "--bbox expects min_lon,min_lat,max_lon,max_lat, got `{raw}`"
        ));
    }
    let mut values = [0f64; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|err| format!("invalid --bbox component `{part}`: {err}"))?;
    }
    let bbox = BoundingBox {
        min_lon: values[0],
        min_lat: values[1],
        max_lon: values[2],
        max_lat: values[3],
    };
    if !(-180.0..=180.0).contains(&bbox.min_lon) || !(-180.0..=180.0).contains(&bbox.max_lon) {
        return Err("--bbox longitudes must be within [-180, 180]".to_string());
    }
    if !(-90.0..=90.0).contains(&bbox.min_lat) || !(-90.0..=90.0).contains(&bbox.max_lat) {
        return Err("--bbox latitudes must be within [-90, 90]".to_string());
    }
    if bbox.max_lon < bbox.min_lon || bbox.max_lat < bbox.min_lat {
        return Err("--bbox min corner must be south-west of the max corner".to_string());
    }
    Ok(bbox)
}

fn validate_months(months: &[u32]) -> Result<(), String> {
    for month in months {
        if !(1..=12).contains(month) {
            return Err(format!("--month values must be between 1 and 12, got {month}"));
        }
    }
    Ok(())
}

fn resolve_quality_grade(flag: &Option<String>) -> Result<Option<QualityGrade>, String> {
    match flag {
        None => Ok(None),
        Some(raw) => QualityGrade::parse(raw).map(Some).ok_or_else(|| {
            format!("invalid --quality-grade `{raw}` (expected research, needs_id, or casual)")
        }),
    }
}

pub fn validate_export_args(args: &ExportArgs) -> Result<(), String> {
    if args.page_size == 0 {
        return Err("--page-size must be > 0".to_string());
    }
    if args.max_pages == 0 {
        return Err("--max-pages must be > 0".to_string());
    }
    if args.hard_ceiling == 0 {
        return Err("--hard-ceiling must be > 0".to_string());
    }
    if !(args.narrow_fraction > 0.0 && args.narrow_fraction <= 1.0) {
        return Err(format!(
            "--narrow-fraction must be within (0, 1], got {}",
            args.narrow_fraction
        ));
    }
    if args.fan_out == 0 {
        return Err("--fan-out must be > 0".to_string());
    }
    if args.rps == 0 {
        return Err("--rps must be > 0".to_string());
    }
    Ok(())
}

fn per_source_limiter(rps: u32) -> SourceRateLimiter {
    let quota = NonZeroU32::new(rps).unwrap_or(nonzero!(5u32));
    Arc::new(RateLimiter::direct(Quota::per_second(quota)))
}

/// Count probe plus first-page preview, both at commit time. The preview is
/// a display sample; replays never reuse it unless the source goes away.
async fn probe_source(
    client: &GatewayClient,
    core: &CoreFilters,
    custom: &CustomFilters,
    now: DateTime<Utc>,
) -> Result<(u64, Vec<RemoteRow>), GatewayError> {
    let preview_request = PageRequest {
        offset: 0,
        limit: MAX_PREVIEW_ROWS as u32,
    };
    match custom.source() {
        SourceKind::CameraTrap => {
            let (clauses, _) = camera_clauses(core, custom, now);
            let count = client.count_media(&clause_params(&clauses)).await?;
            let page = client
                .fetch_media(&page_params(&clauses, preview_request))
                .await?;
            Ok((count, page.rows.into_iter().map(media_to_remote).collect()))
        }
        SourceKind::Occurrence => {
            let (clauses, _) = occurrence_clauses(core, custom, now);
            let count = client.count_occurrences(&clause_params(&clauses)).await?;
            let page = client
                .fetch_occurrences(&page_params(&clauses, preview_request))
                .await?;
            Ok((
                count,
                page.rows.into_iter().map(occurrence_to_remote).collect(),
            ))
        }
        // No acoustic adapter yet; snapshots of that kind arrive from other
        // portal surfaces, never from this CLI.
        SourceKind::Acoustic => Ok((0, Vec::new())),
    }
}

async fn commit_snapshot(
    core: CoreFilters,
    custom: CustomFilters,
    gateway_flag: &Option<String>,
    store_args: &StoreArgs,
) -> i32 {
    let config = Config::from_env();
    let gateway_url = gateway_flag.clone().unwrap_or(config.gateway_url);
    let client = GatewayClient::new(&gateway_url);
    let now = Utc::now();

    let (estimated_count, preview) = match probe_source(&client, &core, &custom, now).await {
        Ok(probed) => probed,
        Err(err) => {
            let error_report = format_error_report(&err);
            error!(
                event = "commit_probe_failed",
                error = %err,
                error_report = %error_report,
                "count probe against the gateway failed"
            );
            eprintln!("could not reach the data gateway: {err}");
            return 1;
        }
    };

    let snapshot = FilterSnapshot::new(core, custom, estimated_count, preview, now);
    let short = snapshot.short_id().to_string();
    let source_label = snapshot.source().label();
    let filter_summary = snapshot.custom.summary();

    let store = match resolve_store(store_args.cart_path.clone(), config.cart_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let mut cart = store.load();
    if let Err(err) = cart.append(snapshot) {
        eprintln!("could not add to cart: {err}");
        return 1;
    }
    if let Err(err) = store.save(&cart) {
        let error_report = format_error_report(&err);
        error!(
            event = "cart_save_failed",
            error = %err,
            error_report = %error_report,
            "could not persist the cart"
        );
        eprintln!("could not save the cart: {err}");
        return 1;
    }

    println!("saved {source_label} query {short} ({filter_summary}; about {estimated_count} records)");
    println!("cart: {} of {} entries", cart.len(), cart.capacity());
    0
}

pub async fn run_cart_add_camera(args: CartAddCameraArgs) -> i32 {
    let _run_guard = start_run("cart_add", &args.store.log_level);

    let window = match resolve_window(&args.window) {
        Ok(window) => window,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };
    let bbox = match &args.window.bbox {
        Some(raw) => match parse_bbox(raw) {
            Ok(bbox) => Some(bbox),
            Err(err) => {
                eprintln!("{err}");
                return 2;
            }
        },
        None => None,
    };

    let core = CoreFilters { window, bbox };
    let custom = CustomFilters::CameraTrap {
        device_ids: args.device_ids.clone(),
        labels: args.labels.clone(),
        require_image: args.require_image,
    };
    commit_snapshot(core, custom, &args.gateway_url, &args.store).await
}

pub async fn run_cart_add_occurrence(args: CartAddOccurrenceArgs) -> i32 {
    let _run_guard = start_run("cart_add", &args.store.log_level);

    let window = match resolve_window(&args.window) {
        Ok(window) => window,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };
    let bbox = match &args.window.bbox {
        Some(raw) => match parse_bbox(raw) {
            Ok(bbox) => Some(bbox),
            Err(err) => {
                eprintln!("{err}");
                return 2;
            }
        },
        None => None,
    };
    if let Err(err) = validate_months(&args.months) {
        eprintln!("{err}");
        return 2;
    }
    let quality_grade = match resolve_quality_grade(&args.quality_grade) {
        Ok(grade) => grade,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };

    let core = CoreFilters { window, bbox };
    let custom = CustomFilters::Occurrence {
        taxon_ids: args.taxon_ids.clone(),
        quality_grade,
        name_query: args.name_query.clone(),
        months: args.months.clone(),
    };
    commit_snapshot(core, custom, &args.gateway_url, &args.store).await
}

fn window_summary(window: &TimeWindow) -> String {
    match window {
        TimeWindow::LastDays { days } => format!("last {days}d"),
        TimeWindow::Absolute { start, end } => {
            format!("{}..{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
        }
    }
}

pub async fn run_cart_list(args: CartListArgs) -> i32 {
    let _run_guard = start_run("cart_list", &args.store.log_level);

    let config = Config::from_env();
    let store = match resolve_store(args.store.cart_path.clone(), config.cart_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let cart = store.load();
    if cart.is_empty() {
        println!("cart is empty");
        return 0;
    }

    for snapshot in cart.snapshots() {
        println!(
            "{}  {:<19} {:<12} {}  ~{} records",
            snapshot.short_id(),
            snapshot.source().label(),
            window_summary(&snapshot.core.window),
            snapshot.custom.summary(),
            snapshot.estimated_count,
        );
    }
    let totals = cart.totals();
    println!(
        "{} of {} entries, about {} records in total",
        totals.entries,
        cart.capacity(),
        totals.estimated_records
    );
    0
}

pub async fn run_cart_remove(args: CartRemoveArgs) -> i32 {
    let _run_guard = start_run("cart_remove", &args.store.log_level);

    let config = Config::from_env();
    let store = match resolve_store(args.store.cart_path.clone(), config.cart_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let mut cart = store.load();
    let removed = match cart.remove(&args.id) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    if let Err(err) = store.save(&cart) {
        eprintln!("could not save the cart: {err}");
        return 1;
    }
    println!(
        "removed {} query {}",
        removed.source().label(),
        removed.short_id()
    );
    0
}

pub async fn run_cart_clear(args: CartClearArgs) -> i32 {
    let _run_guard = start_run("cart_clear", &args.store.log_level);

    if !args.yes {
        eprintln!("refusing to clear the cart without --yes");
        return 2;
    }

    let config = Config::from_env();
    let store = match resolve_store(args.store.cart_path.clone(), config.cart_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let mut cart = store.load();
    let removed = cart.clear();
    if let Err(err) = store.save(&cart) {
        eprintln!("could not save the cart: {err}");
        return 1;
    }
    println!("removed {removed} entries");
    0
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

fn print_summary(summary: &ExportRunSummary, output_dir: &Path) {
    for report in &summary.reports {
        let short = short_id(&report.snapshot_id);
        match &report.error {
            None => println!(
                "ok    {short}  {:<19} {} records",
                report.source.label(),
                report.exported
            ),
            Some(err) => println!("FAIL  {short}  {:<19} {err}", report.source.label()),
        }
        for annotation in &report.annotations {
            println!("          note: {}", annotation.describe());
        }
    }
    if summary.cancelled {
        println!("export cancelled; remaining entries were not attempted");
    }
    println!(
        "{} exported, {} failed; output in {}",
        summary.succeeded(),
        summary.failed(),
        output_dir.display()
    );
}

pub async fn run_export(args: ExportArgs) -> i32 {
    let _run_guard = start_run("export", &args.store.log_level);

    if let Err(err) = validate_export_args(&args) {
        eprintln!("{err}");
        return 2;
    }

    let config = Config::from_env();
    let gateway_url = args.gateway_url.clone().unwrap_or(config.gateway_url);
    let store = match resolve_store(args.store.cart_path.clone(), config.cart_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let cart = store.load();
    if cart.is_empty() {
        println!("cart is empty; nothing to export");
        return 0;
    }

    let snapshots: Vec<FilterSnapshot> = if args.ids.is_empty() {
        cart.snapshots().to_vec()
    } else {
        let mut selected = Vec::with_capacity(args.ids.len());
        for needle in &args.ids {
            match cart.find(needle) {
                Ok(snapshot) => selected.push(snapshot.clone()),
                Err(err) => {
                    eprintln!("{err}");
                    return 2;
                }
            }
        }
        selected
    };

    let client = GatewayClient::new(&gateway_url);
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(CameraTrapAdapter::new(
        client.clone(),
        per_source_limiter(args.rps),
    )));
    registry.register(Arc::new(OccurrenceAdapter::new(
        client,
        per_source_limiter(args.rps),
        args.fan_out,
    )));

    let options = ExportOptions {
        sizing: SizingPolicy {
            narrow_fraction: args.narrow_fraction,
            narrow_floor: args.narrow_floor,
            broad_buffer: args.broad_buffer,
            hard_ceiling: args.hard_ceiling,
        },
        paging: PagingPolicy {
            page_size: args.page_size,
            max_pages: args.max_pages,
        },
        preview_fallback: args.preview_fallback,
    };
    let service = ExportService::new(registry, options);

    let gate = service.generation_gate();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(
                event = "cancel_requested",
                "interrupt received; cancelling the export run"
            );
            gate.cancel();
        }
    });

    let mut sink = JsonlDirSink::new(args.output_dir.clone());
    let summary = service.export_all(&snapshots, &mut sink).await;
    print_summary(&summary, sink.root());

    if summary.cancelled || summary.failed() > 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{
        parse_bbox, resolve_quality_grade, resolve_window, validate_export_args, validate_months,
        window_summary, ExportArgs, WindowArgs,
    };
    use crate::model::{QualityGrade, TimeWindow};
    use chrono::{Datelike, Utc};
    use clap::Parser;

    fn window_args() -> WindowArgs {
        WindowArgs {
            last_days: None,
            from: None,
            to: None,
            bbox: None,
        }
    }

    #[test]
    fn window_defaults_to_last_thirty_days() {
        let window = resolve_window(&window_args()).expect("default window");
        assert_eq!(window, TimeWindow::LastDays { days: 30 });
    }

    #[test]
    fn absolute_window_parses_and_validates_order() {
        let mut args = window_args();
        args.from = Some("2024-05-01T00:00:00Z".to_string());
        args.to = Some("2024-06-01T00:00:00Z".to_string());

        let window = resolve_window(&args).expect("absolute window");
        match window {
            TimeWindow::Absolute { start, end } => {
                assert_eq!(start.month(), 5);
                assert_eq!(end.month(), 6);
                assert_eq!(start.year(), 2024);
            }
            other => panic!("expected an absolute window, got {other:?}"),
        }

        args.to = Some("2024-04-01T00:00:00Z".to_string());
        assert!(resolve_window(&args).is_err());
    }

    #[test]
    fn lone_from_or_to_is_rejected() {
        let mut args = window_args();
        args.from = Some("2024-05-01T00:00:00Z".to_string());
        assert!(resolve_window(&args).is_err());
    }

    #[test]
    fn zero_last_days_is_rejected() {
        let mut args = window_args();
        args.last_days = Some(0);
        assert!(resolve_window(&args).is_err());
    }

    #[test]
    fn bbox_parses_four_components() {
        let bbox = parse_bbox("5.0, 45.0, 6.5, 46.0").expect("bbox");
        assert_eq!(bbox.min_lon, 5.0);
        assert_eq!(bbox.max_lat, 46.0);
    }

    #[test]
    fn bbox_rejects_malformed_input() {
        assert!(parse_bbox("5.0,45.0,6.5").is_err());
        assert!(parse_bbox("5.0,45.0,six,46.0").is_err());
        assert!(parse_bbox("200.0,45.0,6.5,46.0").is_err());
        assert!(parse_bbox("6.5,45.0,5.0,46.0").is_err());
    }

    #[test]
    fn months_must_be_calendar_months() {
        assert!(validate_months(&[1, 6, 12]).is_ok());
        assert!(validate_months(&[0]).is_err());
        assert!(validate_months(&[13]).is_err());
    }

    #[test]
    fn quality_grade_flag_resolves() {
        assert_eq!(
            resolve_quality_grade(&Some("research".to_string())).expect("grade"),
            Some(QualityGrade::Research)
        );
        assert_eq!(resolve_quality_grade(&None).expect("no grade"), None);
        assert!(resolve_quality_grade(&Some("verified".to_string())).is_err());
    }

    #[test]
    fn export_defaults_validate() {
        let args = ExportArgs::parse_from(["export"]);
        assert!(validate_export_args(&args).is_ok());
        assert_eq!(args.page_size, 1000);
        assert_eq!(args.max_pages, 50);
        assert_eq!(args.fan_out, 4);
        assert!(!args.preview_fallback);
    }

    #[test]
    fn export_args_reject_zero_knobs() {
        let mut args = ExportArgs::parse_from(["export"]);
        args.page_size = 0;
        assert!(validate_export_args(&args).is_err());

        let mut args = ExportArgs::parse_from(["export"]);
        args.narrow_fraction = 1.5;
        assert!(validate_export_args(&args).is_err());

        let mut args = ExportArgs::parse_from(["export"]);
        args.fan_out = 0;
        assert!(validate_export_args(&args).is_err());

        let mut args = ExportArgs::parse_from(["export"]);
        args.rps = 0;
        assert!(validate_export_args(&args).is_err());
    }

    #[test]
    fn window_summaries_render_both_forms() {
        assert_eq!(
            window_summary(&TimeWindow::LastDays { days: 7 }),
            "last 7d"
        );
        let start = Utc::now();
        let rendered = window_summary(&TimeWindow::Absolute {
            start,
            end: start + chrono::Duration::days(1),
        });
        assert!(rendered.contains(".."));
    }
}
