//! Structured JSONL logging.
//!
//! Log records never go to stdout, which carries command output (and the
//! `--json` documents scripts parse). They are written as one JSON object per
//! line to a daily-rolled file, or to stderr when no file can be opened.
//!
//! The file location is, in order: `SHIPGATE_LOG_PATH`, `SHIPGATE_LOG_DIR`,
//! the `log_dir` config key, `/var/log` (unix), the platform data directory,
//! and finally the working directory.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "SHIPGATE_LOG_PATH";
const ENV_LOG_DIR: &str = "SHIPGATE_LOG_DIR";
const UNIX_LOG_DIR: &str = "/var/log";

/// Where log records should go.
#[derive(Clone, Debug)]
pub struct LogSettings {
    /// Name used for the log file and in platform directory lookup.
    pub service: &'static str,
    /// `log_dir` from configuration.
    pub config_dir: Option<Utf8PathBuf>,
}

impl LogSettings {
    /// Settings for this binary with the configured directory, if any.
    pub fn new(config_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME"),
            config_dir,
        }
    }
}

/// Keeps the background writer alive; drop it last.
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(settings: &LogSettings, filter: EnvFilter) -> Result<LogGuard> {
    let overrides = EnvOverrides::from_env();
    let (writer, worker) = match open_file_writer(settings, &overrides) {
        Ok(pair) => pair,
        Err(reason) => {
            eprintln!("warning: {reason}; logging to stderr");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(JsonLinesLayer { writer })
        .try_init()?;

    tracing::debug!("logging initialized");
    Ok(LogGuard { _worker: worker })
}

/// The level filter: `--quiet` > `-v`/`-vv` > `RUST_LOG` > configured level.
pub fn filter_for(quiet: bool, verbose: u8, configured: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 1) => EnvFilter::new("debug"),
        (false, 2..) => EnvFilter::new("trace"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
        }
    }
}

// ============================================================================
// Log file location
// ============================================================================

#[derive(Debug, Default)]
struct EnvOverrides {
    path: Option<Utf8PathBuf>,
    dir: Option<Utf8PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().map(Utf8PathBuf::from);
        Self {
            path: var(ENV_LOG_PATH),
            dir: var(ENV_LOG_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogFile {
    dir: Utf8PathBuf,
    name: String,
}

fn open_file_writer(
    settings: &LogSettings,
    overrides: &EnvOverrides,
) -> Result<(NonBlocking, WorkerGuard), String> {
    let file = locate(settings, overrides)?;
    let appender = tracing_appender::rolling::daily(&file.dir, &file.name);
    Ok(tracing_appender::non_blocking(appender))
}

fn locate(settings: &LogSettings, overrides: &EnvOverrides) -> Result<LogFile, String> {
    let default_name = format!("{}.jsonl", settings.service);

    if let Some(path) = &overrides.path {
        let name = path
            .file_name()
            .ok_or_else(|| format!("{ENV_LOG_PATH} must name a file"))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        return writable(dir, name);
    }

    if let Some(dir) = overrides.dir.as_ref().or(settings.config_dir.as_ref()) {
        return writable(dir, &default_name);
    }

    let mut fallbacks = Vec::new();
    if cfg!(unix) {
        fallbacks.push(Utf8PathBuf::from(UNIX_LOG_DIR));
    }
    if let Some(dirs) = directories::ProjectDirs::from("", "", settings.service)
        && let Ok(dir) = Utf8PathBuf::from_path_buf(dirs.data_local_dir().join("logs"))
    {
        fallbacks.push(dir);
    }
    if let Ok(cwd) = std::env::current_dir()
        && let Ok(cwd) = Utf8PathBuf::from_path_buf(cwd)
    {
        fallbacks.push(cwd);
    }

    fallbacks
        .iter()
        .find_map(|dir| writable(dir, &default_name).ok())
        .ok_or_else(|| "no writable log directory".to_string())
}

/// Create `dir` and open `dir/name` for append to prove it is usable.
fn writable(dir: &Utf8Path, name: &str) -> Result<LogFile, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("cannot create {dir}: {e}"))?;
    let path = dir.join(name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open {path}: {e}"))?;
    Ok(LogFile {
        dir: dir.to_path_buf(),
        name: name.to_string(),
    })
}

// ============================================================================
// JSON lines layer
// ============================================================================

struct JsonLinesLayer<W> {
    writer: W,
}

/// Fields recorded on a span, copied into every event inside it.
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLinesLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.0));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        values.record(&mut fields);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(fields.0),
            None => extensions.insert(SpanFields(fields.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut record = Map::new();
        record.insert("timestamp".into(), Value::String(utc_timestamp()));
        record.insert(
            "level".into(),
            Value::String(meta.level().as_str().to_lowercase()),
        );
        record.insert("target".into(), Value::String(meta.target().to_string()));

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
                    record.extend(fields.clone());
                }
            }
        }

        let mut fields = FieldMap::default();
        event.record(&mut fields);
        record.extend(fields.0);

        let mut out = self.writer.make_writer();
        if serde_json::to_writer(&mut out, &Value::Object(record)).is_ok() {
            let _ = out.write_all(b"\n");
        }
    }
}

#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl FieldMap {
    fn put(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldMap {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(n));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
fn utc_timestamp() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    let (year, month, day) = civil_from_days(secs / 86_400);
    let of_day = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        of_day / 3600,
        (of_day % 3600) / 60,
        of_day % 60,
        now.subsec_millis()
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
const fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
