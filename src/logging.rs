//! Structured event logging with sensitive-field redaction.
//!
//! Every significant action in the gateway flows through
//! [`EventLogger::emit`], which redacts the caller-supplied context, renames
//! context keys that collide with reserved record fields and writes one line
//! per configured file sink.  Console output is mirrored through `tracing`
//! so operators keep the familiar stdout stream.  Sink failures are counted
//! and reported to the remaining sinks; they never reach a caller.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::redact::redact_map;

/// Severity of one log event.  Ordering follows declaration order, so
/// comparisons like `level >= sink.min_level` do the expected thing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// Parse a level name as written in `LOG_LEVEL`.  Case-insensitive.
    pub fn parse(value: &str) -> Option<Level> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warning" | "warn" => Some(Level::Warning),
            "error" => Some(Level::Error),
            "critical" => Some(Level::Critical),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

/// Record field names owned by the serializer.  Caller context keys that
/// collide are renamed with an `_extra` suffix so caller data is never
/// dropped and never overwrites a reserved field.
pub const RESERVED_FIELDS: &[&str] = &[
    "ts",
    "timestamp",
    "level",
    "message",
    "action",
    "context",
    "module",
];

fn sanitize_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                (format!("{key}_extra"), value)
            } else {
                (key, value)
            }
        })
        .collect()
}

/// Size-based rotating line writer.  Backups are numbered `<path>.1`
/// (newest) through `<path>.N`; the newest backup may optionally be
/// gzipped.  Parent directories are created on open.
pub struct RotatingWriter {
    path: PathBuf,
    file: fs::File,
    max_bytes: Option<u64>,
    keep: usize,
    compress: bool,
}

impl RotatingWriter {
    pub fn open(
        path: impl AsRef<Path>,
        max_bytes: Option<u64>,
        keep: usize,
        compress: bool,
    ) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            max_bytes,
            keep,
            compress,
        })
    }

    pub fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.rotate_if_needed();
        writeln!(self.file, "{line}")
    }

    fn rotate_if_needed(&mut self) {
        let Some(limit) = self.max_bytes else {
            return;
        };
        let over = self
            .path
            .metadata()
            .map(|meta| meta.len() >= limit)
            .unwrap_or(false);
        if over {
            self.shift_backups();
            self.compress_newest_backup();
            self.reopen();
        }
    }

    fn backup_path(&self, idx: usize, gz: bool) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(format!(".{idx}"));
        if gz {
            os.push(".gz");
        }
        PathBuf::from(os)
    }

    /// Slide `<path>.N-1` to `<path>.N` oldest-last, then move the live file
    /// to `<path>.1`.  The rename at index `keep` overwrites the oldest
    /// backup, bounding retained history.
    fn shift_backups(&self) {
        if self.keep == 0 {
            return;
        }
        for idx in (1..=self.keep).rev() {
            if idx == 1 {
                let _ = fs::rename(&self.path, self.backup_path(1, false));
            } else {
                for gz in [false, true] {
                    let src = self.backup_path(idx - 1, gz);
                    if src.exists() {
                        let _ = fs::rename(&src, self.backup_path(idx, gz));
                    }
                }
            }
        }
    }

    fn compress_newest_backup(&self) {
        if !self.compress || self.keep == 0 {
            return;
        }
        let plain = self.backup_path(1, false);
        let Ok(data) = fs::read(&plain) else {
            return;
        };
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(&data).is_ok() {
            if let Ok(buf) = encoder.finish() {
                if fs::write(self.backup_path(1, true), buf).is_ok() {
                    let _ = fs::remove_file(&plain);
                }
            }
        }
    }

    fn reopen(&mut self) {
        match fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
        {
            Ok(file) => self.file = file,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to reopen log file after rotation");
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SinkFormat {
    Json,
    Text,
}

struct FileSink {
    name: &'static str,
    min_level: Level,
    format: SinkFormat,
    writer: Mutex<RotatingWriter>,
}

impl FileSink {
    fn write(&self, event: &Event<'_>) -> std::io::Result<()> {
        let line = match self.format {
            SinkFormat::Json => event.json_line(),
            SinkFormat::Text => event.text_line(),
        };
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.write_line(&line)
    }
}

/// One fully prepared record: redacted context, sanitized keys.
struct Event<'a> {
    ts: String,
    level: Level,
    action: &'a str,
    message: &'a str,
    context: &'a Map<String, Value>,
}

impl Event<'_> {
    fn json_line(&self) -> String {
        serde_json::json!({
            "ts": self.ts,
            "level": self.level.label(),
            "message": self.message,
            "action": self.action,
            "context": self.context,
        })
        .to_string()
    }

    fn text_line(&self) -> String {
        let mut line = format!(
            "[{}] [{}] {} | action={}",
            self.ts,
            self.level.label(),
            self.message,
            self.action
        );
        let mut keys: Vec<&String> = self.context.keys().collect();
        keys.sort();
        for key in keys {
            let rendered = match &self.context[key.as_str()] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            line.push_str(&format!(" | {key}={rendered}"));
        }
        line
    }
}

/// Process-wide structured logger.  Sinks and the sensitive-key set are
/// fixed at construction; concurrent emitters serialize on the per-sink
/// mutex only for the physical write.
pub struct EventLogger {
    min_level: Level,
    sensitive: HashSet<String>,
    sinks: Vec<FileSink>,
    lines_written: AtomicU64,
    write_errors: AtomicU64,
}

impl EventLogger {
    /// Build the sink set described by `cfg`.  A sink whose file cannot be
    /// opened is skipped with a warning rather than failing startup.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let max_bytes = (cfg.max_log_bytes > 0).then_some(cfg.max_log_bytes);
        let mut sinks = Vec::new();

        match RotatingWriter::open(
            &cfg.log_json_path,
            max_bytes,
            cfg.log_backup_count,
            cfg.log_rotate_compress,
        ) {
            Ok(writer) => sinks.push(FileSink {
                name: "json_file",
                min_level: Level::Debug,
                format: SinkFormat::Json,
                writer: Mutex::new(writer),
            }),
            Err(err) => {
                tracing::warn!(path = %cfg.log_json_path, error = %err, "failed to open JSON log sink; JSON file logging disabled");
            }
        }

        if cfg.use_text_file_log {
            match RotatingWriter::open(
                &cfg.log_file_path,
                max_bytes,
                cfg.log_backup_count,
                cfg.log_rotate_compress,
            ) {
                Ok(writer) => sinks.push(FileSink {
                    name: "text_file",
                    min_level: Level::Debug,
                    format: SinkFormat::Text,
                    writer: Mutex::new(writer),
                }),
                Err(err) => {
                    tracing::warn!(path = %cfg.log_file_path, error = %err, "failed to open text log sink; text file logging disabled");
                }
            }
        }

        match RotatingWriter::open(
            &cfg.error_log_path,
            max_bytes,
            cfg.log_backup_count,
            cfg.log_rotate_compress,
        ) {
            Ok(writer) => sinks.push(FileSink {
                name: "error_file",
                min_level: Level::Error,
                format: SinkFormat::Text,
                writer: Mutex::new(writer),
            }),
            Err(err) => {
                tracing::warn!(path = %cfg.error_log_path, error = %err, "failed to open error log sink; error file logging disabled");
            }
        }

        Self {
            min_level: cfg.min_level,
            sensitive: cfg.sensitive_fields.clone(),
            sinks,
            lines_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    /// Write one event to every sink at or above `level` and mirror it to
    /// the console.  `context` should be a JSON object; anything else is
    /// wrapped under a `value` key.  This never fails: a sink error is
    /// counted, reported once to the remaining sinks and swallowed.
    pub fn emit(&self, level: Level, action: &str, message: &str, context: Value) {
        if level < self.min_level {
            return;
        }
        let context = match context {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let context = sanitize_keys(redact_map(&context, &self.sensitive));
        let event = Event {
            ts: Utc::now().to_rfc3339(),
            level,
            action,
            message,
            context: &context,
        };

        let mut failed: Vec<(&'static str, String)> = Vec::new();
        for sink in &self.sinks {
            if level < sink.min_level {
                continue;
            }
            match sink.write(&event) {
                Ok(()) => {
                    self.lines_written.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    self.write_errors.fetch_add(1, Ordering::Relaxed);
                    failed.push((sink.name, err.to_string()));
                }
            }
        }
        if !failed.is_empty() {
            self.report_sink_failures(&failed);
        }
        self.mirror_to_console(&event);
    }

    /// Total lines successfully written across all sinks.
    pub fn lines_total(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }

    /// Total sink write failures.
    pub fn write_errors_total(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    fn report_sink_failures(&self, failed: &[(&'static str, String)]) {
        for (sink_name, error) in failed {
            tracing::warn!(sink = *sink_name, error = %error, "log sink write failed");
            let context: Map<String, Value> = [
                ("sink".to_string(), Value::String((*sink_name).to_string())),
                ("error".to_string(), Value::String(error.clone())),
            ]
            .into_iter()
            .collect();
            let note = Event {
                ts: Utc::now().to_rfc3339(),
                level: Level::Error,
                action: "log_sink_error",
                message: "log sink write failed",
                context: &context,
            };
            for sink in &self.sinks {
                if sink.name == *sink_name {
                    continue;
                }
                let _ = sink.write(&note);
            }
        }
    }

    fn mirror_to_console(&self, event: &Event<'_>) {
        let context = Value::Object(event.context.clone()).to_string();
        match event.level {
            Level::Debug => {
                tracing::debug!(target: "toolgate", action = event.action, context = %context, "{}", event.message);
            }
            Level::Info => {
                tracing::info!(target: "toolgate", action = event.action, context = %context, "{}", event.message);
            }
            Level::Warning => {
                tracing::warn!(target: "toolgate", action = event.action, context = %context, "{}", event.message);
            }
            Level::Error => {
                tracing::error!(target: "toolgate", action = event.action, context = %context, "{}", event.message);
            }
            Level::Critical => {
                tracing::error!(target: "toolgate", action = event.action, critical = true, context = %context, "{}", event.message);
            }
        }
    }
}

static GLOBAL_LOGGER: OnceCell<Arc<EventLogger>> = OnceCell::new();

/// Install `logger` as the process-wide logger and return the installed
/// instance.  Repeated calls keep the first logger, so sinks are never
/// duplicated by re-initialization.
pub fn init(logger: Arc<EventLogger>) -> Arc<EventLogger> {
    GLOBAL_LOGGER.get_or_init(|| logger).clone()
}

/// The installed process-wide logger, if any.
pub fn global() -> Option<Arc<EventLogger>> {
    GLOBAL_LOGGER.get().cloned()
}
