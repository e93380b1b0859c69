use std::fs::{File, OpenOptions};
use std::io::{Stdout, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use brandfit_core::{TelemetryEvent, TelemetrySink};
use serde::Serialize;

pub const SINK_ENV: &str = "BRANDFIT_TELEMETRY_SINK";
pub const FILE_ENV: &str = "BRANDFIT_TELEMETRY_FILE";

pub fn sink_from_env() -> Option<Box<dyn TelemetrySink>> {
    let mode = std::env::var(SINK_ENV).ok()?;
    let file = std::env::var(FILE_ENV).ok();
    sink_for(&mode, file.as_deref())
}

fn sink_for(mode: &str, file: Option<&str>) -> Option<Box<dyn TelemetrySink>> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "stdout" => Some(Box::new(stdout_sink())),
        "file" => {
            let path = file.map(str::trim).filter(|v| !v.is_empty())?;
            match file_sink(Path::new(path)) {
                Ok(sink) => Some(Box::new(sink)),
                Err(err) => {
                    tracing::warn!(path, error = %err, "telemetry file unavailable");
                    None
                }
            }
        }
        other => {
            tracing::warn!(mode = other, "unknown telemetry sink, telemetry disabled");
            None
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryEnvelope<'a> {
    event_type: String,
    job: &'a str,
    policy: &'static str,
    duration_ms: Option<u64>,
    detail: Option<&'a str>,
}

impl<'a> From<&'a TelemetryEvent> for TelemetryEnvelope<'a> {
    fn from(event: &'a TelemetryEvent) -> Self {
        Self {
            event_type: format!("{:?}", event.event_type),
            job: &event.job,
            policy: event.policy.label(),
            duration_ms: event.duration_ms,
            detail: event.detail.as_deref(),
        }
    }
}

/// Serializes every event as one JSON object per line into `W`.
///
/// Write failures are logged and the event is dropped; jobs never see them.
pub struct JsonLinesSink<W: Write> {
    name: String,
    writer: Mutex<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_event(&self, event: &TelemetryEvent) -> Result<()> {
        let line = serde_json::to_string(&TelemetryEnvelope::from(event))
            .context("serializing telemetry event")?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("telemetry writer lock poisoned"))?;
        writeln!(writer, "{line}").context("writing telemetry line")?;
        writer.flush().context("flushing telemetry line")
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn emit(&self, event: TelemetryEvent) {
        if let Err(err) = self.write_event(&event) {
            tracing::warn!(sink = %self.name, error = %err, "dropping telemetry event");
        }
    }
}

pub fn stdout_sink() -> JsonLinesSink<Stdout> {
    JsonLinesSink::new("stdout", std::io::stdout())
}

/// Opens `path` for appending, creating it and its parent directory first.
pub fn file_sink(path: &Path) -> Result<JsonLinesSink<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(JsonLinesSink::new(path.display().to_string(), file))
}
