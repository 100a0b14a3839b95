//! Decision telemetry.
//!
//! Every completion a handler produces can be appended as one JSON line to a
//! size-rotated file. Telemetry never influences a decision: write failures
//! are counted and logged, then dropped.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::RotationConfig;

/// Size-based rotating writer. Backups are named `<path>.1` .. `<path>.N`
/// (`.N.gz` when compression is on), `.1` being the newest.
pub struct RotatingWriter {
    path: PathBuf,
    file: fs::File,
    rotation: RotationConfig,
}

impl RotatingWriter {
    pub fn open(path: impl AsRef<Path>, rotation: RotationConfig) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file,
            rotation,
        })
    }

    pub fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        if let Some(limit) = self.rotation.max_bytes {
            if self.current_size() >= limit {
                self.rotate()?;
            }
        }
        writeln!(self.file, "{}", line)
    }

    pub fn current_size(&self) -> u64 {
        self.path.metadata().map(|m| m.len()).unwrap_or(0)
    }

    pub fn backup_path(&self, idx: usize) -> PathBuf {
        let suffix = if self.rotation.compress {
            format!(".{}.gz", idx)
        } else {
            format!(".{}", idx)
        };
        let mut name = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        let keep = self.rotation.keep;
        if keep > 0 {
            for idx in (1..keep).rev() {
                let from = self.backup_path(idx);
                if from.exists() {
                    fs::rename(&from, self.backup_path(idx + 1))?;
                }
            }
            let newest = self.backup_path(1);
            if self.rotation.compress {
                let data = fs::read(&self.path)?;
                let mut gz = GzEncoder::new(Vec::new(), Compression::default());
                gz.write_all(&data)?;
                fs::write(&newest, gz.finish()?)?;
            } else {
                fs::copy(&self.path, &newest)?;
            }
        }
        self.file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }
}

/// Fields of one decision record.
pub struct DecisionRecord<'a> {
    pub handler: &'a str,
    /// `None` for completions without a payload.
    pub allow_event: Option<bool>,
    pub rule: Option<&'a str>,
    /// `allow`, `block`, `delay`, `failClosed` or `done`.
    pub outcome: &'a str,
    pub delay_ms: Option<u64>,
    pub latency_ms: u128,
}

impl DecisionRecord<'_> {
    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "schemaVersion": 1,
            "ts": chrono::Utc::now().to_rfc3339(),
            "handler": self.handler,
            "allowEvent": self.allow_event,
            "rule": self.rule,
            "outcome": self.outcome,
            "delayMs": self.delay_ms,
            "latencyMs": self.latency_ms,
        })
    }
}

#[derive(Clone, Default)]
pub struct TelemetrySink {
    writer: Option<Arc<Mutex<RotatingWriter>>>,
    log_stdout: bool,
    lines_total: Arc<AtomicU64>,
    write_errors_total: Arc<AtomicU64>,
}

impl TelemetrySink {
    pub fn new(writer: Option<RotatingWriter>, log_stdout: bool) -> Self {
        Self {
            writer: writer.map(|w| Arc::new(Mutex::new(w))),
            log_stdout,
            ..Self::default()
        }
    }

    /// Open `path` for decision records. An unopenable file disables the
    /// file writer with a warning.
    pub fn open(path: Option<&str>, rotation: &RotationConfig, log_stdout: bool) -> Self {
        let writer = match path {
            Some(path) => match RotatingWriter::open(path, rotation.clone()) {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to open LOG_FILE; decision telemetry disabled");
                    None
                }
            },
            None => {
                tracing::debug!("Decision telemetry disabled: LOG_FILE not set");
                None
            }
        };
        Self::new(writer, log_stdout)
    }

    pub fn record(&self, rec: &DecisionRecord<'_>) {
        if let Some(writer) = &self.writer {
            let line = rec.to_json().to_string();
            let result = match writer.lock() {
                Ok(mut guard) => guard.write_line(&line),
                Err(poisoned) => poisoned.into_inner().write_line(&line),
            };
            match result {
                Ok(()) => {
                    self.lines_total.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to write decision record");
                    self.write_errors_total.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        if self.log_stdout {
            tracing::info!(
                target: "telemetry",
                handler = rec.handler,
                allowEvent = ?rec.allow_event,
                rule = ?rec.rule,
                outcome = rec.outcome,
                delayMs = ?rec.delay_ms,
                latencyMs = rec.latency_ms,
                "decision"
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn lines_total(&self) -> u64 {
        self.lines_total.load(Ordering::Relaxed)
    }

    pub fn write_errors_total(&self) -> u64 {
        self.write_errors_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn rec(outcome: &str) -> DecisionRecord<'_> {
        DecisionRecord {
            handler: "onMessageSendHandler",
            allow_event: Some(false),
            rule: Some("login"),
            outcome,
            delay_ms: None,
            latency_ms: 3,
        }
    }

    #[test]
    fn writes_one_json_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.log");
        let sink = TelemetrySink::open(path.to_str(), &RotationConfig::default(), false);
        assert!(sink.is_enabled());
        sink.record(&rec("block"));
        sink.record(&rec("block"));
        assert_eq!(sink.lines_total(), 2);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["schemaVersion"], 1);
        assert_eq!(v["handler"], "onMessageSendHandler");
        assert_eq!(v["allowEvent"], false);
        assert_eq!(v["rule"], "login");
        assert_eq!(v["outcome"], "block");
        assert!(v["delayMs"].is_null());
        assert!(v.get("ts").and_then(|t| t.as_str()).is_some());
    }

    #[test]
    fn rotates_plain_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.log");
        let rotation = RotationConfig {
            max_bytes: Some(100),
            keep: 2,
            compress: false,
        };
        let mut writer = RotatingWriter::open(&path, rotation).unwrap();
        let line = "x".repeat(120);
        for _ in 0..4 {
            writer.write_line(&line).unwrap();
        }
        assert!(writer.backup_path(1).exists());
        assert!(writer.backup_path(2).exists());
        let mut third = path.clone().into_os_string();
        third.push(".3");
        assert!(!PathBuf::from(third).exists());
        // current file holds only the last line
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn compresses_newest_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.log");
        let rotation = RotationConfig {
            max_bytes: Some(10),
            keep: 1,
            compress: true,
        };
        let mut writer = RotatingWriter::open(&path, rotation).unwrap();
        writer.write_line("first line").unwrap();
        writer.write_line("second line").unwrap();
        let gz = writer.backup_path(1);
        assert!(gz.to_string_lossy().ends_with(".1.gz"));
        let mut decoded = String::new();
        GzDecoder::new(fs::File::open(gz).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "first line\n");
    }

    #[test]
    fn disabled_sink_counts_nothing() {
        let sink = TelemetrySink::open(None, &RotationConfig::default(), false);
        assert!(!sink.is_enabled());
        sink.record(&rec("allow"));
        assert_eq!(sink.lines_total(), 0);
        assert_eq!(sink.write_errors_total(), 0);
    }
}
