//! Telemetry sinks
//!
//! Every stage transition and run completion is reported to a sink. Writes
//! are fire-and-forget: the orchestrator logs a failing sink and moves on.
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

use crate::stage::StageId;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("TELEMETRY/IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("TELEMETRY/ENCODE: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("TELEMETRY/LOCK: sink poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageCompleted {
        correlation_id: String,
        stage: StageId,
        iteration: u32,
        latency_ms: u64,
    },
    StageFailed {
        correlation_id: String,
        stage: StageId,
        message: String,
    },
    StageSkipped {
        correlation_id: String,
        stage: StageId,
    },
    RunFinished {
        correlation_id: String,
        succeeded: bool,
        iterations: u32,
        score: Option<f32>,
        latency_ms: u64,
    },
}

impl PipelineEvent {
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::StageCompleted { correlation_id, .. }
            | Self::StageFailed { correlation_id, .. }
            | Self::StageSkipped { correlation_id, .. }
            | Self::RunFinished { correlation_id, .. } => correlation_id,
        }
    }
}

/// A telemetry entry as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEntry {
    /// Timestamp (Unix ms)
    pub timestamp: i64,
    #[serde(flatten)]
    pub event: PipelineEvent,
}

impl TelemetryEntry {
    pub fn now(event: PipelineEvent) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            event,
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &PipelineEvent) -> Result<(), TelemetryError>;
}

/// Discards everything
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&self, _event: &PipelineEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Emits events as structured `tracing` records
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &PipelineEvent) -> Result<(), TelemetryError> {
        match event {
            PipelineEvent::StageCompleted {
                correlation_id,
                stage,
                iteration,
                latency_ms,
            } => tracing::info!(%correlation_id, %stage, iteration, latency_ms, "stage completed"),
            PipelineEvent::StageFailed {
                correlation_id,
                stage,
                message,
            } => tracing::warn!(%correlation_id, %stage, %message, "stage failed"),
            PipelineEvent::StageSkipped {
                correlation_id,
                stage,
            } => tracing::debug!(%correlation_id, %stage, "stage skipped"),
            PipelineEvent::RunFinished {
                correlation_id,
                succeeded,
                iterations,
                score,
                latency_ms,
            } => tracing::info!(
                %correlation_id,
                succeeded,
                iterations,
                score = score.unwrap_or(0.0),
                latency_ms,
                "run finished"
            ),
        }
        Ok(())
    }
}

/// Appends one JSON object per line to a file
pub struct JsonlSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl TelemetrySink for JsonlSink {
    fn record(&self, event: &PipelineEvent) -> Result<(), TelemetryError> {
        let line = serde_json::to_string(&TelemetryEntry::now(event.clone()))?;
        let _guard = self.lock.lock().map_err(|_| TelemetryError::Poisoned)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Keeps the most recent events in memory
pub struct MemorySink {
    entries: Mutex<Vec<PipelineEvent>>,
    max_entries: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_max_entries(10_000)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries: max,
        }
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: &PipelineEvent) -> Result<(), TelemetryError> {
        let mut entries = self.entries.lock().map_err(|_| TelemetryError::Poisoned)?;
        entries.push(event.clone());
        if entries.len() > self.max_entries {
            let drain_count = entries.len() - self.max_entries;
            entries.drain(0..drain_count);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skipped(id: &str) -> PipelineEvent {
        PipelineEvent::StageSkipped {
            correlation_id: id.to_string(),
            stage: StageId::Plan,
        }
    }

    #[test]
    fn test_memory_sink_trims() {
        let sink = MemorySink::with_max_entries(2);
        for id in ["a", "b", "c"] {
            sink.record(&skipped(id)).unwrap();
        }
        let ids: Vec<String> = sink
            .events()
            .iter()
            .map(|e| e.correlation_id().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!("midigent-telemetry-{}.jsonl", uuid::Uuid::new_v4()));
        let sink = JsonlSink::new(&path);
        sink.record(&skipped("a")).unwrap();
        sink.record(&skipped("b")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"event\":\"stage_skipped\""));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_jsonl_sink_reports_io_errors() {
        let sink = JsonlSink::new("/nonexistent-dir/for/sure/telemetry.jsonl");
        assert!(sink.record(&skipped("a")).is_err());
    }
}
