//! Append-only optimization metrics (C10).
//!
//! Each call to the orchestrator appends one [`MetricsRecord`]. Records
//! are also folded into a per-intent running aggregate so summaries
//! don't have to rescan the log. Snapshots are an opaque `bincode` blob;
//! callers that need durable metrics persist the blob themselves.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{OmniError, OmniResult};
use crate::types::IntentType;

/// One recorded optimization call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricsRecord {
    /// Total estimated tokens across all candidate chunks before selection/compression.
    pub original_tokens: u32,
    /// Tokens in the assembled prompt actually sent downstream.
    pub optimized_tokens: u32,
    /// `original_tokens - optimized_tokens`, clamped at zero.
    pub saved: u32,
    /// `saved / original_tokens`, or 0.0 when `original_tokens` is zero.
    pub ratio: f64,
    /// Intent classification for this call.
    pub intent_type: IntentType,
    /// Caller-supplied timestamp (milliseconds), not read from the system clock.
    pub timestamp: i64,
}

/// Running aggregate for one [`IntentType`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct IntentAggregate {
    /// Number of records folded in.
    pub count: u64,
    /// Sum of `original_tokens` across records.
    pub total_original_tokens: u64,
    /// Sum of `optimized_tokens` across records.
    pub total_optimized_tokens: u64,
    /// Sum of `saved` across records.
    pub total_saved: u64,
    /// Largest `ratio` seen.
    pub best_ratio: f64,
    /// Smallest `ratio` seen.
    pub worst_ratio: f64,
}

impl IntentAggregate {
    fn fold(&mut self, record: &MetricsRecord) {
        if self.count == 0 {
            self.best_ratio = record.ratio;
            self.worst_ratio = record.ratio;
        } else {
            self.best_ratio = self.best_ratio.max(record.ratio);
            self.worst_ratio = self.worst_ratio.min(record.ratio);
        }
        self.count += 1;
        self.total_original_tokens += u64::from(record.original_tokens);
        self.total_optimized_tokens += u64::from(record.optimized_tokens);
        self.total_saved += u64::from(record.saved);
    }

    /// Mean compression ratio across folded records.
    pub fn average_ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_saved as f64 / self.total_original_tokens.max(1) as f64
        }
    }
}

/// Human-readable rollup returned by [`MetricsRecorder::summary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Total records across all intent types.
    pub total_records: u64,
    /// Total tokens saved across all records.
    pub total_saved: u64,
    /// Per-intent aggregates, keyed by [`IntentType::as_str`].
    pub by_intent: Vec<(String, IntentAggregate)>,
}

impl MetricsSummary {
    /// Render as a short multi-line report, suitable for a CLI `--stats` flag.
    pub fn render(&self) -> String {
        let mut out = format!(
            "optimizations: {}, tokens saved: {}\n",
            self.total_records, self.total_saved
        );
        for (intent, agg) in &self.by_intent {
            out.push_str(&format!(
                "  {intent}: {} calls, avg ratio {:.2}, best {:.2}, worst {:.2}\n",
                agg.count,
                agg.average_ratio(),
                agg.best_ratio,
                agg.worst_ratio
            ));
        }
        out
    }
}

/// Opaque durable form of a recorder's state, produced by [`MetricsRecorder::snapshot`].
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotPayload {
    records: Vec<MetricsRecord>,
}

/// Append-only log plus per-intent aggregates (C10).
///
/// Appends are O(1) amortized (a push plus a dashmap entry update);
/// snapshotting is O(k) in the number of records.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    records: RwLock<Vec<MetricsRecord>>,
    aggregates: DashMap<IntentType, IntentAggregate>,
}

impl MetricsRecorder {
    /// Build an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record, updating the per-intent aggregate.
    pub fn record(&self, record: MetricsRecord) {
        tracing::debug!(
            intent = record.intent_type.as_str(),
            original_tokens = record.original_tokens,
            optimized_tokens = record.optimized_tokens,
            "recorded optimization"
        );
        self.aggregates
            .entry(record.intent_type)
            .or_default()
            .fold(&record);
        self.records.write().push(record);
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no records have been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable rollup across all recorded calls.
    pub fn summary(&self) -> MetricsSummary {
        let records = self.records.read();
        let total_saved: u64 = records.iter().map(|r| u64::from(r.saved)).sum();
        let mut by_intent: Vec<(String, IntentAggregate)> = self
            .aggregates
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), *entry.value()))
            .collect();
        by_intent.sort_by(|a, b| a.0.cmp(&b.0));
        MetricsSummary {
            total_records: records.len() as u64,
            total_saved,
            by_intent,
        }
    }

    /// Serialize the full record log to an opaque byte blob.
    pub fn snapshot(&self) -> OmniResult<Vec<u8>> {
        let payload = SnapshotPayload { records: self.records.read().clone() };
        let bytes = bincode::serialize(&payload)
            .map_err(|e| OmniError::Serialization(e.to_string()))?;
        tracing::info!(record_count = payload.records.len(), "metrics snapshot taken");
        Ok(bytes)
    }

    /// Rebuild a recorder from a blob produced by [`Self::snapshot`].
    /// Replaces this recorder's entire state.
    pub fn restore(&self, bytes: &[u8]) -> OmniResult<()> {
        let payload: SnapshotPayload =
            bincode::deserialize(bytes).map_err(|e| OmniError::Serialization(e.to_string()))?;
        self.aggregates.clear();
        for record in &payload.records {
            self.aggregates.entry(record.intent_type).or_default().fold(record);
        }
        *self.records.write() = payload.records;
        tracing::info!(record_count = self.len(), "metrics snapshot restored");
        Ok(())
    }
}

/// Build a [`MetricsRecord`] from token counts, clamping `saved` at zero so
/// an unexpected token-count expansion never reports negative savings.
pub fn build_record(
    original_tokens: u32,
    optimized_tokens: u32,
    intent_type: IntentType,
    timestamp: i64,
) -> MetricsRecord {
    let saved = original_tokens.saturating_sub(optimized_tokens);
    let ratio = if original_tokens == 0 {
        0.0
    } else {
        f64::from(saved) / f64::from(original_tokens)
    };
    MetricsRecord { original_tokens, optimized_tokens, saved, ratio, intent_type, timestamp }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(original: u32, optimized: u32, intent: IntentType, ts: i64) -> MetricsRecord {
        build_record(original, optimized, intent, ts)
    }

    #[test]
    fn build_record_clamps_negative_savings_to_zero() {
        let r = record(100, 150, IntentType::Explain, 0);
        assert_eq!(r.saved, 0);
        assert!((r.ratio - 0.0).abs() < 1e-9);
    }

    #[test]
    fn record_updates_len_and_aggregate() {
        let recorder = MetricsRecorder::new();
        recorder.record(record(1000, 400, IntentType::BugFix, 1));
        recorder.record(record(2000, 1000, IntentType::BugFix, 2));
        assert_eq!(recorder.len(), 2);
        let summary = recorder.summary();
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.total_saved, 600 + 1000);
        let bug_fix = summary
            .by_intent
            .iter()
            .find(|(name, _)| name == IntentType::BugFix.as_str())
            .expect("bug_fix aggregate present");
        assert_eq!(bug_fix.1.count, 2);
    }

    #[test]
    fn empty_recorder_has_zeroed_summary() {
        let recorder = MetricsRecorder::new();
        let summary = recorder.summary();
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.total_saved, 0);
        assert!(summary.by_intent.is_empty());
    }

    #[test]
    fn snapshot_then_restore_reproduces_summary() {
        let recorder = MetricsRecorder::new();
        recorder.record(record(500, 200, IntentType::Refactor, 10));
        recorder.record(record(800, 100, IntentType::Test, 20));
        let bytes = recorder.snapshot().unwrap();

        let restored = MetricsRecorder::new();
        restored.restore(&bytes).unwrap();
        assert_eq!(restored.len(), recorder.len());
        let original_summary = recorder.summary();
        let restored_summary = restored.summary();
        assert_eq!(original_summary.total_saved, restored_summary.total_saved);
        assert_eq!(original_summary.by_intent.len(), restored_summary.by_intent.len());
    }

    #[test]
    fn restore_replaces_rather_than_appends() {
        let recorder = MetricsRecorder::new();
        recorder.record(record(500, 200, IntentType::Search, 1));
        let bytes = recorder.snapshot().unwrap();
        recorder.record(record(900, 300, IntentType::Search, 2));
        assert_eq!(recorder.len(), 2);
        recorder.restore(&bytes).unwrap();
        assert_eq!(recorder.len(), 1);
    }
}
