//! Draw lifecycle events.
//!
//! The core emits, per draw id and in order: scan/commit, collection
//! progress, mix start, mix comparison, mix trace, final result. Delivery is
//! a collaborator concern — the [`EventSink`] contract is synchronous and
//! must never block the producer (queue or drop on the other side).
//!
//! Wire shape: externally tagged with `type`, camelCase fields, `drawId`
//! injected by [`DrawEvent::to_json`]. These names are consumed by live
//! subscribers and recorded traces alike; treat them as frozen.

use serde::Serialize;

use crate::beacon::BlockRecord;
use crate::record::{CompareReport, TraceReport};

/// Everything a draw can announce about itself.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum DrawEvent {
    #[serde(rename = "commit")]
    Commit { blocks: usize, source: String },

    #[serde(rename = "block.waiting")]
    BlockWaiting { note: String },

    #[serde(rename = "block.finalized_all")]
    BlockFinalizedAll {
        explorers: Vec<BlockRecord>,
        beacon_hex: String,
    },

    #[serde(rename = "loc.progress")]
    LocProgress {
        source: String,
        bytes_total: usize,
        packets: usize,
        root_hex: String,
    },

    #[serde(rename = "collect.open")]
    CollectOpen {
        deadline_ms: u64,
        bytes: usize,
        root_hex: Option<String>,
    },

    #[serde(rename = "collect.tick")]
    CollectTick { remaining_ms: u64, bytes: usize },

    #[serde(rename = "collect.close")]
    CollectClose {
        bytes: usize,
        root_hex: Option<String>,
    },

    #[serde(rename = "collect.summary")]
    CollectSummary {
        bytes: usize,
        root_hex: Option<String>,
        urandom_bytes: usize,
        jitter_batches: usize,
        jitter_bytes: usize,
        jitter_samples_total: usize,
    },

    #[serde(rename = "mix.start")]
    MixStart { inputs: Vec<String> },

    #[serde(rename = "mix.compare")]
    MixCompare {
        #[serde(flatten)]
        compare: CompareReport,
    },

    #[serde(rename = "mix.trace")]
    MixTrace {
        #[serde(flatten)]
        trace: TraceReport,
    },

    #[serde(rename = "result")]
    Completed { seed_hex: String, number: String },

    #[serde(rename = "range.sample")]
    RangeSample {
        n1: i128,
        n2: i128,
        label: String,
        subseed_hex: String,
        attempts: u64,
        rejected: u64,
        value: String,
    },

    #[serde(rename = "error")]
    Error { stage: String, message: String },

    #[serde(rename = "current")]
    Current { draw_id: String },
}

impl DrawEvent {
    /// The wire `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Commit { .. } => "commit",
            Self::BlockWaiting { .. } => "block.waiting",
            Self::BlockFinalizedAll { .. } => "block.finalized_all",
            Self::LocProgress { .. } => "loc.progress",
            Self::CollectOpen { .. } => "collect.open",
            Self::CollectTick { .. } => "collect.tick",
            Self::CollectClose { .. } => "collect.close",
            Self::CollectSummary { .. } => "collect.summary",
            Self::MixStart { .. } => "mix.start",
            Self::MixCompare { .. } => "mix.compare",
            Self::MixTrace { .. } => "mix.trace",
            Self::Completed { .. } => "result",
            Self::RangeSample { .. } => "range.sample",
            Self::Error { .. } => "error",
            Self::Current { .. } => "current",
        }
    }

    /// Wire JSON with `drawId` injected (unless the event already carries
    /// one, as `current` announcements do).
    pub fn to_json(&self, draw_id: &str) -> serde_json::Value {
        let mut value = serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::json!({ "type": self.kind() }));
        if let serde_json::Value::Object(map) = &mut value {
            map.entry("drawId")
                .or_insert_with(|| serde_json::Value::String(draw_id.to_string()));
        }
        value
    }
}

/// Destination for draw events. Implementations must be non-blocking.
pub trait EventSink: Send + Sync {
    fn emit(&self, draw_id: &str, event: &DrawEvent);
}

/// Discards everything. For embedding the pipeline without a listener.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _draw_id: &str, _event: &DrawEvent) {}
}

/// Records events in memory, preserving per-draw order. Used by the test
/// suites; also handy for one-shot embeddings that want the trace after
/// the fact.
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<(String, DrawEvent)>>,
}

impl MemorySink {
    /// Events emitted for one draw id, in emission order.
    pub fn events(&self, draw_id: &str) -> Vec<DrawEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == draw_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Wire `type` discriminators for one draw id, in emission order.
    pub fn kinds(&self, draw_id: &str) -> Vec<&'static str> {
        self.events(draw_id).iter().map(DrawEvent::kind).collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, draw_id: &str, event: &DrawEvent) {
        self.events
            .lock()
            .unwrap()
            .push((draw_id.to_string(), event.clone()));
    }
}
