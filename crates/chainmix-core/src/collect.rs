//! Time-boxed local entropy accumulation.
//!
//! A bounded real-time window during which jitter batches (and optionally a
//! one-shot draw of OS randomness) are appended to the draw's pool, with
//! progress events after every packet. The inter-iteration delay is capped
//! at one second regardless of window length, keeping deadline checks and
//! tick emission responsive.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{BeaconError, Result};
use crate::events::{DrawEvent, EventSink};
use crate::pool::EntropyStore;
use crate::sources::{cpu_jitter_bytes, os_random_bytes};

/// Collection window parameters. Every option, default, and effect in one
/// place.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Window length in milliseconds. `0` disables collection entirely.
    pub window_ms: u64,
    /// Whether to append jitter batches during the window.
    pub jitter: bool,
    /// Timer-delta samples per jitter batch.
    pub jitter_samples: usize,
    /// One-shot OS randomness drawn at window start (`0` disables).
    pub urandom_bytes: usize,
    /// Strict mode: fail the draw when the local byte floor is unmet.
    pub require_local: bool,
    /// Minimum local bytes for strict mode.
    pub min_local_bytes: usize,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            window_ms: 8_000,
            jitter: true,
            jitter_samples: 12_000,
            urandom_bytes: 1_024,
            require_local: false,
            min_local_bytes: 0,
        }
    }
}

/// What the window actually produced.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectSummary {
    pub urandom_bytes: usize,
    pub jitter_batches: usize,
    pub jitter_bytes: usize,
    pub jitter_samples_total: usize,
}

fn progress(store: &EntropyStore, draw_id: &str, sink: &dyn EventSink, source: &str) {
    let snap = store.snapshot(draw_id);
    sink.emit(
        draw_id,
        &DrawEvent::LocProgress {
            source: source.to_string(),
            bytes_total: snap.total_bytes,
            packets: snap.packets,
            root_hex: snap.root_hex(),
        },
    );
}

/// Run the collection window for `draw_id`, appending into `store` and
/// emitting progress over `sink`.
///
/// In strict mode the entropy-floor failure is raised only after the
/// normal close-out events have been emitted.
pub async fn collect_local_entropy(
    store: &EntropyStore,
    draw_id: &str,
    config: &CollectConfig,
    sink: &dyn EventSink,
) -> Result<CollectSummary> {
    let mut summary = CollectSummary::default();
    if config.window_ms == 0 {
        return Ok(summary);
    }

    if config.urandom_bytes > 0 {
        let data = os_random_bytes(config.urandom_bytes);
        summary.urandom_bytes = data.len();
        store.add(draw_id, data);
        progress(store, draw_id, sink, "SRV");
    }

    let open_snap = store.snapshot(draw_id);
    sink.emit(
        draw_id,
        &DrawEvent::CollectOpen {
            deadline_ms: config.window_ms,
            bytes: open_snap.total_bytes,
            root_hex: open_snap.root_hex_if_nonempty(),
        },
    );

    let deadline = Instant::now() + Duration::from_millis(config.window_ms);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        if config.jitter {
            let data = cpu_jitter_bytes(config.jitter_samples);
            summary.jitter_batches += 1;
            summary.jitter_bytes += data.len();
            summary.jitter_samples_total += config.jitter_samples;
            store.add(draw_id, data);
            progress(store, draw_id, sink, "SRV");
        }

        sink.emit(
            draw_id,
            &DrawEvent::CollectTick {
                remaining_ms: remaining.as_millis() as u64,
                bytes: store.total_bytes(draw_id),
            },
        );

        tokio::time::sleep(remaining.min(Duration::from_secs(1))).await;
    }

    let close_snap = store.snapshot(draw_id);
    sink.emit(
        draw_id,
        &DrawEvent::CollectClose {
            bytes: close_snap.total_bytes,
            root_hex: close_snap.root_hex_if_nonempty(),
        },
    );
    sink.emit(
        draw_id,
        &DrawEvent::CollectSummary {
            bytes: close_snap.total_bytes,
            root_hex: close_snap.root_hex_if_nonempty(),
            urandom_bytes: summary.urandom_bytes,
            jitter_batches: summary.jitter_batches,
            jitter_bytes: summary.jitter_bytes,
            jitter_samples_total: summary.jitter_samples_total,
        },
    );

    if config.require_local {
        let required = config.min_local_bytes.max(1);
        let actual = close_snap.total_bytes;
        if actual < required {
            let err = BeaconError::InsufficientEntropy { actual, required };
            sink.emit(
                draw_id,
                &DrawEvent::Error {
                    stage: "collect".into(),
                    message: err.to_string(),
                },
            );
            return Err(err);
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;

    fn quick_config() -> CollectConfig {
        CollectConfig {
            window_ms: 40,
            jitter: true,
            jitter_samples: 64,
            urandom_bytes: 32,
            require_local: false,
            min_local_bytes: 0,
        }
    }

    #[tokio::test]
    async fn test_zero_window_is_a_noop() {
        let store = EntropyStore::new();
        let sink = MemorySink::default();
        let summary = collect_local_entropy(
            &store,
            "d",
            &CollectConfig {
                window_ms: 0,
                ..quick_config()
            },
            &sink,
        )
        .await
        .unwrap();
        assert_eq!(summary.jitter_batches, 0);
        assert_eq!(store.total_bytes("d"), 0);
        assert!(sink.kinds("d").is_empty());
    }

    #[tokio::test]
    async fn test_window_accumulates_and_emits() {
        let store = EntropyStore::new();
        let sink = MemorySink::default();
        let summary = collect_local_entropy(&store, "d", &quick_config(), &sink)
            .await
            .unwrap();

        assert_eq!(summary.urandom_bytes, 32);
        assert!(summary.jitter_batches >= 1);
        assert_eq!(
            store.total_bytes("d"),
            summary.urandom_bytes + summary.jitter_bytes
        );

        let types = sink.kinds("d");
        assert_eq!(types.first().copied(), Some("loc.progress"));
        assert!(types.contains(&"collect.open"));
        assert!(types.contains(&"collect.tick"));
        // Close-out pair ends the stream, in order.
        assert_eq!(&types[types.len() - 2..], &["collect.close", "collect.summary"]);
    }

    #[tokio::test]
    async fn test_strict_floor_fails_after_close_out() {
        let store = EntropyStore::new();
        let sink = MemorySink::default();
        let config = CollectConfig {
            jitter: false,
            urandom_bytes: 8,
            require_local: true,
            min_local_bytes: 1_000_000,
            ..quick_config()
        };
        let err = collect_local_entropy(&store, "d", &config, &sink)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BeaconError::InsufficientEntropy {
                actual: 8,
                required: 1_000_000
            }
        ));

        let types = sink.kinds("d");
        let close = types.iter().position(|t| *t == "collect.close").unwrap();
        let summary = types.iter().position(|t| *t == "collect.summary").unwrap();
        let error = types.iter().position(|t| *t == "error").unwrap();
        assert!(close < summary && summary < error);
    }

    #[tokio::test]
    async fn test_strict_floor_met_passes() {
        let store = EntropyStore::new();
        let sink = MemorySink::default();
        let config = CollectConfig {
            require_local: true,
            min_local_bytes: 16,
            ..quick_config()
        };
        assert!(
            collect_local_entropy(&store, "d", &config, &sink)
                .await
                .is_ok()
        );
    }
}
