//! Draw orchestration: scanner → pool → deriver → expander, one sequential
//! flow per draw id.
//!
//! Independent draw ids run fully concurrently; the entropy store is the
//! only shared mutable state and it never cross-blocks distinct ids. Every
//! fatal failure emits a stage-tagged error event and aborts the draw
//! before anything is persisted. There is no retry here — retry policy
//! belongs to whoever calls [`BeaconPipeline::run_draw`].

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::beacon::{BeaconScanner, ScanConfig, ScanOutcome, SlotRpc};
use crate::collect::{CollectConfig, collect_local_entropy};
use crate::derive::{SourceSet, derive_seed};
use crate::error::{BeaconError, Result};
use crate::events::{DrawEvent, EventSink};
use crate::expand::{expand, first_u64};
use crate::hashing::draw_salt;
use crate::pool::EntropyStore;
use crate::record::{
    ChainSource, CompareReport, DrawRecord, DrawStore, EntropyRecord, MixReport, ResultRecord,
    SourcesRecord, TraceReport, U01,
};

/// One pipeline invocation.
#[derive(Debug, Clone)]
pub struct DrawRequest {
    /// Caller-supplied identifier; reuse overwrites the stored record.
    pub draw_id: String,
    /// How many finalized blocks to ask the scanner for.
    pub blocks: usize,
    pub collect: CollectConfig,
}

/// The wired-up randomness pipeline.
pub struct BeaconPipeline {
    scanner: BeaconScanner<dyn SlotRpc>,
    entropy: EntropyStore,
    sink: Arc<dyn EventSink>,
    history: Arc<dyn DrawStore>,
}

impl BeaconPipeline {
    pub fn new(
        rpc: Arc<dyn SlotRpc>,
        scan: ScanConfig,
        entropy: EntropyStore,
        sink: Arc<dyn EventSink>,
        history: Arc<dyn DrawStore>,
    ) -> Self {
        Self {
            scanner: BeaconScanner::new(rpc, scan),
            entropy,
            sink,
            history,
        }
    }

    /// Handle to the entropy store, for user-submitted packets and
    /// eviction runs.
    pub fn entropy(&self) -> &EntropyStore {
        &self.entropy
    }

    fn emit(&self, draw_id: &str, event: DrawEvent) {
        self.sink.emit(draw_id, &event);
    }

    fn fail(&self, draw_id: &str, stage: &str, err: BeaconError) -> BeaconError {
        self.emit(
            draw_id,
            DrawEvent::Error {
                stage: stage.to_string(),
                message: err.to_string(),
            },
        );
        err
    }

    /// Run one complete draw. On success the record has been persisted and
    /// the full event sequence emitted; on failure nothing is persisted.
    pub async fn run_draw(&self, request: &DrawRequest) -> Result<DrawRecord> {
        let draw_id = request.draw_id.as_str();
        self.entropy.clear(draw_id);

        self.emit(
            draw_id,
            DrawEvent::Commit {
                blocks: request.blocks,
                source: "SOLANA".to_string(),
            },
        );
        self.emit(
            draw_id,
            DrawEvent::BlockWaiting {
                note: format!(
                    "Fetching last {} finalized Solana blocks",
                    request.blocks
                ),
            },
        );

        let scan = match self.scanner.scan(request.blocks).await {
            Ok(scan) => scan,
            Err(e) => return Err(self.fail(draw_id, "solana", e)),
        };
        let beacon_hex = hex::encode(&scan.beacon);
        self.emit(
            draw_id,
            DrawEvent::BlockFinalizedAll {
                explorers: scan.blocks.clone(),
                beacon_hex: beacon_hex.clone(),
            },
        );

        // Emits its own stage-tagged error on a strict-floor failure.
        collect_local_entropy(&self.entropy, draw_id, &request.collect, self.sink.as_ref())
            .await?;

        let mixed = self.mix(draw_id, &scan, &beacon_hex)?;

        let record = DrawRecord {
            draw_id: draw_id.to_string(),
            created_at: unix_millis(),
            sources: SourcesRecord {
                sol: ChainSource {
                    blocks: scan.blocks,
                    beacon_hex,
                },
            },
            inputs: mixed.inputs,
            entropy: EntropyRecord {
                loc_root: mixed.loc_root_hex,
            },
            compare: mixed.compare,
            trace: mixed.trace,
            result: ResultRecord {
                seed_hex: mixed.seed_hex,
                value_u64: mixed.number,
            },
        };
        if let Err(e) = self.history.save(&record) {
            return Err(self.fail(draw_id, "store", e));
        }
        Ok(record)
    }

    fn mix(&self, draw_id: &str, scan: &ScanOutcome, beacon_hex: &str) -> Result<Mixed> {
        let mut inputs = vec!["PUB".to_string()];
        let mut sources = SourceSet::new();
        let pub_component = sources.insert_raw("PUB", &scan.beacon);

        let loc_root = self.entropy.root_if_nonempty(draw_id);
        if let Some(root) = &loc_root {
            sources.insert_raw("LOC", root);
            inputs.push("LOC".to_string());
        }
        self.emit(
            draw_id,
            DrawEvent::MixStart {
                inputs: inputs.clone(),
            },
        );

        let seed = match derive_seed(draw_id, &sources) {
            Ok(seed) => seed,
            Err(e) => return Err(self.fail(draw_id, "mix", e)),
        };
        let stream = expand(&seed, 64);
        let number = first_u64(&seed);

        // The comparison leg: what the beacon alone would have produced.
        let mut pub_only = SourceSet::new();
        pub_only.insert_raw("PUB", &scan.beacon);
        let pub_seed = match derive_seed(draw_id, &pub_only) {
            Ok(seed) => seed,
            Err(e) => return Err(self.fail(draw_id, "mix", e)),
        };
        let pub_stream = expand(&pub_seed, 64);
        let pub_number = first_u64(&pub_seed);

        let compare = CompareReport {
            pub_only: MixReport::new(&pub_seed, &pub_stream, pub_number),
            pub_loc: MixReport::new(&seed, &stream, number),
        };
        self.emit(
            draw_id,
            DrawEvent::MixCompare {
                compare: compare.clone(),
            },
        );

        let trace = TraceReport {
            beacon_hex: beacon_hex.to_string(),
            pub_component_hex: hex::encode(pub_component),
            hkdf_salt_hex: hex::encode(draw_salt(draw_id)),
            seed_hex: hex::encode(seed),
            stream_first16_hex: hex::encode(&stream[..16]),
            value_u64: number.to_string(),
            u01: U01::from_u64(number),
        };
        self.emit(draw_id, DrawEvent::MixTrace { trace: trace.clone() });

        self.emit(
            draw_id,
            DrawEvent::Completed {
                seed_hex: hex::encode(seed),
                number: number.to_string(),
            },
        );

        Ok(Mixed {
            inputs,
            loc_root_hex: loc_root.map(hex::encode),
            compare,
            trace,
            seed_hex: hex::encode(seed),
            number: number.to_string(),
        })
    }
}

struct Mixed {
    inputs: Vec<String>,
    loc_root_hex: Option<String>,
    compare: CompareReport,
    trace: TraceReport,
    seed_hex: String,
    number: String,
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
