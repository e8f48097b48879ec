//! # chainmix-core
//!
//! **A randomness beacon you can replay.**
//!
//! `chainmix-core` derives unbiased random values by mixing public
//! blockchain entropy (recent finalized Solana block hashes) with locally
//! collected entropy (timer jitter, OS randomness, user-submitted bytes),
//! then expands the resulting seed into consumable outputs — 64-bit
//! integers, arbitrary-length bit streams, uniformly sampled integer
//! ranges — while emitting a full trace of every intermediate value.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use chainmix_core::{
//!     BeaconPipeline, CollectConfig, DrawRequest, EntropyStore, HttpSlotRpc,
//!     MemorySink, ScanConfig,
//! };
//!
//! # async fn run(history: Arc<dyn chainmix_core::DrawStore>) -> chainmix_core::Result<()> {
//! let rpc = Arc::new(HttpSlotRpc::new("https://api.mainnet-beta.solana.com"));
//! let sink = Arc::new(MemorySink::default());
//! let pipeline = BeaconPipeline::new(
//!     rpc,
//!     ScanConfig::default(),
//!     EntropyStore::new(),
//!     sink.clone(),
//!     history,
//! );
//!
//! let record = pipeline
//!     .run_draw(&DrawRequest {
//!         draw_id: "demo".into(),
//!         blocks: 3,
//!         collect: CollectConfig::default(),
//!     })
//!     .await?;
//! println!("{} -> {}", record.draw_id, record.result.value_u64);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Scanner → EntropyStore → SeedDeriver → StreamExpander → RangeSampler
//!
//! - Scanning walks the chain tip backward with bounded concurrency,
//!   skipping unusable slots; the beacon is the hash bytes concatenated in
//!   discovery order.
//! - Every mix input is a tagged BLAKE3 hash; HKDF-SHA256 binds the seed to
//!   the draw id. Identical inputs always reproduce identical output.
//! - Trust comes from transparency: the emitted trace contains every
//!   derivation input and output in hex, so anyone can replay the draw.

pub mod beacon;
pub mod collect;
pub mod derive;
pub mod error;
pub mod events;
pub mod expand;
pub mod hashing;
pub mod pipeline;
pub mod pool;
pub mod record;
pub mod sample;
pub mod sources;

pub use beacon::{BeaconScanner, BlockRecord, HttpSlotRpc, ScanConfig, ScanOutcome, SlotRpc};
pub use collect::{CollectConfig, CollectSummary, collect_local_entropy};
pub use derive::{SourceSet, derive_seed};
pub use error::{BeaconError, Result};
pub use events::{DrawEvent, EventSink, MemorySink, NullSink};
pub use expand::{
    BitChunks, BitFormat, BlockStream, U64Stream, bits_to_vec, expand, first_u64, parse_seed_hex,
    sub_seed,
};
pub use hashing::{commitment_root, domain_hash, draw_salt};
pub use pipeline::{BeaconPipeline, DrawRequest};
pub use pool::{EntropyStore, PoolSnapshot};
pub use record::{
    ChainSource, CompareReport, DrawRecord, DrawStore, DrawSummary, EntropyRecord, MixReport,
    ResultRecord, SourcesRecord, TraceReport, U01,
};
pub use sample::{RANGE_LABEL, SampleResult, sample_range};
pub use sources::{cpu_jitter_bytes, os_random_bytes};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
