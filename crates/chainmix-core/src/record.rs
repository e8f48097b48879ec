//! Persisted draw snapshots and the persistence collaborator contract.
//!
//! Field names are the wire contract shared with live subscribers and the
//! history API. 64-bit (and wider) numbers serialize as decimal strings —
//! JSON consumers lose precision past 2^53.

use serde::{Deserialize, Serialize};

use crate::beacon::BlockRecord;
use crate::error::Result;

const TWO64: u128 = 1 << 64;
const DECIMAL18_SCALE: u128 = 1_000_000_000_000_000_000;

/// `number / 2^64` as an exact fraction plus an 18-digit decimal rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct U01 {
    pub fraction: Fraction,
    pub decimal18: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fraction {
    pub num: String,
    pub den: String,
}

impl U01 {
    pub fn from_u64(number: u64) -> Self {
        Self {
            fraction: Fraction {
                num: number.to_string(),
                den: TWO64.to_string(),
            },
            decimal18: decimal18(number),
        }
    }
}

/// Render `number / 2^64` with 18 fractional digits, round-half-even.
fn decimal18(number: u64) -> String {
    let product = number as u128 * DECIMAL18_SCALE;
    let mut q = product >> 64;
    let rem = product & (u64::MAX as u128);
    let half = 1u128 << 63;
    if rem > half || (rem == half && q & 1 == 1) {
        q += 1;
    }
    format!("{}.{:018}", q / DECIMAL18_SCALE, q % DECIMAL18_SCALE)
}

/// Seed, stream prefix, and extracted number for one derivation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MixReport {
    pub seed_hex: String,
    /// First 16 bytes of the 64-byte expansion, hex.
    pub stream_first16_hex: String,
    #[serde(rename = "u64")]
    pub value_u64: String,
    pub u01: U01,
}

impl MixReport {
    pub fn new(seed: &[u8; 32], stream: &[u8], number: u64) -> Self {
        Self {
            seed_hex: hex::encode(seed),
            stream_first16_hex: hex::encode(&stream[..16]),
            value_u64: number.to_string(),
            u01: U01::from_u64(number),
        }
    }
}

/// The with-vs-without-local-entropy comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompareReport {
    #[serde(rename = "pub")]
    pub pub_only: MixReport,
    pub pub_loc: MixReport,
}

/// Hex of every derivation input and output, enough to replay the draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TraceReport {
    pub beacon_hex: String,
    pub pub_component_hex: String,
    pub hkdf_salt_hex: String,
    pub seed_hex: String,
    pub stream_first16_hex: String,
    #[serde(rename = "u64")]
    pub value_u64: String,
    pub u01: U01,
}

// ---------------------------------------------------------------------------
// Draw record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSource {
    pub blocks: Vec<BlockRecord>,
    pub beacon_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesRecord {
    #[serde(rename = "SOL")]
    pub sol: ChainSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntropyRecord {
    pub loc_root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub seed_hex: String,
    #[serde(rename = "u64")]
    pub value_u64: String,
}

/// Immutable aggregate produced once per successful draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRecord {
    pub draw_id: String,
    /// Unix milliseconds.
    pub created_at: u64,
    pub sources: SourcesRecord,
    /// Which tagged inputs entered the mix, e.g. `["PUB"]` or
    /// `["PUB", "LOC"]`.
    pub inputs: Vec<String>,
    pub entropy: EntropyRecord,
    pub compare: CompareReport,
    pub trace: TraceReport,
    pub result: ResultRecord,
}

impl DrawRecord {
    pub fn summary(&self) -> DrawSummary {
        DrawSummary {
            draw_id: self.draw_id.clone(),
            created_at: Some(self.created_at),
            sources: vec!["SOL".to_string()],
            number_u64: Some(self.result.value_u64.clone()),
        }
    }
}

/// Listing row for reverse-chronological history pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawSummary {
    pub draw_id: String,
    pub created_at: Option<u64>,
    pub sources: Vec<String>,
    pub number_u64: Option<String>,
}

/// Persistence collaborator. Writes must be atomic — no partially written
/// record may ever be observable, and a reused draw id overwrites (last
/// write wins).
pub trait DrawStore: Send + Sync {
    fn save(&self, record: &DrawRecord) -> Result<()>;
    fn load(&self, draw_id: &str) -> Result<Option<DrawRecord>>;
    /// Reverse-chronological page of summaries.
    fn list(&self, limit: usize, offset: usize) -> Result<Vec<DrawSummary>>;
}
