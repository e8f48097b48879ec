//! Deterministic stream expansion from a 32-byte seed.
//!
//! Keyed BLAKE3 in counter mode: one 32-byte block per little-endian u64
//! counter value. The same block sequence backs every consumer — the 64-bit
//! extraction, the u64 stream behind range sampling, and the bit-stream
//! download formats — so a trace can be replayed from the seed alone.

use crate::error::{BeaconError, Result};
use crate::hashing::SUBSEED_PREFIX;

/// Bytes per counter block.
pub const BLOCK_LEN: usize = 32;

/// Stream bytes produced per chunk by the chunked generators. A multiple of
/// [`BLOCK_LEN`], so chunk boundaries never split a counter block.
pub const CHUNK_LEN: usize = 65_536;

/// Parse a hex-encoded 32-byte seed, rejecting malformed input before any
/// derivation work.
pub fn parse_seed_hex(seed_hex: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(seed_hex)
        .map_err(|_| BeaconError::InvalidInput("seed_hex must be hex".into()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| BeaconError::InvalidInput(format!("seed must be 32 bytes, got {len}")))
}

fn block(key: &[u8; 32], counter: u64) -> [u8; 32] {
    *blake3::keyed_hash(key, &counter.to_le_bytes()).as_bytes()
}

/// Expand a seed into `n_bytes` of deterministic stream output.
pub fn expand(seed: &[u8; 32], n_bytes: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(n_bytes + BLOCK_LEN);
    let mut stream = BlockStream::new(seed);
    while out.len() < n_bytes {
        out.extend_from_slice(&stream.next_block());
    }
    out.truncate(n_bytes);
    out
}

/// First 8 bytes of the expansion, interpreted as a big-endian u64.
pub fn first_u64(seed: &[u8; 32]) -> u64 {
    let first = block(seed, 0);
    let mut be = [0u8; 8];
    be.copy_from_slice(&first[..8]);
    u64::from_be_bytes(be)
}

/// Derive an independent 32-byte sub-seed for an auxiliary stream.
///
/// Keyed BLAKE3 of `"SUB|" ‖ label` under the parent seed — auxiliary
/// streams (range sampling, test downloads) can never be correlated with
/// the primary result stream.
pub fn sub_seed(seed: &[u8; 32], label: &str) -> [u8; 32] {
    let mut h = blake3::Hasher::new_keyed(seed);
    h.update(SUBSEED_PREFIX);
    h.update(label.as_bytes());
    *h.finalize().as_bytes()
}

// ---------------------------------------------------------------------------
// Lazy block / u64 streams
// ---------------------------------------------------------------------------

/// Logically infinite 32-byte block stream keyed by a seed.
pub struct BlockStream {
    key: [u8; 32],
    counter: u64,
}

impl BlockStream {
    pub fn new(seed: &[u8; 32]) -> Self {
        Self {
            key: *seed,
            counter: 0,
        }
    }

    pub fn next_block(&mut self) -> [u8; 32] {
        let out = block(&self.key, self.counter);
        self.counter += 1;
        out
    }
}

impl Iterator for BlockStream {
    type Item = [u8; 32];

    fn next(&mut self) -> Option<[u8; 32]> {
        Some(self.next_block())
    }
}

/// u64 draws for rejection sampling: the first 8 bytes of each successive
/// block, big-endian.
pub struct U64Stream {
    blocks: BlockStream,
}

impl U64Stream {
    pub fn new(seed: &[u8; 32]) -> Self {
        Self {
            blocks: BlockStream::new(seed),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let b = self.blocks.next_block();
        let mut be = [0u8; 8];
        be.copy_from_slice(&b[..8]);
        u64::from_be_bytes(be)
    }
}

// ---------------------------------------------------------------------------
// Bit-stream formatting
// ---------------------------------------------------------------------------

/// Output format for bit-stream generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitFormat {
    /// ASCII `'0'`/`'1'`, most-significant bit first per byte; optionally
    /// one bit per line.
    Ascii { newline: bool },
    /// Raw bytes; the final partial byte's unused low-order bits are forced
    /// to zero so the logical bit count matches exactly.
    Binary,
}

/// Chunked generator over the formatted bit stream of a seed.
///
/// Yields at most [`CHUNK_LEN`] stream bytes' worth of output per step, so
/// unbounded-size requests never materialize in memory.
pub struct BitChunks {
    blocks: BlockStream,
    format: BitFormat,
    total_bits: u64,
    bits_emitted: u64,
    raw_emitted: u64,
}

impl BitChunks {
    pub fn new(seed: &[u8; 32], total_bits: u64, format: BitFormat) -> Self {
        Self {
            blocks: BlockStream::new(seed),
            format,
            total_bits,
            bits_emitted: 0,
            raw_emitted: 0,
        }
    }

    fn total_raw_bytes(&self) -> u64 {
        self.total_bits.div_ceil(8)
    }

    fn next_raw(&mut self) -> Vec<u8> {
        let remaining = self.total_raw_bytes() - self.raw_emitted;
        let need = remaining.min(CHUNK_LEN as u64) as usize;
        let mut raw = Vec::with_capacity(need + BLOCK_LEN);
        while raw.len() < need {
            raw.extend_from_slice(&self.blocks.next_block());
        }
        raw.truncate(need);
        self.raw_emitted += need as u64;
        raw
    }
}

impl Iterator for BitChunks {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        match self.format {
            BitFormat::Binary => {
                if self.raw_emitted >= self.total_raw_bytes() {
                    return None;
                }
                let mut raw = self.next_raw();
                let rem = (self.total_bits % 8) as u32;
                if rem != 0 && self.raw_emitted == self.total_raw_bytes() {
                    if let Some(last) = raw.last_mut() {
                        *last &= (0xFFu16 << (8 - rem)) as u8;
                    }
                }
                Some(raw)
            }
            BitFormat::Ascii { newline } => {
                if self.bits_emitted >= self.total_bits {
                    return None;
                }
                let raw = self.next_raw();
                let take = (self.total_bits - self.bits_emitted).min(raw.len() as u64 * 8);
                let mut out =
                    Vec::with_capacity(take as usize * if newline { 2 } else { 1 });
                'bytes: for byte in raw {
                    for shift in (0..8).rev() {
                        if self.bits_emitted >= self.total_bits {
                            break 'bytes;
                        }
                        out.push(b'0' + ((byte >> shift) & 1));
                        if newline {
                            out.push(b'\n');
                        }
                        self.bits_emitted += 1;
                    }
                }
                Some(out)
            }
        }
    }
}

/// Collect a full formatted bit stream into memory. Intended for modest
/// sizes and tests; streaming callers iterate [`BitChunks`] directly.
pub fn bits_to_vec(seed: &[u8; 32], total_bits: u64, format: BitFormat) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in BitChunks::new(seed, total_bits, format) {
        out.extend_from_slice(&chunk);
    }
    out
}
