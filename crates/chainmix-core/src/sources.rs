//! Local entropy sources: timer jitter and one-shot OS randomness.
//!
//! **Raw output characteristics:** LSBs of successive high-resolution timer
//! deltas. A weak, environment-dependent source — it supplements the public
//! beacon and OS randomness in the mix, it never carries a
//! cryptographic-strength claim on its own.

use std::time::Instant;

/// Collect `samples` low-order bytes of tight-loop timer deltas.
///
/// Each sample is the LSB of the nanosecond delta between consecutive
/// `Instant` reads; the raw delta bytes go into the transcript as-is.
pub fn cpu_jitter_bytes(samples: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples);
    let mut last = Instant::now();
    for _ in 0..samples {
        let now = Instant::now();
        let delta = now.duration_since(last).as_nanos() as u64;
        out.push(delta as u8);
        last = now;
    }
    out
}

/// One-shot OS randomness via the `getrandom` crate.
///
/// # Panics
/// Panics if the OS CSPRNG fails — this indicates a fatal platform issue.
pub fn os_random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    getrandom::fill(&mut buf).expect("OS CSPRNG failed");
    buf
}
