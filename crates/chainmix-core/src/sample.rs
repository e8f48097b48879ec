//! Unbiased integer sampling over an inclusive range via rejection sampling.
//!
//! Threshold math: for range size R, t = floor(2^64 / R) * R. Draws at or
//! above t are rejected, so accepted draws are uniform over [0, t) and
//! `x mod R` carries no modulo bias. Rejection probability is below R/2^64.

use serde::{Serialize, Serializer};

use crate::error::{BeaconError, Result};
use crate::expand::{U64Stream, sub_seed};

const TWO64: u128 = 1 << 64;

/// Default sub-seed label for range sampling.
pub const RANGE_LABEL: &str = "RANGE/v1";

fn u128_as_string<S: Serializer>(v: &u128, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(v)
}

fn u64_as_string<S: Serializer>(v: &u64, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(v)
}

/// Accepted value plus full provenance of the sampling run.
///
/// `threshold` and `xUsed` serialize as decimal strings — they routinely
/// exceed the 2^53 integer precision of JSON consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResult {
    pub value: i128,
    pub lo: i128,
    pub hi: i128,
    pub range_size: u128,
    pub attempts: u64,
    pub rejected: u64,
    pub label: String,
    pub subseed_hex: String,
    #[serde(serialize_with = "u128_as_string")]
    pub threshold: u128,
    #[serde(rename = "xUsed", serialize_with = "u64_as_string")]
    pub x_used: u64,
}

/// Sample one integer uniformly from the inclusive range spanned by `n1`
/// and `n2` (order-independent), using the expansion stream keyed by
/// `sub_seed(seed, label)`.
pub fn sample_range(seed: &[u8; 32], n1: i128, n2: i128, label: &str) -> Result<SampleResult> {
    let (lo, hi) = if n1 <= n2 { (n1, n2) } else { (n2, n1) };
    let range_size = match hi.checked_sub(lo) {
        Some(span) => span as u128 + 1,
        None => return Err(BeaconError::InvalidRange("range size too large (>2^64)".into())),
    };
    if range_size > TWO64 {
        return Err(BeaconError::InvalidRange("range size too large (>2^64)".into()));
    }

    let subseed = sub_seed(seed, label);
    let threshold = (TWO64 / range_size) * range_size;

    let mut stream = U64Stream::new(&subseed);
    let mut attempts = 0u64;
    let mut rejected = 0u64;
    loop {
        attempts += 1;
        let x = stream.next_u64();
        if (x as u128) < threshold {
            let value = lo + ((x as u128) % range_size) as i128;
            return Ok(SampleResult {
                value,
                lo,
                hi,
                range_size,
                attempts,
                rejected,
                label: label.to_string(),
                subseed_hex: hex::encode(subseed),
                threshold,
                x_used: x,
            });
        }
        rejected += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::first_u64;

    const SEED: [u8; 32] = [7u8; 32];

    #[test]
    fn test_bounds_are_normalized() {
        let a = sample_range(&SEED, 10, -3, "t").unwrap();
        let b = sample_range(&SEED, -3, 10, "t").unwrap();
        assert_eq!(a.lo, -3);
        assert_eq!(a.hi, 10);
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn test_value_is_lo_plus_accepted_mod_r() {
        let r = sample_range(&SEED, 100, 355, "t").unwrap();
        assert_eq!(r.range_size, 256);
        assert_eq!(r.value, r.lo + (r.x_used as u128 % r.range_size) as i128);
        assert!((r.lo..=r.hi).contains(&r.value));
    }

    #[test]
    fn test_single_element_range_never_rejects() {
        let r = sample_range(&SEED, 42, 42, "t").unwrap();
        assert_eq!(r.value, 42);
        assert_eq!(r.attempts, 1);
        assert_eq!(r.rejected, 0);
        assert_eq!(r.threshold, TWO64);
    }

    #[test]
    fn test_full_u64_range_never_rejects() {
        let r = sample_range(&SEED, 0, u64::MAX as i128, "t").unwrap();
        assert_eq!(r.range_size, TWO64);
        assert_eq!(r.threshold, TWO64);
        assert_eq!(r.attempts, 1);
        assert_eq!(r.rejected, 0);
        // With R = 2^64 the accepted draw maps through unchanged.
        assert_eq!(r.value, r.x_used as i128);
    }

    #[test]
    fn test_oversized_range_rejected() {
        let err = sample_range(&SEED, 0, TWO64 as i128, "t").unwrap_err();
        assert!(matches!(err, BeaconError::InvalidRange(_)));
        let err = sample_range(&SEED, i128::MIN, i128::MAX, "t").unwrap_err();
        assert!(matches!(err, BeaconError::InvalidRange(_)));
    }

    #[test]
    fn test_deterministic_per_seed_and_label() {
        let a = sample_range(&SEED, 1, 1_000_000, "lottery").unwrap();
        let b = sample_range(&SEED, 1, 1_000_000, "lottery").unwrap();
        assert_eq!(a.value, b.value);
        assert_eq!(a.attempts, b.attempts);

        let c = sample_range(&SEED, 1, 1_000_000, "other").unwrap();
        assert_ne!(a.subseed_hex, c.subseed_hex);
    }

    #[test]
    fn test_sampler_stream_is_separated_from_primary() {
        // The sampler must not consume the primary result stream.
        let r = sample_range(&SEED, 0, u64::MAX as i128, "t").unwrap();
        assert_ne!(r.x_used, first_u64(&SEED));
    }

    #[test]
    fn test_attempts_account_for_rejections() {
        // A range size near 2/3 of 2^64 leaves a large rejection region;
        // whatever happens, the bookkeeping must add up.
        let r = sample_range(&SEED, 0, ((TWO64 / 3) * 2) as i128, "t").unwrap();
        assert_eq!(r.attempts, r.rejected + 1);
        assert!((r.x_used as u128) < r.threshold);
    }

    #[test]
    fn test_uniformity_over_small_range() {
        // 3 does not divide 2^64, so naive mod would be biased. Frequency
        // per outcome should approximate 1/3 across many labels.
        let n = 3000;
        let mut counts = [0u32; 3];
        for i in 0..n {
            let r = sample_range(&SEED, 0, 2, &format!("trial-{i}")).unwrap();
            counts[r.value as usize] += 1;
        }
        // Expected 1000 per bucket; 5 sigma is about 130.
        for c in counts {
            assert!((870..=1130).contains(&c), "bucket count {c} out of tolerance");
        }
    }
}
