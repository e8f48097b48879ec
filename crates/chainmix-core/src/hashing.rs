//! Tag-prefixed BLAKE3 hashing — the domain-separation primitive.
//!
//! Every byte string that enters the mix is hashed under a short ASCII tag
//! first, so semantically distinct inputs can never collide or be forged as
//! each other. The fixed protocol constants below are part of the wire
//! contract: changing any of them changes every downstream seed.

/// Prefix of the per-draw HKDF salt: `BLAKE3("CM|" ‖ draw_id)`.
pub const SALT_PREFIX: &[u8] = b"CM|";

/// HKDF info/context constant for seed derivation.
pub const SEED_INFO: &[u8] = b"CM|seed";

/// Prefix of the sub-seed label under keyed BLAKE3.
pub const SUBSEED_PREFIX: &[u8] = b"SUB|";

/// `BLAKE3(tag ‖ data)` — the tagged hash behind every mix component.
pub fn domain_hash(tag: &[u8], data: &[u8]) -> [u8; 32] {
    let mut h = blake3::Hasher::new();
    h.update(tag);
    h.update(data);
    *h.finalize().as_bytes()
}

/// Per-draw HKDF salt, binding a seed to its draw id.
pub fn draw_salt(draw_id: &str) -> [u8; 32] {
    domain_hash(SALT_PREFIX, draw_id.as_bytes())
}

/// Hash an ordered sequence of entropy packets through one hash instance.
///
/// Defined (and stable) for zero packets too — callers that need "was any
/// entropy actually collected" must check byte totals separately.
pub fn commitment_root<'a, I>(packets: I) -> [u8; 32]
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut h = blake3::Hasher::new();
    for p in packets {
        h.update(p);
    }
    *h.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_hash_separates_tags() {
        let a = domain_hash(b"PUB", b"payload");
        let b = domain_hash(b"LOC", b"payload");
        assert_ne!(a, b);
    }

    #[test]
    fn test_domain_hash_is_concatenation() {
        // Tag-then-update must equal hashing the concatenation.
        let direct = *blake3::hash(b"PUBpayload").as_bytes();
        assert_eq!(domain_hash(b"PUB", b"payload"), direct);
    }

    #[test]
    fn test_commitment_root_order_sensitive() {
        let ab = commitment_root([b"aa".as_slice(), b"bb".as_slice()]);
        let ba = commitment_root([b"bb".as_slice(), b"aa".as_slice()]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_commitment_root_defined_for_empty() {
        let empty = commitment_root(std::iter::empty::<&[u8]>());
        assert_eq!(empty, *blake3::hash(b"").as_bytes());
    }

    #[test]
    fn test_draw_salt_binds_draw_id() {
        assert_ne!(draw_salt("draw-1"), draw_salt("draw-2"));
        assert_eq!(draw_salt("draw-1"), draw_salt("draw-1"));
    }
}
