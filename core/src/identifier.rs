//! `m`-bit modular identifier algebra, grounded on `tools/tool.go`.
//!
//! Identifiers live in `[0, 2^m)`. `m` is capped at 63 so every operation
//! stays inside ordinary `u64` arithmetic — no bignum, no global identifier
//! width. Every node carries its own `m` and passes it explicitly to these
//! free functions rather than reading it from ambient state.

use sha1::{Digest, Sha1};

/// A point on the identifier ring.
pub type Identifier = u64;

pub const MAX_M: u32 = 63;

/// `2^m`, saturating at `u64::MAX` for `m >= 64` (never hit given [`MAX_M`]).
pub fn two_pow_m(m: u32) -> u64 {
    if m >= 64 {
        u64::MAX
    } else {
        1u64 << m
    }
}

/// Mask selecting the low `m` bits.
pub fn mask(m: u32) -> u64 {
    two_pow_m(m).wrapping_sub(1)
}

/// Adds `delta` to `id`, wrapping modulo `2^m`.
pub fn add_mod(id: Identifier, delta: u64, m: u32) -> Identifier {
    (id.wrapping_add(delta)) & mask(m)
}

/// `SHA-1(name)`, truncated to the low 64 bits and masked to `m` bits.
/// Mirrors `tools.GenerateIdentifier`'s "hash then truncate to the
/// configured width" behavior, adapted to a fixed 64-bit identifier.
pub fn generate_identifier(name: &str, m: u32) -> Identifier {
    let mut hasher = Sha1::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[digest.len() - 8..]);
    u64::from_be_bytes(buf) & mask(m)
}

/// Ordinary (non-wrapping) interval membership test over `[a, b]`-ish
/// ranges, honoring the requested endpoint closures. Requires `a <= b`;
/// callers needing wraparound semantics use [`mod_interval_check`].
pub fn in_interval(x: Identifier, a: Identifier, b: Identifier, left_closed: bool, right_closed: bool) -> bool {
    let lower_ok = if left_closed { x >= a } else { x > a };
    let upper_ok = if right_closed { x <= b } else { x < b };
    lower_ok && upper_ok
}

/// Modular interval membership on the `m`-bit ring. When `a < b` this is an
/// ordinary interval check. When `a >= b` the interval wraps around zero:
/// `[a, 2^m) ∪ [0, b]`, where the virtual boundary at `2^m` is *always*
/// open regardless of `right_closed` (that flag governs only the boundary
/// at `b` on the zero side), and the boundary at `0` is always closed on
/// its low side. Any deviation here breaks the ring.
pub fn mod_interval_check(
    x: Identifier,
    a: Identifier,
    b: Identifier,
    left_closed: bool,
    right_closed: bool,
    m: u32,
) -> bool {
    if a < b {
        in_interval(x, a, b, left_closed, right_closed)
    } else {
        let top = two_pow_m(m);
        in_interval(x, a, top, left_closed, false) || in_interval(x, 0, b, true, right_closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_interval_closures() {
        assert!(in_interval(5, 1, 10, true, true));
        assert!(!in_interval(1, 1, 10, false, true));
        assert!(in_interval(1, 1, 10, true, true));
        assert!(!in_interval(10, 1, 10, true, false));
        assert!(in_interval(10, 1, 10, true, true));
    }

    #[test]
    fn wraparound_mod_boundary_always_open() {
        // m = 4 -> ring of 16. a=14, b=2: wraps through 15/0/1.
        let m = 4;
        // 15 is inside [14, 16) ordinarily, but the 2^m boundary is open,
        // so 16 itself (out of range anyway) would never qualify; 15 does.
        assert!(mod_interval_check(15, 14, 2, true, true, m));
        assert!(mod_interval_check(0, 14, 2, true, true, m));
        assert!(mod_interval_check(1, 14, 2, true, true, m));
        assert!(mod_interval_check(2, 14, 2, true, true, m));
        assert!(!mod_interval_check(2, 14, 2, true, false, m));
        assert!(!mod_interval_check(5, 14, 2, true, true, m));
    }

    #[test]
    fn equal_endpoints_cover_whole_ring_per_closure() {
        let m = 4;
        // a == b falls into the wraparound branch (a < b is false).
        for x in 0..two_pow_m(m) {
            assert!(mod_interval_check(x, 7, 7, true, true, m), "x={x}");
        }
        // Left-open/right-open at a==b excludes only the point itself.
        assert!(!mod_interval_check(7, 7, 7, false, false, m));
        assert!(mod_interval_check(6, 7, 7, false, false, m));
        assert!(mod_interval_check(8, 7, 7, false, false, m));
    }

    #[test]
    fn generate_identifier_is_deterministic_and_masked() {
        let m = 10;
        let a = generate_identifier("file-a", m);
        let b = generate_identifier("file-a", m);
        assert_eq!(a, b);
        assert!(a < two_pow_m(m));
    }

    #[test]
    fn single_bit_ring_wraps_correctly() {
        // m=1: ring of {0,1}. Chord's two-node boundary case.
        let m = 1;
        assert!(mod_interval_check(0, 1, 0, true, true, m));
        assert!(mod_interval_check(1, 1, 0, true, true, m));
    }
}
