//! Polynomial rolling hash over wire sequences.
//!
//! Wire vectors are content-addressed by this hash. Member `i` of a
//! vector carries weight `B^i`, so a rebuild can repair the hash of a
//! vector after a single-member edit in O(1) instead of rehashing the
//! whole vector.

use std::sync::Mutex;

/// Hash modulus, a 31-bit prime.
pub const M: i64 = 1_000_000_007;
/// Polynomial base.
pub const B: i64 = 257;

lazy_static::lazy_static! {
    /// Lazily grown table of `B^i mod M`, shared process-wide.
    static ref POWERS: Mutex<Vec<i64>> = Mutex::new(vec![1, B]);
}

/// `B^i mod M`, growing the shared table on demand.
fn power(i: usize) -> i64 {
    let mut powers = POWERS.lock().unwrap();
    while powers.len() <= i {
        let last = *powers.last().unwrap();
        powers.push(last * B % M);
    }
    powers[i]
}

/// Hash a wire sequence: `h = sum of xs[i] * B^i mod M`.
///
/// Inputs are reduced to non-negative residues first, so the don't-care
/// sentinel (-1) and arbitrarily large ids hash without overflow.
pub fn hash(xs: impl IntoIterator<Item = i64>) -> i64 {
    let mut h = 0i64;
    for (i, x) in xs.into_iter().enumerate() {
        h = (h + x.rem_euclid(M) * power(i)) % M;
    }
    h
}

/// Repair a hash after the member at `idx` changed from `old_x` to
/// `new_x`.
///
/// The subtraction must stay on non-negative residues: signed `%`
/// would hand back a negative hash here.
pub fn update(old_h: i64, idx: usize, old_x: i64, new_x: i64) -> i64 {
    let p = power(idx);
    let h = (old_h - old_x.rem_euclid(M) * p).rem_euclid(M);
    (h + new_x.rem_euclid(M) * p) % M
}
