//! Constant-time helpers over big-endian byte strings.

use subtle::{Choice, ConstantTimeEq};

/// Returns a true choice iff `x < n`, both big-endian and of equal length.
///
/// Computes the final borrow of `x - n` with a carry chain over every byte,
/// least significant first, without branching on the data.
pub(crate) fn ct_lt_be(x: &[u8], n: &[u8]) -> Choice {
    debug_assert_eq!(x.len(), n.len());

    let mut borrow = 0u32;
    for (&wx, &wn) in x.iter().rev().zip(n.iter().rev()) {
        let wx = u32::from(wx);
        let wn = u32::from(wn);
        borrow = (wx.wrapping_sub(wn + borrow) >> 8) & 1;
    }
    Choice::from(borrow as u8)
}

/// Returns a true choice iff both byte strings are equal.
pub(crate) fn ct_eq_be(a: &[u8], b: &[u8]) -> Choice {
    a.ct_eq(b)
}
