//! Special handling for converting the BigUint to u8 vectors

use alloc::vec::Vec;
use num_bigint::BigUint;
use subtle::Choice;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{Error, Result};

/// Returns a new vector of the given length, with 0s left padded.
#[inline]
pub(crate) fn left_pad(input: &[u8], padded_len: usize) -> Result<Vec<u8>> {
    if input.len() > padded_len {
        return Err(Error::InvalidLength);
    }

    let mut out = vec![0u8; padded_len];
    out[padded_len - input.len()..].copy_from_slice(input);
    Ok(out)
}

/// Encodes `input` big-endian into all of `out`, with 0s left padded.
///
/// Returns a false choice and leaves `out` zeroed if the value is longer
/// than `out`.
#[inline]
pub(crate) fn uint_to_be_pad_into(input: &BigUint, out: &mut [u8]) -> Choice {
    let bytes = Zeroizing::new(input.to_bytes_be());
    out.zeroize();
    if bytes.len() > out.len() {
        return Choice::from(0);
    }

    let offset = out.len() - bytes.len();
    out[offset..].copy_from_slice(&bytes);
    Choice::from(1)
}
