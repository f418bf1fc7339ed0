//! Fixed-capacity scratch arena for secret temporaries.
//!
//! A [`Workspace`] borrows a caller-provided word buffer. Each operation
//! carves the named temporaries it needs out of that buffer with a bump
//! allocator, checks the total against the capacity exactly once, and fails
//! closed before touching any secret data if the buffer is too small. Secret
//! intermediate values are parked in their slots between steps, and the
//! whole buffer is wiped when the workspace is dropped.

use num_bigint::BigUint;
use subtle::Choice;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{Error, Result};
use crate::{EXPONENT_BLIND_BITS, MAX_FACTOR_BITS, RAND_FACTOR_BITS};

/// Bits per scratch word.
const WORD_BITS: usize = 32;

/// Size, in factor-word units, of [`PrivateLayout`].
const PRIVATE_LAYOUT_UNITS: usize = 4 * 2 + 5;

/// Size, in factor-word units, of [`RekeyLayout`].
const REKEY_LAYOUT_UNITS: usize = 6 * 2;

const MAX_LAYOUT_UNITS: usize = if PRIVATE_LAYOUT_UNITS > REKEY_LAYOUT_UNITS {
    PRIVATE_LAYOUT_UNITS
} else {
    REKEY_LAYOUT_UNITS
};

/// Largest masked factor any layout accepts.
const MAX_MASKED_FACTOR_BITS: usize = MAX_FACTOR_BITS + RAND_FACTOR_BITS;

/// Capacity, in 32-bit words, of a scratch buffer large enough for every
/// key whose factors have at most [`MAX_FACTOR_BITS`] bits.
pub const SCRATCH_WORDS: usize = MAX_LAYOUT_UNITS * factor_words(MAX_MASKED_FACTOR_BITS);

/// Scratch buffer of the full supported size.
pub type ScratchBuf = [u32; SCRATCH_WORDS];

/// Number of words for one masked-factor-sized temporary, rounded up to an
/// even count. Leaves room for the exponent blinding carried on top of a
/// masked factor.
pub(crate) const fn factor_words(masked_factor_bits: usize) -> usize {
    let bits = masked_factor_bits + EXPONENT_BLIND_BITS + 2;
    let words = (bits + WORD_BITS - 1) / WORD_BITS;
    words + (words & 1)
}

/// Named sub-range of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    offset: usize,
    len: usize,
}

impl Slot {
    fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Rejects masked factors above the compile-time maximum, whatever the
/// capacity of the buffer.
fn check_factor_bits(masked_factor_bits: usize) -> Result<()> {
    if masked_factor_bits > MAX_MASKED_FACTOR_BITS {
        tracing::debug!(
            masked_factor_bits,
            max = MAX_MASKED_FACTOR_BITS,
            "masked factor exceeds supported size"
        );
        return Err(Error::KeyTooLarge);
    }
    Ok(())
}

/// Bump allocator handing out consecutive slots.
struct Carver {
    next: usize,
}

impl Carver {
    fn new() -> Self {
        Carver { next: 0 }
    }

    fn take(&mut self, len: usize) -> Slot {
        let slot = Slot {
            offset: self.next,
            len,
        };
        self.next += len;
        slot
    }

    fn finish(self, capacity: usize) -> Result<()> {
        if self.next > capacity {
            tracing::debug!(
                required = self.next,
                capacity,
                "scratch workspace too small"
            );
            return Err(Error::WorkspaceTooSmall {
                required: self.next,
                capacity,
            });
        }
        Ok(())
    }
}

/// Temporaries used by the blinded CRT private operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PrivateLayout {
    /// Modulus.
    pub n: Slot,
    /// Blinded input, `rho^e * x mod n`.
    pub c: Slot,
    /// Input blinding factor `rho`, inverted once the result is recombined.
    pub rho: Slot,
    /// CRT recombination result.
    pub s: Slot,
    /// Per-operation blinded exponent for the p half.
    pub dp: Slot,
    /// Per-operation blinded exponent for the q half.
    pub dq: Slot,
    /// Result modulo the masked p.
    pub s1: Slot,
    /// Result modulo the masked q.
    pub s2: Slot,
    /// `h = (s1 - s2) * iq mod p`.
    pub h: Slot,
}

impl PrivateLayout {
    /// `masked_factor_bits` is the larger bit length of the two masked factors.
    pub fn new(masked_factor_bits: usize, capacity: usize) -> Result<Self> {
        check_factor_bits(masked_factor_bits)?;
        let fwlen = factor_words(masked_factor_bits);
        let mut carver = Carver::new();
        let layout = PrivateLayout {
            n: carver.take(2 * fwlen),
            c: carver.take(2 * fwlen),
            rho: carver.take(2 * fwlen),
            s: carver.take(2 * fwlen),
            dp: carver.take(fwlen),
            dq: carver.take(fwlen),
            s1: carver.take(fwlen),
            s2: carver.take(fwlen),
            h: carver.take(fwlen),
        };
        carver.finish(capacity)?;
        Ok(layout)
    }
}

/// Temporaries used by key-state initialization and rotation. Each slot holds
/// two factor widths.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RekeyLayout {
    /// Inverse of the outgoing first mask modulo n.
    pub r1_inv: Slot,
    /// Inverse of the outgoing second mask modulo n.
    pub r2_inv: Slot,
    /// Transition multiplier for the current factor.
    pub t1: Slot,
    /// Modulus.
    pub modulus: Slot,
    /// Re-masked totient.
    pub t3: Slot,
    /// Transiently unmasked exponent.
    pub t4: Slot,
}

impl RekeyLayout {
    /// `masked_factor_bits` is the larger bit length of the two masked factors.
    pub fn new(masked_factor_bits: usize, capacity: usize) -> Result<Self> {
        check_factor_bits(masked_factor_bits)?;
        let width = 2 * factor_words(masked_factor_bits);
        let mut carver = Carver::new();
        let layout = RekeyLayout {
            r1_inv: carver.take(width),
            r2_inv: carver.take(width),
            t1: carver.take(width),
            modulus: carver.take(width),
            t3: carver.take(width),
            t4: carver.take(width),
        };
        carver.finish(capacity)?;
        Ok(layout)
    }
}

/// Scratch arena over a caller-provided word buffer.
///
/// ```
/// use rsa_masked_crt::{ScratchBuf, Workspace, SCRATCH_WORDS};
///
/// let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
/// let ws = Workspace::new(&mut buf);
/// assert_eq!(ws.capacity(), SCRATCH_WORDS);
/// ```
pub struct Workspace<'a> {
    words: &'a mut [u32],
}

impl<'a> Workspace<'a> {
    /// Wraps `words` as a scratch arena.
    pub fn new(words: &'a mut [u32]) -> Self {
        Workspace { words }
    }

    /// Capacity in 32-bit words.
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Writes `value` into `slot`, little-endian word order, zero-filling the
    /// remainder. Returns a false choice and leaves the slot untouched if the
    /// value does not fit.
    pub(crate) fn store(&mut self, slot: Slot, value: &BigUint) -> Choice {
        if value.bits() > slot.len * WORD_BITS {
            return Choice::from(0);
        }

        let bytes = Zeroizing::new(value.to_bytes_le());
        let dst = &mut self.words[slot.range()];
        dst.zeroize();
        for (word, chunk) in dst.iter_mut().zip(bytes.chunks(4)) {
            let mut le = [0u8; 4];
            le[..chunk.len()].copy_from_slice(chunk);
            *word = u32::from_le_bytes(le);
            le.zeroize();
        }
        Choice::from(1)
    }

    /// Reads the value parked in `slot`.
    pub(crate) fn load(&self, slot: Slot) -> Zeroizing<BigUint> {
        let mut bytes = Zeroizing::new(alloc::vec::Vec::with_capacity(slot.len * 4));
        for word in &self.words[slot.range()] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        Zeroizing::new(BigUint::from_bytes_le(&bytes))
    }

    /// Wipes the whole arena.
    pub fn clear(&mut self) {
        self.words.zeroize();
    }
}

impl Drop for Workspace<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{One, Zero};

    #[test]
    fn test_full_buffer_fits_max_factor() {
        let masked = MAX_FACTOR_BITS + RAND_FACTOR_BITS;
        assert!(PrivateLayout::new(masked, SCRATCH_WORDS).is_ok());
        assert!(RekeyLayout::new(masked, SCRATCH_WORDS).is_ok());
    }

    #[test]
    fn test_scratch_words_matches_largest_layout() {
        let masked = MAX_MASKED_FACTOR_BITS;
        let fwlen = factor_words(masked);

        let private = PrivateLayout::new(masked, SCRATCH_WORDS).unwrap();
        assert_eq!(private.h.offset + private.h.len, PRIVATE_LAYOUT_UNITS * fwlen);
        let rekey = RekeyLayout::new(masked, SCRATCH_WORDS).unwrap();
        assert_eq!(rekey.t4.offset + rekey.t4.len, REKEY_LAYOUT_UNITS * fwlen);

        match PrivateLayout::new(masked, SCRATCH_WORDS - 1) {
            Err(Error::WorkspaceTooSmall { required, capacity }) => {
                assert_eq!(required, SCRATCH_WORDS);
                assert_eq!(capacity, SCRATCH_WORDS - 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_factor_rejected() {
        // 2176-bit factors, with room to spare in the buffer
        for masked in [MAX_MASKED_FACTOR_BITS + 1, 2176 + RAND_FACTOR_BITS] {
            assert_eq!(
                PrivateLayout::new(masked, 2 * SCRATCH_WORDS).unwrap_err(),
                Error::KeyTooLarge
            );
            assert_eq!(
                RekeyLayout::new(masked, usize::MAX).unwrap_err(),
                Error::KeyTooLarge
            );
        }
    }

    #[test]
    fn test_slots_do_not_overlap() {
        let l = PrivateLayout::new(320, SCRATCH_WORDS).unwrap();
        let slots = [l.n, l.c, l.rho, l.s, l.dp, l.dq, l.s1, l.s2, l.h];
        for (i, a) in slots.iter().enumerate() {
            for b in slots.iter().skip(i + 1) {
                assert!(a.offset + a.len <= b.offset);
            }
        }
        assert_eq!(factor_words(320) % 2, 0);
    }

    #[test]
    fn test_store_load() {
        let mut buf = [0u32; 16];
        let mut ws = Workspace::new(&mut buf);
        let a = Slot { offset: 0, len: 4 };
        let b = Slot { offset: 4, len: 4 };

        let v = (BigUint::one() << 127usize) + BigUint::from(0x1234_5678u32);
        assert!(bool::from(ws.store(a, &v)));
        assert!(bool::from(ws.store(b, &BigUint::zero())));
        assert_eq!(*ws.load(a), v);
        assert!(ws.load(b).is_zero());

        let too_wide = BigUint::one() << 128usize;
        assert!(!bool::from(ws.store(b, &too_wide)));
        assert!(ws.load(b).is_zero());
    }

    #[test]
    fn test_dropped_workspace_is_wiped() {
        let mut buf = [0u32; 8];
        {
            let mut ws = Workspace::new(&mut buf);
            let slot = Slot { offset: 2, len: 2 };
            assert!(bool::from(ws.store(slot, &BigUint::from(0xdead_beefu32))));
        }
        assert_eq!(buf, [0u32; 8]);
    }
}
