//! Masked in-memory representation of an RSA-CRT private key.

use core::fmt;

use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithms::rekey;
use crate::errors::Result;
use crate::key::RsaCrtKey;
use crate::traits::PublicKeyParts;
use crate::workspace::Workspace;
use crate::RAND_FACTOR_BITS;

/// RSA-CRT private key held under two secret multiplicative masks.
///
/// With masks `r1`, `r2` the state stores
///
/// - `p' = p * r1`, `q' = q * r2`
/// - `phi_p' = (p - 1) * r1`, `phi_q' = (q - 1) * r2`
/// - `dp' = dp + phi_p'`, `dq' = dq + phi_q'`
/// - `iq' = q'^-1 mod p'`
///
/// `r1` and `r2` are odd, at most [`RAND_FACTOR_BITS`] bits, and `r2` is
/// invertible modulo `r1`, which makes `q'` invertible modulo `p'`.
/// Exponentiating modulo `p'` by `dp'` and reducing modulo `p` gives the
/// same result as exponentiating modulo `p` by `dp`, so the CRT
/// recombination in the masked domain reproduces the unmasked result modulo
/// `n`.
///
/// The state is never persisted. It is replaced as a whole on every
/// rotation, so holders of `&MaskedKeyState` never observe a partially
/// rotated key; `&mut` access serializes rotation against private
/// operations.
pub struct MaskedKeyState {
    /// Modulus (public)
    pub(crate) n: BigUint,
    /// Public exponent
    pub(crate) e: BigUint,
    /// Largest bit length of the unmasked factors (public)
    pub(crate) factor_bits: usize,
    /// Mask of the p half
    pub(crate) r1: BigUint,
    /// Mask of the q half
    pub(crate) r2: BigUint,
    /// p * r1
    pub(crate) p: BigUint,
    /// q * r2
    pub(crate) q: BigUint,
    /// (p - 1) * r1
    pub(crate) phi_p: BigUint,
    /// (q - 1) * r2
    pub(crate) phi_q: BigUint,
    /// dp + phi_p'
    pub(crate) dp: BigUint,
    /// dq + phi_q'
    pub(crate) dq: BigUint,
    /// (q * r2)^-1 mod (p * r1)
    pub(crate) iq: BigUint,
}

impl MaskedKeyState {
    /// Derives a freshly masked state from `key`. See [`init_key`](crate::init_key).
    pub fn new<R: CryptoRngCore + ?Sized>(
        rng: &mut R,
        key: &RsaCrtKey,
        ws: &mut Workspace<'_>,
    ) -> Result<Self> {
        rekey::init_key(rng, key, ws)
    }

    /// Replaces the masks with fresh ones. See [`update_key`](crate::update_key).
    pub fn rotate<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        ws: &mut Workspace<'_>,
    ) -> Result<()> {
        rekey::update_key(rng, self, ws)
    }

    /// Upper bound on the bit length of any masked factor this key can hold.
    pub(crate) fn masked_factor_bits(&self) -> usize {
        self.factor_bits + RAND_FACTOR_BITS
    }
}

impl PublicKeyParts for MaskedKeyState {
    fn n(&self) -> &BigUint {
        &self.n
    }

    fn e(&self) -> &BigUint {
        &self.e
    }
}

impl fmt::Debug for MaskedKeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskedKeyState")
            .field("n", &self.n)
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

impl Zeroize for MaskedKeyState {
    fn zeroize(&mut self) {
        self.r1.zeroize();
        self.r2.zeroize();
        self.p.zeroize();
        self.q.zeroize();
        self.phi_p.zeroize();
        self.phi_q.zeroize();
        self.dp.zeroize();
        self.dq.zeroize();
        self.iq.zeroize();
    }
}

impl Drop for MaskedKeyState {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for MaskedKeyState {}
