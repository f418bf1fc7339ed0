use core::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{Error, Result};
use crate::traits::{CrtKeyParts, PublicKeyParts};
use crate::{MAX_FACTOR_BITS, MAX_RSA_BITS, RAND_FACTOR_BITS};

/// Two-prime RSA private key in Chinese remainder theorem form.
///
/// This is the immutable input from which a
/// [`MaskedKeyState`](crate::MaskedKeyState) is derived. Beyond rejecting
/// zero factors, factors too small to be masked and keys above
/// [`MAX_RSA_BITS`] or [`MAX_FACTOR_BITS`], no validation of the
/// components is performed: an even factor is accepted here and makes every
/// private operation report failure.
#[derive(Clone)]
pub struct RsaCrtKey {
    /// Modulus, `p * q`
    n: BigUint,
    /// Public exponent
    e: BigUint,
    /// First prime factor
    p: BigUint,
    /// Second prime factor
    q: BigUint,
    /// D mod (P-1)
    dp: BigUint,
    /// D mod (Q-1)
    dq: BigUint,
    /// Q^-1 mod P
    iq: BigUint,
}

impl RsaCrtKey {
    /// Constructs a key from its CRT components. The modulus is computed as
    /// `p * q`.
    pub fn from_components(
        e: BigUint,
        p: BigUint,
        q: BigUint,
        dp: BigUint,
        dq: BigUint,
        iq: BigUint,
    ) -> Result<RsaCrtKey> {
        if p.is_zero() || q.is_zero() {
            return Err(Error::InvalidPrime);
        }

        // Rotation re-masks p and q modulo n, which is only exact while the
        // masks stay below the opposite factor.
        if p.bits() <= RAND_FACTOR_BITS || q.bits() <= RAND_FACTOR_BITS {
            return Err(Error::FactorTooSmall);
        }

        if p.bits() > MAX_FACTOR_BITS || q.bits() > MAX_FACTOR_BITS {
            return Err(Error::KeyTooLarge);
        }

        let n = &p * &q;
        if n.bits() > MAX_RSA_BITS {
            return Err(Error::KeyTooLarge);
        }

        Ok(RsaCrtKey {
            n,
            e,
            p,
            q,
            dp,
            dq,
            iq,
        })
    }

    /// Constructs a key from big-endian encoded components.
    ///
    /// Leading zero bytes are ignored; factor byte lengths are not treated
    /// as secret.
    pub fn from_be_bytes(
        e: &[u8],
        p: &[u8],
        q: &[u8],
        dp: &[u8],
        dq: &[u8],
        iq: &[u8],
    ) -> Result<RsaCrtKey> {
        Self::from_components(
            BigUint::from_bytes_be(e),
            BigUint::from_bytes_be(p),
            BigUint::from_bytes_be(q),
            BigUint::from_bytes_be(dp),
            BigUint::from_bytes_be(dq),
            BigUint::from_bytes_be(iq),
        )
    }

    /// Returns the bit length of the modulus.
    pub fn n_bits(&self) -> usize {
        self.n.bits()
    }
}

impl PublicKeyParts for RsaCrtKey {
    fn n(&self) -> &BigUint {
        &self.n
    }

    fn e(&self) -> &BigUint {
        &self.e
    }
}

impl CrtKeyParts for RsaCrtKey {
    fn p(&self) -> &BigUint {
        &self.p
    }

    fn q(&self) -> &BigUint {
        &self.q
    }

    fn dp(&self) -> &BigUint {
        &self.dp
    }

    fn dq(&self) -> &BigUint {
        &self.dq
    }

    fn iq(&self) -> &BigUint {
        &self.iq
    }
}

impl fmt::Debug for RsaCrtKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaCrtKey")
            .field("n", &self.n)
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

impl Zeroize for RsaCrtKey {
    fn zeroize(&mut self) {
        self.p.zeroize();
        self.q.zeroize();
        self.dp.zeroize();
        self.dq.zeroize();
        self.iq.zeroize();
    }
}

impl Drop for RsaCrtKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for RsaCrtKey {}
