//! Masking primitives.
//!
//! Small operations over the big-integer substrate from which key-state
//! initialization, rotation and the blinded private operation are built.
//! Values that carry secrets are returned as [`Zeroizing`].

use num_bigint::{BigUint, IntoBigUint, ModInverse, RandBigInt};
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use subtle::Choice;
use zeroize::Zeroizing;

/// Draws a uniformly random integer of at most `bits` bits.
pub(crate) fn generate_random<R: CryptoRngCore + ?Sized>(rng: &mut R, bits: usize) -> BigUint {
    rng.gen_biguint(bits)
}

/// Draws a random odd mask of at most `bits` bits.
pub(crate) fn generate_mask<R: CryptoRngCore + ?Sized>(rng: &mut R, bits: usize) -> BigUint {
    rng.gen_biguint(bits) | BigUint::one()
}

/// Draws a uniformly random integer in `[0, bound)`. `bound` must be nonzero.
pub(crate) fn generate_below<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    bound: &BigUint,
) -> Zeroizing<BigUint> {
    Zeroizing::new(rng.gen_biguint_below(bound))
}

/// Computes `src^-1 mod modulus`.
///
/// The returned choice is false, and the value zero, if `src` is not
/// invertible; callers fold the choice into their success flag or redraw.
/// A zero residue does not take a separate path: one is inverted in its
/// place and the result is discarded through the choice.
pub(crate) fn modular_inverse(src: &BigUint, modulus: &BigUint) -> (Zeroizing<BigUint>, Choice) {
    // the modulus is public
    if modulus.is_zero() {
        return (Zeroizing::new(BigUint::zero()), Choice::from(0));
    }

    let reduced = Zeroizing::new(src % modulus);
    let zero = Choice::from(u8::from(reduced.is_zero()));
    let candidate = Zeroizing::new(&*reduced + BigUint::from(zero.unwrap_u8()));

    let (inv, found) = match (*candidate)
        .clone()
        .mod_inverse(modulus)
        .and_then(|inv| inv.into_biguint())
    {
        Some(inv) => (Zeroizing::new(inv % modulus), Choice::from(1)),
        None => (Zeroizing::new(BigUint::zero()), Choice::from(0)),
    };

    let ok = !zero & found;
    (Zeroizing::new(&*inv * BigUint::from(ok.unwrap_u8())), ok)
}

/// Computes `old_mask_inverse * new_mask mod modulus`: the multiplier that
/// turns a value masked by the old mask into one masked by the new mask.
pub(crate) fn derive_mask(
    modulus: &BigUint,
    old_mask_inverse: &BigUint,
    new_mask: &BigUint,
) -> Zeroizing<BigUint> {
    Zeroizing::new((old_mask_inverse * new_mask) % modulus)
}

/// Computes `value * multiplier mod modulus`.
pub(crate) fn reblind(
    value: &BigUint,
    modulus: &BigUint,
    multiplier: &BigUint,
) -> Zeroizing<BigUint> {
    Zeroizing::new((value * multiplier) % modulus)
}

/// Computes `exponent + multiplier * phi`.
///
/// When `phi` is a multiple of the group order the result is congruent to
/// `exponent`, but its bit pattern no longer depends on it alone.
pub(crate) fn blind_exponent(
    exponent: &BigUint,
    phi: &BigUint,
    multiplier: &BigUint,
) -> Zeroizing<BigUint> {
    Zeroizing::new(exponent + multiplier * phi)
}

/// Draws odd masks of at most `bits` bits until one is invertible modulo
/// `other`.
pub(crate) fn make_rand_coprime<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    bits: usize,
    other: &BigUint,
) -> BigUint {
    let mut attempts = 1u32;
    loop {
        let candidate = generate_mask(rng, bits);
        if other.is_one() {
            return candidate;
        }

        let (_, invertible) = modular_inverse(&candidate, other);
        if bool::from(invertible) {
            return candidate;
        }

        tracing::trace!(attempts, "mask not coprime, redrawing");
        attempts = attempts.saturating_add(1);
    }
}
