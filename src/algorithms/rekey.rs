//! Initialization and rotation of the masked key state.

use core::cmp::max;

use num_bigint::BigUint;
use num_traits::One;
use rand_core::CryptoRngCore;
use subtle::Choice;
use zeroize::Zeroizing;

use super::mask::{
    blind_exponent, derive_mask, generate_mask, make_rand_coprime, modular_inverse, reblind,
};
use crate::domain_rng::{Domain, DomainRng};
use crate::errors::{Error, Result};
use crate::key::RsaCrtKey;
use crate::masked_key::MaskedKeyState;
use crate::traits::{CrtKeyParts, PublicKeyParts};
use crate::workspace::{RekeyLayout, Slot, Workspace};
use crate::RAND_FACTOR_BITS;

/// Derives the masked representation of `key`.
///
/// Draws odd masks `r1`, `r2` (with `r2` invertible modulo `r1`) from a
/// [`Domain::Rekeying`] stream seeded from `rng`. Fails with
/// [`Error::WorkspaceTooSmall`] before touching secret data if `ws` cannot
/// hold the temporaries, and with [`Error::Rekey`] if the masked CRT
/// coefficient does not exist (even or shared factors).
pub fn init_key<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    key: &RsaCrtKey,
    ws: &mut Workspace<'_>,
) -> Result<MaskedKeyState> {
    let layout = RekeyLayout::new(masked_bits_of(key), ws.capacity())?;
    let mut rng = DomainRng::new(rng, Domain::Rekeying);

    let (state, ok) = derive_masked(&mut rng, key, ws, &layout);
    ws.clear();

    if !bool::from(ok) {
        tracing::debug!(n_bits = key.n_bits(), "masked key derivation failed");
        return Err(Error::Rekey);
    }
    Ok(state)
}

/// Replaces the masks of `state` with fresh ones.
///
/// Every masked component is moved from the old masks to the new ones
/// without unmasking the factors: `p' * (r1^-1 * r1_new) mod n` is exactly
/// `p * r1_new`, since `p * r1_new < n`. The exponents are re-derived from
/// the rotated totients and the CRT coefficient is recomputed from the new
/// masked factors.
///
/// The new state is assembled separately and swapped in only once every
/// step has succeeded; on error `state` is left as it was.
pub fn update_key<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    state: &mut MaskedKeyState,
    ws: &mut Workspace<'_>,
) -> Result<()> {
    let layout = RekeyLayout::new(state.masked_factor_bits(), ws.capacity())?;
    let mut rng = DomainRng::new(rng, Domain::Rekeying);

    let (next, ok) = rotate_masks(&mut rng, state, ws, &layout);
    ws.clear();

    if !bool::from(ok) {
        tracing::debug!(n_bits = state.n.bits(), "masked key rotation failed");
        return Err(Error::Rekey);
    }
    *state = next;
    Ok(())
}

/// Upper bound on the masked factor size of `key`.
pub(crate) fn masked_bits_of(key: &RsaCrtKey) -> usize {
    max(key.p().bits(), key.q().bits()) + RAND_FACTOR_BITS
}

/// Builds a masked state from `key`. The returned choice is false if any
/// step failed, in which case the state must be discarded.
pub(crate) fn derive_masked<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    key: &RsaCrtKey,
    ws: &mut Workspace<'_>,
    layout: &RekeyLayout,
) -> (MaskedKeyState, Choice) {
    let r1 = generate_mask(rng, RAND_FACTOR_BITS);
    let r2 = make_rand_coprime(rng, RAND_FACTOR_BITS, &r1);

    let mut ok = ws.store(layout.modulus, key.n());

    // p - 1 is parked in t4
    ok &= ws.store(layout.t4, &Zeroizing::new(key.p() - BigUint::one()));
    let phi_p = Zeroizing::new(&*ws.load(layout.t4) * &r1);
    let p = Zeroizing::new(key.p() * &r1);

    ok &= ws.store(layout.t4, &Zeroizing::new(key.q() - BigUint::one()));
    let phi_q = Zeroizing::new(&*ws.load(layout.t4) * &r2);
    let q = Zeroizing::new(key.q() * &r2);

    let (iq, inv_ok) = masked_crt_coefficient(&p, &q);
    ok &= inv_ok;

    let dp = blind_exponent(key.dp(), &phi_p, &BigUint::one());
    let dq = blind_exponent(key.dq(), &phi_q, &BigUint::one());

    let state = MaskedKeyState {
        n: (*ws.load(layout.modulus)).clone(),
        e: key.e().clone(),
        factor_bits: max(key.p().bits(), key.q().bits()),
        r1,
        r2,
        p: (*p).clone(),
        q: (*q).clone(),
        phi_p: (*phi_p).clone(),
        phi_q: (*phi_q).clone(),
        dp: (*dp).clone(),
        dq: (*dq).clone(),
        iq: (*iq).clone(),
    };
    (state, ok)
}

/// Builds the rotated successor of `state`.
fn rotate_masks<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    state: &MaskedKeyState,
    ws: &mut Workspace<'_>,
    layout: &RekeyLayout,
) -> (MaskedKeyState, Choice) {
    let mut ok = ws.store(layout.modulus, &state.n);

    let (r1_inv, inv_ok) = modular_inverse(&state.r1, &state.n);
    ok &= inv_ok & ws.store(layout.r1_inv, &r1_inv);
    let (r2_inv, inv_ok) = modular_inverse(&state.r2, &state.n);
    ok &= inv_ok & ws.store(layout.r2_inv, &r2_inv);

    let r1 = generate_mask(rng, RAND_FACTOR_BITS);
    let r2 = make_rand_coprime(rng, RAND_FACTOR_BITS, &r1);

    let p_half = remask_half(
        ws,
        layout,
        RemaskInput {
            old_inv: layout.r1_inv,
            new_mask: &r1,
            factor: &state.p,
            phi: &state.phi_p,
            exponent: &state.dp,
        },
    );
    let q_half = remask_half(
        ws,
        layout,
        RemaskInput {
            old_inv: layout.r2_inv,
            new_mask: &r2,
            factor: &state.q,
            phi: &state.phi_q,
            exponent: &state.dq,
        },
    );
    ok &= p_half.ok & q_half.ok;

    let (iq, inv_ok) = masked_crt_coefficient(&p_half.factor, &q_half.factor);
    ok &= inv_ok;

    let next = MaskedKeyState {
        n: state.n.clone(),
        e: state.e.clone(),
        factor_bits: state.factor_bits,
        r1,
        r2,
        p: (*p_half.factor).clone(),
        q: (*q_half.factor).clone(),
        phi_p: (*p_half.phi).clone(),
        phi_q: (*q_half.phi).clone(),
        dp: (*p_half.exponent).clone(),
        dq: (*q_half.exponent).clone(),
        iq: (*iq).clone(),
    };
    (next, ok)
}

struct RemaskInput<'a> {
    old_inv: Slot,
    new_mask: &'a BigUint,
    factor: &'a BigUint,
    phi: &'a BigUint,
    exponent: &'a BigUint,
}

struct RemaskedHalf {
    factor: Zeroizing<BigUint>,
    phi: Zeroizing<BigUint>,
    exponent: Zeroizing<BigUint>,
    ok: Choice,
}

/// Moves one CRT half (masked factor, totient and exponent) from its old
/// mask to `new_mask`.
fn remask_half(
    ws: &mut Workspace<'_>,
    layout: &RekeyLayout,
    input: RemaskInput<'_>,
) -> RemaskedHalf {
    let modulus = ws.load(layout.modulus);

    let multiplier = derive_mask(&modulus, &ws.load(input.old_inv), input.new_mask);
    let mut ok = ws.store(layout.t1, &multiplier);

    let factor = reblind(input.factor, &modulus, &ws.load(layout.t1));
    let phi = reblind(input.phi, &modulus, &ws.load(layout.t1));
    ok &= ws.store(layout.t3, &phi);

    // exponent' - phi' is the bare CRT exponent, parked in t4
    ok &= ws.store(layout.t4, &Zeroizing::new(input.exponent - input.phi));
    let exponent = blind_exponent(&ws.load(layout.t4), &ws.load(layout.t3), &BigUint::one());

    RemaskedHalf {
        factor,
        phi,
        exponent,
        ok,
    }
}

/// Computes `(q' mod p')^-1 mod p'`.
fn masked_crt_coefficient(p: &BigUint, q: &BigUint) -> (Zeroizing<BigUint>, Choice) {
    modular_inverse(q, p)
}
