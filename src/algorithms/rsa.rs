//! Blinded RSA-CRT private operation over a masked key state.

use num_bigint::BigUint;
use num_integer::Integer;
use rand_core::CryptoRngCore;
use subtle::Choice;
use zeroize::Zeroizing;

use super::ct::{ct_eq_be, ct_lt_be};
use super::mask::{blind_exponent, generate_below, generate_random, modular_inverse};
use super::pad::uint_to_be_pad_into;
use super::rekey::{derive_masked, masked_bits_of, update_key};
use crate::domain_rng::{Domain, DomainRng};
use crate::errors::Result;
use crate::key::RsaCrtKey;
use crate::masked_key::MaskedKeyState;
use crate::traits::PublicKeyParts;
use crate::workspace::{PrivateLayout, RekeyLayout, Workspace};
use crate::EXPONENT_BLIND_BITS;

/// ⚠️ Raw RSA encryption of m with the public key. No padding is performed.
///
/// # ☢️️ WARNING: HAZARDOUS API ☢️
///
/// Use this function with great care! Raw RSA should never be used without an appropriate padding
/// or signature scheme. See the [module-level documentation][crate::hazmat] for more information.
#[inline]
pub fn rsa_encrypt<K: PublicKeyParts>(key: &K, m: &BigUint) -> Result<BigUint> {
    Ok(m.modpow(key.e(), key.n()))
}

/// Raw RSA-CRT private operation on `x`, in place, against the unmasked `key`.
///
/// A masked key state is derived for this call only (see
/// [`init_key`](crate::init_key)) and discarded afterwards; the input and the
/// CRT exponents are blinded on top of it.
///
/// `x` must be exactly [`size`](PublicKeyParts::size) bytes long, big-endian.
/// The returned choice is true only if every step succeeded. When it is false
/// the contents of `x` are unspecified and must not be used. A workspace too
/// small for the key fails before `x` is touched.
pub fn private_mod_rand<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    key: &RsaCrtKey,
    x: &mut [u8],
    ws: &mut Workspace<'_>,
) -> Choice {
    let masked_bits = masked_bits_of(key);
    let layout = match RekeyLayout::new(masked_bits, ws.capacity()) {
        Ok(layout) => layout,
        Err(_) => return Choice::from(0),
    };
    if PrivateLayout::new(masked_bits, ws.capacity()).is_err() {
        return Choice::from(0);
    }

    let (state, ok) = {
        let mut rekey_rng = DomainRng::new(rng, Domain::Rekeying);
        derive_masked(&mut rekey_rng, key, ws, &layout)
    };
    ws.clear();

    ok & private_masked(rng, &state, x, ws)
}

/// Raw RSA-CRT private operation on `x`, in place, against a masked key
/// state.
///
/// `state` is rotated once (see [`update_key`](crate::update_key)) before it
/// is used, so two calls never run against the same masks. Flag and buffer
/// semantics are those of [`private_mod_rand`].
pub fn private_mod_prerand<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    state: &mut MaskedKeyState,
    x: &mut [u8],
    ws: &mut Workspace<'_>,
) -> Choice {
    let rotated = Choice::from(u8::from(update_key(rng, state, ws).is_ok()));
    rotated & private_masked(rng, state, x, ws)
}

/// [`private_mod_rand`] followed by a fault check.
///
/// In order to defend against errors in the CRT computation, `m^e mod n` is
/// recomputed from the result and compared with the input in constant time.
pub fn private_mod_rand_and_check<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    key: &RsaCrtKey,
    x: &mut [u8],
    ws: &mut Workspace<'_>,
) -> Choice {
    let input = Zeroizing::new(x.to_vec());
    let ok = private_mod_rand(rng, key, x, ws);
    ok & fault_check(key, &input, x)
}

/// [`private_mod_prerand`] followed by the fault check of
/// [`private_mod_rand_and_check`].
pub fn private_mod_prerand_and_check<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    state: &mut MaskedKeyState,
    x: &mut [u8],
    ws: &mut Workspace<'_>,
) -> Choice {
    let input = Zeroizing::new(x.to_vec());
    let ok = private_mod_prerand(rng, state, x, ws);
    ok & fault_check(state, &input, x)
}

/// Checks that `output^e mod n` encodes to `input`.
fn fault_check<K: PublicKeyParts>(key: &K, input: &[u8], output: &[u8]) -> Choice {
    let m = Zeroizing::new(BigUint::from_bytes_be(output));
    let check = match rsa_encrypt(key, &m) {
        Ok(check) => check,
        Err(_) => return Choice::from(0),
    };

    let mut encoded = Zeroizing::new(vec![0u8; input.len()]);
    let ok = uint_to_be_pad_into(&check, &mut encoded);
    ok & ct_eq_be(input, &encoded)
}

/// Runs the blinded CRT core against an already masked state.
pub(crate) fn private_masked<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    state: &MaskedKeyState,
    x: &mut [u8],
    ws: &mut Workspace<'_>,
) -> Choice {
    if x.len() != state.size() {
        tracing::debug!(
            len = x.len(),
            expected = state.size(),
            "input length differs from modulus length"
        );
        return Choice::from(0);
    }

    let layout = match PrivateLayout::new(state.masked_factor_bits(), ws.capacity()) {
        Ok(layout) => layout,
        Err(_) => return Choice::from(0),
    };

    let mut rng = DomainRng::new(rng, Domain::Blinding);
    let ok = blinded_crt(&mut rng, state, x, ws, &layout);
    ws.clear();
    ok
}

fn blinded_crt<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    state: &MaskedKeyState,
    x: &mut [u8],
    ws: &mut Workspace<'_>,
    layout: &PrivateLayout,
) -> Choice {
    let n = &state.n;

    // r1 and r2 are odd: the masked factors have the parity of p and q
    let mut ok =
        Choice::from(u8::from(state.p.is_odd())) & Choice::from(u8::from(state.q.is_odd()));

    let mut n_bytes = vec![0u8; x.len()];
    ok &= uint_to_be_pad_into(n, &mut n_bytes);
    ok &= ct_lt_be(x, &n_bytes);
    ok &= ws.store(layout.n, n);

    // rho^e * x mod n
    let rho = generate_below(rng, n);
    ok &= ws.store(layout.rho, &rho);
    let rho_e = Zeroizing::new(rho.modpow(&state.e, n));
    let input = Zeroizing::new(BigUint::from_bytes_be(x) % n);
    ok &= ws.store(layout.c, &Zeroizing::new((&*input * &*rho_e) % n));

    {
        let c = ws.load(layout.c);
        ok &= ws.store(layout.s1, &Zeroizing::new(&*c % &state.p));
        ok &= ws.store(layout.s2, &Zeroizing::new(&*c % &state.q));
    }

    // fresh multiple of the masked totient on top of the stored exponent
    let k = Zeroizing::new(generate_random(rng, EXPONENT_BLIND_BITS));
    ok &= ws.store(layout.dp, &blind_exponent(&state.dp, &state.phi_p, &k));
    let k = Zeroizing::new(generate_random(rng, EXPONENT_BLIND_BITS));
    ok &= ws.store(layout.dq, &blind_exponent(&state.dq, &state.phi_q, &k));

    let s1 = Zeroizing::new(ws.load(layout.s1).modpow(&ws.load(layout.dp), &state.p));
    ok &= ws.store(layout.s1, &s1);
    let s2 = Zeroizing::new(ws.load(layout.s2).modpow(&ws.load(layout.dq), &state.q));
    ok &= ws.store(layout.s2, &s2);

    // h = (s1 - s2) * iq' mod p', kept non-negative by adding p' first
    let s2_mod_p = Zeroizing::new(&*s2 % &state.p);
    let diff = Zeroizing::new((&*s1 + &state.p - &*s2_mod_p) % &state.p);
    ok &= ws.store(layout.h, &Zeroizing::new((&*diff * &state.iq) % &state.p));

    // s = s2 + q' * h, exact
    let s = Zeroizing::new(&*ws.load(layout.s2) + &state.q * &*ws.load(layout.h));
    ok &= ws.store(layout.s, &s);

    let (rho_inv, inv_ok) = modular_inverse(&ws.load(layout.rho), &ws.load(layout.n));
    ok &= inv_ok;
    let m = Zeroizing::new(((&*ws.load(layout.s) % n) * &*rho_inv) % n);

    ok &= uint_to_be_pad_into(&m, x);
    ok
}
