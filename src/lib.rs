#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![doc(html_logo_url = "https://raw.githubusercontent.com/RustCrypto/meta/master/logo_small.png")]
#![warn(missing_docs)]

//! RSA-CRT private-key operations hardened against side channels.
//!
//! The private key is never used as-is. It is held as a [`MaskedKeyState`]:
//! both prime factors, their totients and the CRT exponents are multiplied
//! or offset by secret random masks, and the masks are replaced periodically
//! without ever unmasking the key. On top of that every private operation
//! blinds its input with a fresh `rho^e` and its exponents with a fresh
//! multiple of the masked totient.
//!
//! All secret temporaries are parked in a caller-provided [`Workspace`] whose
//! capacity is checked once, up front; the arena is wiped after every call.
//! Private operations report success through a [`subtle::Choice`]
//! accumulated without branching on secret data. A false choice means the
//! output is garbage and must be discarded.
//!
//! # Usage
//!
//! ```
//! use hex_literal::hex;
//! use rsa_masked_crt::{
//!     init_key, private_mod_prerand, private_mod_rand, RsaCrtKey, ScratchBuf, Workspace,
//!     SCRATCH_WORDS,
//! };
//!
//! let key = RsaCrtKey::from_be_bytes(
//!     &hex!("010001"),
//!     &hex!("eb77af10d530d57655cca576cfffdd6afe3e88225e862aeee26e0b32f49dd789"),
//!     &hex!("e697a9f84c784abafd3f5c28c8952a503ea7c4fe47527df84dc855d3782f35b1"),
//!     &hex!("c4827fc20689d8bc0762e0fc451e7e051ae5c8eb1603d6b4c297a015087cea31"),
//!     &hex!("88260e364bb84eaf5f2d94d583b106fdc030c0903e3e47a05f14a5102a0afdd1"),
//!     &hex!("d0fbcb3940f38daef5972d293cc5e2fe1a26c1733014129b1993f2b9b45ec2e4"),
//! )
//! .unwrap();
//! let ciphertext = hex!(
//!     "8de6a7f55c7115e346cd29a01b0ae87ea7accc71e813b7d991f3e278c9442e94"
//!     "67de879628ea91c460c11e393b0bafee824b99387177c8b6fc11087c0b89bae1"
//! );
//!
//! let mut rng = rand::thread_rng(); // rand@0.8
//! let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
//! let mut ws = Workspace::new(&mut buf);
//!
//! // one-shot: masks are derived for this call only
//! let mut x = ciphertext;
//! assert!(bool::from(private_mod_rand(&mut rng, &key, &mut x, &mut ws)));
//! assert!(x.ends_with(b"masked crt test message"));
//!
//! // long-lived masked state, rotated on every call
//! let mut state = init_key(&mut rng, &key, &mut ws).unwrap();
//! let mut x = ciphertext;
//! assert!(bool::from(private_mod_prerand(&mut rng, &mut state, &mut x, &mut ws)));
//! assert!(x.ends_with(b"masked crt test message"));
//! ```
//!
//! [`RotatingKey`] wraps a masked state with a [`RotationPolicy`] and rotates
//! it every `interval` operations.
//!
//! # Concurrency
//!
//! Rotation and private operations on the same [`MaskedKeyState`] take it by
//! `&mut`, so they can never overlap. A failed rotation leaves the previous
//! state in place.
//!
//! # Logging
//!
//! Diagnostics are emitted through [`tracing`](https://docs.rs/tracing) and
//! only ever carry public metadata: lengths, capacities and counters.

#[macro_use]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub use num_bigint::BigUint;
pub use rand_core;
pub use subtle;

mod algorithms;
pub mod domain_rng;
pub mod errors;
pub mod traits;

mod key;
mod masked_key;
mod rotating;
mod workspace;

#[cfg(feature = "hazmat")]
pub mod hazmat;

pub use crate::{
    algorithms::rekey::{init_key, update_key},
    algorithms::rsa::{
        private_mod_prerand, private_mod_prerand_and_check, private_mod_rand,
        private_mod_rand_and_check,
    },
    domain_rng::{Domain, DomainRng},
    errors::{Error, Result},
    key::RsaCrtKey,
    masked_key::MaskedKeyState,
    rotating::{RotatingKey, RotationPolicy},
    traits::{CrtKeyParts, PublicKeyParts, StatefulDecryptor},
    workspace::{ScratchBuf, Workspace, SCRATCH_WORDS},
};

/// Largest supported modulus size in bits.
pub const MAX_RSA_BITS: usize = 4096;

/// Largest supported prime factor size in bits.
pub const MAX_FACTOR_BITS: usize = (MAX_RSA_BITS + 64) / 2;

/// Size in bits of the masks applied to the prime factors.
pub const RAND_FACTOR_BITS: usize = 64;

/// Size in bits of the per-operation exponent blinding multiplier.
pub const EXPONENT_BLIND_BITS: usize = 64;
