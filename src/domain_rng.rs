//! Domain-separated random generators.
//!
//! Each logical use of randomness in this crate (message blinding versus
//! key-state rotation) draws from its own generator, derived from the
//! caller's random source and a fixed personalization label. Two generators
//! derived from the same parent output under different labels produce
//! independent streams.

use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, CryptoRngCore, RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Length of the entropy drawn from the parent generator.
const SEED_ENTROPY_LEN: usize = 32;

/// Logical use of a random stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Per-operation message and exponent blinding.
    Blinding,
    /// Mask generation for key-state initialization and rotation.
    Rekeying,
}

impl Domain {
    /// Personalization label mixed into the seed.
    pub const fn label(self) -> &'static [u8] {
        match self {
            Domain::Blinding => b"seed for RSA BLIND",
            Domain::Rekeying => b"seed for RSA REKEY",
        }
    }
}

/// ChaCha20 generator seeded from `SHA-256(label || entropy)`.
pub struct DomainRng {
    inner: ChaCha20Rng,
}

impl DomainRng {
    /// Derives a generator for `domain` from 32 bytes of `parent` output.
    pub fn new<R: CryptoRngCore + ?Sized>(parent: &mut R, domain: Domain) -> Self {
        let mut entropy = Zeroizing::new([0u8; SEED_ENTROPY_LEN]);
        parent.fill_bytes(entropy.as_mut());

        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(
            &Sha256::new()
                .chain_update(domain.label())
                .chain_update(entropy.as_ref())
                .finalize(),
        );

        DomainRng {
            inner: ChaCha20Rng::from_seed(*seed),
        }
    }
}

impl RngCore for DomainRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

impl CryptoRng for DomainRng {}
