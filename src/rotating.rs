//! Masked key with an automatic rotation schedule.

use alloc::vec::Vec;
use core::num::NonZeroU32;

use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use subtle::Choice;
use zeroize::Zeroizing;

use crate::algorithms::pad::left_pad;
use crate::algorithms::rekey::{init_key, update_key};
use crate::algorithms::rsa::private_masked;
use crate::errors::{Error, Result};
use crate::key::RsaCrtKey;
use crate::masked_key::MaskedKeyState;
use crate::traits::{PublicKeyParts, StatefulDecryptor};
use crate::workspace::{ScratchBuf, Workspace, SCRATCH_WORDS};

/// How often a [`RotatingKey`] re-randomizes its masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Number of private operations performed between two rotations.
    pub interval: NonZeroU32,
}

impl RotationPolicy {
    /// Number of operations between rotations used by [`Default`].
    pub const DEFAULT_INTERVAL: u32 = 32;

    /// Rotates after every `interval` operations.
    pub const fn every(interval: NonZeroU32) -> Self {
        RotationPolicy { interval }
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        match NonZeroU32::new(Self::DEFAULT_INTERVAL) {
            Some(interval) => RotationPolicy { interval },
            None => RotationPolicy {
                interval: NonZeroU32::MIN,
            },
        }
    }
}

/// A [`MaskedKeyState`] that rotates its masks on a fixed schedule.
///
/// Every private operation consumes one unit of the rotation budget. When the
/// budget is exhausted the masks are rotated before the next operation and the
/// budget is refilled. Private operations take `&mut self`, so rotation can
/// never overlap an operation on the same key.
///
/// ```
/// use hex_literal::hex;
/// use rsa_masked_crt::{RotatingKey, RotationPolicy, RsaCrtKey, StatefulDecryptor};
///
/// let key = RsaCrtKey::from_be_bytes(
///     &hex!("010001"),
///     &hex!("eb77af10d530d57655cca576cfffdd6afe3e88225e862aeee26e0b32f49dd789"),
///     &hex!("e697a9f84c784abafd3f5c28c8952a503ea7c4fe47527df84dc855d3782f35b1"),
///     &hex!("c4827fc20689d8bc0762e0fc451e7e051ae5c8eb1603d6b4c297a015087cea31"),
///     &hex!("88260e364bb84eaf5f2d94d583b106fdc030c0903e3e47a05f14a5102a0afdd1"),
///     &hex!("d0fbcb3940f38daef5972d293cc5e2fe1a26c1733014129b1993f2b9b45ec2e4"),
/// )
/// .unwrap();
///
/// let mut rng = rand::thread_rng();
/// let mut key = RotatingKey::new(&mut rng, &key, RotationPolicy::default()).unwrap();
///
/// let ciphertext = hex!(
///     "8de6a7f55c7115e346cd29a01b0ae87ea7accc71e813b7d991f3e278c9442e94"
///     "67de879628ea91c460c11e393b0bafee824b99387177c8b6fc11087c0b89bae1"
/// );
/// let plaintext = key.decrypt_with_rng(&mut rng, &ciphertext).unwrap();
/// assert!(plaintext.ends_with(b"masked crt test message"));
/// ```
pub struct RotatingKey {
    state: MaskedKeyState,
    policy: RotationPolicy,
    remaining: u32,
}

impl RotatingKey {
    /// Masks `key` and starts a fresh rotation budget.
    pub fn new<R: CryptoRngCore + ?Sized>(
        rng: &mut R,
        key: &RsaCrtKey,
        policy: RotationPolicy,
    ) -> Result<Self> {
        let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
        let mut ws = Workspace::new(&mut buf);
        let state = init_key(rng, key, &mut ws)?;

        Ok(RotatingKey {
            state,
            policy,
            remaining: policy.interval.get(),
        })
    }

    /// Raw private operation on `x` in place, rotating first if the budget is
    /// spent. Flag and buffer semantics are those of
    /// [`private_mod_rand`](crate::private_mod_rand).
    ///
    /// A failed rotation fails the operation and leaves the budget empty, so
    /// the next call rotates again.
    pub fn private_op<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        x: &mut [u8],
    ) -> Choice {
        let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
        let mut ws = Workspace::new(&mut buf);

        let mut ok = Choice::from(1);
        if self.remaining == 0 {
            tracing::trace!(interval = self.policy.interval.get(), "rotating key masks");
            match update_key(rng, &mut self.state, &mut ws) {
                Ok(()) => self.remaining = self.policy.interval.get() - 1,
                Err(_) => {
                    tracing::debug!("key mask rotation failed, retrying on next operation");
                    ok = Choice::from(0);
                }
            }
        } else {
            self.remaining -= 1;
        }

        ok & private_masked(rng, &self.state, x, &mut ws)
    }

    /// Rotates the masks now and refills the budget.
    pub fn rotate<R: CryptoRngCore + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
        let mut ws = Workspace::new(&mut buf);
        update_key(rng, &mut self.state, &mut ws)?;
        self.remaining = self.policy.interval.get();
        Ok(())
    }

    /// Current masked state.
    pub fn state(&self) -> &MaskedKeyState {
        &self.state
    }

    /// Rotation policy of this key.
    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Operations left before the next rotation.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl PublicKeyParts for RotatingKey {
    fn n(&self) -> &BigUint {
        self.state.n()
    }

    fn e(&self) -> &BigUint {
        self.state.e()
    }
}

impl StatefulDecryptor for RotatingKey {
    fn decrypt_with_rng<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let mut buf = Zeroizing::new(left_pad(ciphertext, self.size())?);
        let ok = self.private_op(rng, &mut buf);
        if !bool::from(ok) {
            return Err(Error::Decryption);
        }
        Ok(core::mem::take(&mut *buf))
    }
}

impl core::fmt::Debug for RotatingKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RotatingKey")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .field("remaining", &self.remaining)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::tests::test_key;
    use crate::traits::CrtKeyParts;
    use hex_literal::hex;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    const CIPHERTEXT: [u8; 64] = hex!(
        "8de6a7f55c7115e346cd29a01b0ae87ea7accc71e813b7d991f3e278c9442e94"
        "67de879628ea91c460c11e393b0bafee824b99387177c8b6fc11087c0b89bae1"
    );

    #[test]
    fn test_default_policy() {
        assert_eq!(RotationPolicy::default().interval.get(), 32);
    }

    #[test]
    fn test_rotates_on_schedule() {
        let mut rng = ChaCha8Rng::seed_from_u64(20);
        let policy = RotationPolicy::every(NonZeroU32::new(3).unwrap());
        let mut key = RotatingKey::new(&mut rng, &test_key(), policy).unwrap();
        assert_eq!(key.remaining(), 3);

        let mut masks = vec![key.state().r1.clone()];
        for i in 0..7 {
            let plaintext = key.decrypt_with_rng(&mut rng, &CIPHERTEXT).unwrap();
            assert!(plaintext.ends_with(b"masked crt test message"));
            assert_eq!(key.remaining(), 2 - (i % 3));
            if i % 3 == 0 && i > 0 {
                masks.push(key.state().r1.clone());
            }
        }
        // rotations happened before operations 3 and 6
        assert_eq!(masks.len(), 3);
        assert_ne!(masks[0], masks[1]);
        assert_ne!(masks[1], masks[2]);
    }

    #[test]
    fn test_failed_rotation_is_retried() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let policy = RotationPolicy::every(NonZeroU32::new(2).unwrap());
        let mut key = RotatingKey::new(&mut rng, &test_key(), policy).unwrap();
        key.remaining = 0;

        // a mask sharing a factor with n cannot be inverted
        let r1 = key.state.r1.clone();
        let p_before = key.state.p.clone();
        key.state.r1 = test_key().p().clone();

        for _ in 0..2 {
            let mut x = CIPHERTEXT;
            assert!(!bool::from(key.private_op(&mut rng, &mut x)));
            assert_eq!(key.remaining(), 0);
            assert_eq!(key.state.p, p_before);
        }

        key.state.r1 = r1;
        let mut x = CIPHERTEXT;
        assert!(bool::from(key.private_op(&mut rng, &mut x)));
        assert!(x.ends_with(b"masked crt test message"));
        assert_eq!(key.remaining(), 1);
        assert_ne!(key.state.p, p_before);
    }

    #[test]
    fn test_explicit_rotate_refills_budget() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut key = RotatingKey::new(&mut rng, &test_key(), RotationPolicy::default()).unwrap();
        key.decrypt_with_rng(&mut rng, &CIPHERTEXT).unwrap();
        assert_eq!(key.remaining(), 31);

        key.rotate(&mut rng).unwrap();
        assert_eq!(key.remaining(), 32);
        assert!(key.decrypt_with_rng(&mut rng, &CIPHERTEXT).is_ok());
    }

    #[test]
    fn test_decrypt_rejects_bad_input() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let key = test_key();
        let mut rotating = RotatingKey::new(&mut rng, &key, RotationPolicy::default()).unwrap();

        assert_eq!(
            rotating.decrypt_with_rng(&mut rng, &[0u8; 65]).unwrap_err(),
            Error::InvalidLength
        );
        assert_eq!(
            rotating
                .decrypt_with_rng(&mut rng, &key.n().to_bytes_be())
                .unwrap_err(),
            Error::Decryption
        );
    }

    #[test]
    fn test_short_ciphertext_is_left_padded() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let mut key = RotatingKey::new(&mut rng, &test_key(), RotationPolicy::default()).unwrap();
        let plaintext = key.decrypt_with_rng(&mut rng, &[1u8]).unwrap();
        assert_eq!(plaintext.len(), 64);
        assert_eq!(BigUint::from_bytes_be(&plaintext), BigUint::from(1u32));
    }

    #[test]
    fn test_debug_hides_masks() {
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        let key = RotatingKey::new(&mut rng, &test_key(), RotationPolicy::default()).unwrap();
        let out = format!("{:?}", key);
        assert!(out.contains("remaining"));
        assert!(!out.contains("r1"));
    }
}
