//! Decryption-related traits.

use alloc::vec::Vec;
use rand_core::CryptoRngCore;

use crate::errors::Result;

/// Decrypt the given message using provided random source, updating the
/// secret state of the key as a side effect.
///
/// Implementors hold masked key material that is re-randomized between
/// operations, so decryption needs exclusive access to the key.
pub trait StatefulDecryptor {
    /// Decrypt the given message.
    fn decrypt_with_rng<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}
