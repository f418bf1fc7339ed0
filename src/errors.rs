//! Error types.

/// Alias for [`core::result::Result`] with the `rsa-masked-crt` crate's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[non_exhaustive]
pub enum Error {
    /// Invalid prime value.
    InvalidPrime,

    /// A prime factor is not larger than the random masks.
    FactorTooSmall,

    /// The modulus or a prime factor exceeds the supported maximum size.
    KeyTooLarge,

    /// Scratch workspace cannot hold the temporaries for this key size.
    WorkspaceTooSmall {
        /// Number of 32-bit words required.
        required: usize,
        /// Number of 32-bit words available.
        capacity: usize,
    },

    /// Input length does not match the modulus length.
    InvalidLength,

    /// Decryption error.
    Decryption,

    /// Masked key state could not be derived or rotated.
    Rekey,
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidPrime => write!(f, "invalid prime value"),
            Error::FactorTooSmall => write!(f, "prime factor too small for masking"),
            Error::KeyTooLarge => write!(f, "key exceeds the supported maximum size"),
            Error::WorkspaceTooSmall { required, capacity } => write!(
                f,
                "scratch workspace too small: {} words required, {} available",
                required, capacity
            ),
            Error::InvalidLength => write!(f, "input length does not match modulus length"),
            Error::Decryption => write!(f, "decryption error"),
            Error::Rekey => write!(f, "masked key state derivation failed"),
        }
    }
}
