//! RSA-related trait definitions.

mod encryption;
pub(crate) mod keys;

pub use encryption::StatefulDecryptor;
pub use keys::{CrtKeyParts, PublicKeyParts};
