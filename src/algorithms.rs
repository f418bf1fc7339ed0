//! Useful algorithms related to masked RSA-CRT.

pub(crate) mod ct;
pub(crate) mod mask;
pub(crate) mod pad;
pub(crate) mod rekey;
pub(crate) mod rsa;
