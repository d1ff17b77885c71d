//! Credential-domain identifiers, redacted secrets, key fingerprints, and exchanged tokens.

pub mod fingerprint;
pub mod id;
pub mod secret;
pub mod token;

pub use fingerprint::*;
pub use id::*;
pub use secret::*;
pub use token::*;
