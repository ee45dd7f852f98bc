mod signature;

pub use signature::{verify_signature, SignatureVerifier, SIGNATURE_HEADER};
