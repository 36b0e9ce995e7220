//! Session token minting and verification.
//!
//! Tokens are compact JWTs signed with the active HMAC key and verified
//! against the active key plus an optional grace key set, so key rotation
//! does not prematurely invalidate just-rotated-out tokens. Nothing about
//! a token is ever persisted; verification is pure computation.

pub mod signer;
pub mod verifier;

pub use signer::{SessionClaims, TokenSigner, VerificationError};
pub use verifier::{RequiredClaim, SessionVerifier, TokenCheck};
