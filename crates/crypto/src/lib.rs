//! Binroute Crypto
//!
//! Cryptographic primitives for the dispatch engine:
//!
//! - **Message Authentication**: HMAC-SHA256 with domain separation, used for
//!   proof-of-collection QR payloads and webhook body signatures
//! - **Hash Chains**: BLAKE3 hash pointers linking mission status transitions
//!
//! # Security Principles
//!
//! - Never roll custom cryptographic primitives
//! - Secrets must never be logged or hardcoded
//! - MAC comparison is constant-time
//! - Secret key material is zeroized on drop

pub mod chain;
pub mod signing;

pub use chain::{compute_link_hash, verify_links, Blake3Hash, ChainError, ChainLink, GENESIS_HASH};
pub use signing::{sign_webhook_body, PayloadSigner, SigningDomain, SigningError};
