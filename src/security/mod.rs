//! Security subsystem: credentials and payload encryption.
//!
//! # Data Flow
//! ```text
//! Relay attempt for target URL
//!     → auth.rs (per-domain credential header)
//!     → cipher.rs (encrypt worker payload, when not in simple mode)
//! ```
//!
//! # Design Decisions
//! - Both are best-effort: a missing credential or cipher never fails a request
//! - The cipher is an injected capability, loaded on first use

pub mod auth;
pub mod cipher;

pub use auth::{AuthTable, AUTH_HEADER};
pub use cipher::{
    AesGcmCipher, BuiltinCipherProvider, Cipher, CipherError, CipherProvider,
    UnavailableCipherProvider,
};
