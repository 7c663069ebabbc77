//! Cryptographic building blocks: password-based container encryption
//! and HD key derivation.

pub mod cipher;
pub mod hd;
