//! Keystore domain model: containers, wallets, accounts, and the
//! directory-backed collection that owns them.

pub mod account;
pub mod container;
pub mod derivation;
pub mod errors;
pub mod keystore;
pub mod wallet;
