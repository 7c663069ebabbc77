//! Password-protected secret store for blockchain signing keys.
//!
//! Secrets live in Ethereum-style v3 keystore documents: scrypt
//! stretches the password, AES-128-CTR encrypts the payload, and a
//! keccak256 MAC gates decryption. A [`Keystore`] manages a directory
//! of such documents as [`Wallet`]s; each wallet caches the
//! [`Account`]s derived from it, so addresses are available without
//! the password once derived.
//!
//! ```no_run
//! use hd_keystore::{Coin, DerivationPath, Keystore};
//!
//! # fn main() -> Result<(), hd_keystore::KeystoreError> {
//! let mut keystore = Keystore::open("/tmp/keys")?;
//! let path: DerivationPath = "m/44'/60'/0'/0/0".parse()?;
//! let wallet = keystore.create_wallet("correct horse", &[path])?;
//! for account in wallet.accounts() {
//!     println!("{}", account.address());
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod crypto;

pub use crate::core::account::{Account, Signature};
pub use crate::core::container::{AccountRecord, Coin, KeystoreKey, WalletType};
pub use crate::core::derivation::{DerivationPath, Index};
pub use crate::core::errors::KeystoreError;
pub use crate::core::keystore::Keystore;
pub use crate::core::wallet::Wallet;
pub use crate::crypto::cipher::EncryptionRecord;

/// Installs a formatting `tracing` subscriber honoring `RUST_LOG`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
