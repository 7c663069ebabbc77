//! Error taxonomy for keystore operations.
//!
//! Every failure is local, synchronous, and non-retryable; a wrong
//! password is a terminal outcome for that call. A failed decrypt,
//! import, or export leaves the on-disk files and the in-memory
//! registry unchanged.

/// Errors surfaced by the keystore, wallets, and accounts.
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    /// MAC verification failed during decryption.
    #[error("invalid password")]
    InvalidPassword,
    /// The container's `kdf` field names anything other than scrypt.
    #[error("unsupported KDF: {0}")]
    UnsupportedKdf(String),
    /// Operation requested against the wrong container type, e.g.
    /// multi-path derivation on a raw-key wallet.
    #[error("invalid key type")]
    InvalidKeyType,
    /// The account's owning wallet reference is gone.
    #[error("wallet no longer exists")]
    WalletGone,
    /// Derivation-path string failed to parse.
    #[error("malformed derivation path: {0}")]
    MalformedPath(String),
    /// Phrase failed wordlist validation, or a mnemonic export was
    /// requested on a raw-key container.
    #[error("invalid mnemonic")]
    InvalidMnemonic,
    /// The wallet is not registered with this keystore.
    #[error("missing wallet")]
    MissingWallet,
    /// Container `version` field is not 3.
    #[error("unsupported keystore version: {0}")]
    UnsupportedVersion(u32),
    /// A cryptographic primitive rejected its inputs.
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
