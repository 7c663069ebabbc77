//! A derived identity inside a wallet.
//!
//! Accounts hold a weak reference to their owning wallet's state, so a
//! cached `Account` outliving its wallet fails with `WalletGone`
//! instead of resurrecting the secret.

use std::sync::Weak;

use k256::ecdsa::SigningKey;
use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::core::container::{mnemonic_from_bytes, AccountRecord, KeystoreKey, WalletType};
use crate::core::derivation::DerivationPath;
use crate::core::errors::KeystoreError;
use crate::core::wallet::WalletState;
use crate::crypto::hd;

/// A recoverable secp256k1 signature over a 32-byte digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery id plus 27, so 27 or 28.
    pub v: u8,
}

impl Signature {
    /// Serializes as the 65-byte `r || s || v` wire form.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }
}

/// One address of a wallet, pinned to the derivation path that
/// produced it.
#[derive(Debug, Clone)]
pub struct Account {
    wallet: Weak<RwLock<WalletState>>,
    address: String,
    derivation_path: DerivationPath,
}

impl Account {
    pub(crate) fn new(
        wallet: Weak<RwLock<WalletState>>,
        address: String,
        derivation_path: DerivationPath,
    ) -> Self {
        Self {
            wallet,
            address,
            derivation_path,
        }
    }

    pub(crate) fn from_record(wallet: Weak<RwLock<WalletState>>, record: AccountRecord) -> Self {
        Self::new(wallet, record.address, record.derivation_path)
    }

    pub(crate) fn to_record(&self) -> AccountRecord {
        AccountRecord {
            address: self.address.clone(),
            derivation_path: self.derivation_path.clone(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn derivation_path(&self) -> &DerivationPath {
        &self.derivation_path
    }

    /// Recovers this account's signing key. Raw-key wallets decrypt the
    /// stored key; HD wallets re-derive at the account's path.
    pub fn private_key(&self, password: &str) -> Result<SigningKey, KeystoreError> {
        let key = self.container()?;
        match key.wallet_type {
            WalletType::PrivateKey => {
                let secret = key.decrypt(password)?;
                hd::keypair_from_slice(&secret)
            }
            WalletType::Mnemonic => {
                let payload = key.decrypt(password)?;
                let phrase = mnemonic_from_bytes(&payload)?;
                hd::derive_keypair(&phrase, &key.passphrase, &self.derivation_path)
            }
        }
    }

    /// Recovers the signing keys at several paths in one decryption.
    /// Only valid on HD wallets.
    pub fn private_keys(
        &self,
        paths: &[DerivationPath],
        password: &str,
    ) -> Result<Vec<SigningKey>, KeystoreError> {
        let key = self.container()?;
        if key.wallet_type != WalletType::Mnemonic {
            return Err(KeystoreError::InvalidKeyType);
        }
        derive_from(&key, paths, password)
    }

    /// Signs a 32-byte digest with this account's key.
    pub fn sign(&self, hash: &[u8; 32], password: &str) -> Result<Signature, KeystoreError> {
        let key = self.private_key(password)?;
        let (r, s, v) = hd::sign_hash(&key, hash)?;
        Ok(Signature { r, s, v })
    }

    fn container(&self) -> Result<KeystoreKey, KeystoreError> {
        let state = self.wallet.upgrade().ok_or(KeystoreError::WalletGone)?;
        let key = state.read().key().clone();
        Ok(key)
    }
}

fn derive_from(
    key: &KeystoreKey,
    paths: &[DerivationPath],
    password: &str,
) -> Result<Vec<SigningKey>, KeystoreError> {
    let payload = key.decrypt(password)?;
    let phrase: Zeroizing<String> = mnemonic_from_bytes(&payload)?;
    paths
        .iter()
        .map(|path| hd::derive_keypair(&phrase, &key.passphrase, path))
        .collect()
}
