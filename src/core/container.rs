//! The persisted secret container.
//!
//! A `KeystoreKey` is one v3 keystore document: an encrypted payload
//! (raw private key or mnemonic phrase) plus identity metadata and the
//! list of accounts already derived from it. The BIP39 passphrase is
//! deliberately transient; it never reaches disk.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::core::derivation::DerivationPath;
use crate::core::errors::KeystoreError;
use crate::crypto::cipher::EncryptionRecord;
use crate::crypto::hd;

pub const KEYSTORE_VERSION: u32 = 3;

/// What kind of secret the container holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletType {
    /// A single raw secp256k1 private key. Documents written before the
    /// type tag existed omit the field, so this is the default.
    #[default]
    #[serde(rename = "private-key")]
    PrivateKey,
    /// A BIP39 mnemonic phrase backing an HD hierarchy.
    #[serde(rename = "mnemonic")]
    Mnemonic,
}

/// SLIP-44 coin index. Encoded as a decimal string in the document,
/// but numeric forms are accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coin(pub u32);

impl Coin {
    pub const BITCOIN: Coin = Coin(0);
    pub const ETHEREUM: Coin = Coin(60);

    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Coin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Coin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoinVisitor;

        impl<'de> Visitor<'de> for CoinVisitor {
            type Value = Coin;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a SLIP-44 coin index as a string or integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Coin, E> {
                value.parse().map(Coin).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Coin, E> {
                u32::try_from(value).map(Coin).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(CoinVisitor)
    }
}

/// One derived identity recorded in the document so it can be restored
/// without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub address: String,
    pub derivation_path: DerivationPath,
}

/// A v3 keystore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreKey {
    #[serde(rename = "type", default)]
    pub wallet_type: WalletType,
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub crypto: EncryptionRecord,
    /// BIP39 passphrase for mnemonic containers. Never serialized.
    #[serde(skip)]
    pub passphrase: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin: Option<Coin>,
    #[serde(rename = "activeAccounts", default)]
    pub active_accounts: Vec<AccountRecord>,
}

impl KeystoreKey {
    /// Creates a container around a freshly generated mnemonic.
    pub fn generate(password: &str) -> Result<Self, KeystoreError> {
        let phrase = hd::generate_mnemonic()?;
        Self::from_mnemonic(password, &phrase, "")
    }

    /// Encrypts an existing mnemonic phrase under `password`.
    pub fn from_mnemonic(
        password: &str,
        phrase: &str,
        passphrase: &str,
    ) -> Result<Self, KeystoreError> {
        hd::validate_mnemonic(phrase)?;
        let crypto = EncryptionRecord::encrypt(phrase.as_bytes(), password)?;
        debug!("created mnemonic container");
        Ok(Self {
            wallet_type: WalletType::Mnemonic,
            id: Uuid::new_v4(),
            address: None,
            crypto,
            passphrase: passphrase.to_string(),
            version: KEYSTORE_VERSION,
            coin: None,
            active_accounts: Vec::new(),
        })
    }

    /// Encrypts a raw 32-byte private key under `password`.
    pub fn from_private_key(
        password: &str,
        key: &[u8],
        coin: Option<Coin>,
    ) -> Result<Self, KeystoreError> {
        if key.len() != 32 {
            return Err(KeystoreError::Crypto(format!(
                "private key must be 32 bytes, got {}",
                key.len()
            )));
        }
        let address = hd::address_of(&hd::keypair_from_slice(key)?);
        let crypto = EncryptionRecord::encrypt(key, password)?;
        debug!(%address, "created private-key container");
        Ok(Self {
            wallet_type: WalletType::PrivateKey,
            id: Uuid::new_v4(),
            address: Some(address),
            crypto,
            passphrase: String::new(),
            version: KEYSTORE_VERSION,
            coin,
            active_accounts: Vec::new(),
        })
    }

    /// Parses a document, rejecting any version other than 3.
    pub fn from_json(json: &str) -> Result<Self, KeystoreError> {
        let key: Self = serde_json::from_str(json)?;
        if key.version != KEYSTORE_VERSION {
            return Err(KeystoreError::UnsupportedVersion(key.version));
        }
        Ok(key)
    }

    pub fn load(path: &Path) -> Result<Self, KeystoreError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, KeystoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), KeystoreError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Decrypts the raw payload.
    pub fn decrypt(&self, password: &str) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
        self.crypto.decrypt(password)
    }

    /// Decrypts the payload as a mnemonic phrase.
    pub fn decrypt_mnemonic(&self, password: &str) -> Result<Zeroizing<String>, KeystoreError> {
        let payload = self.decrypt(password)?;
        mnemonic_from_bytes(&payload)
    }
}

/// Decodes a decrypted payload as an ASCII mnemonic phrase. Some
/// writers pad the plaintext with trailing NUL bytes; strip them.
pub(crate) fn mnemonic_from_bytes(payload: &[u8]) -> Result<Zeroizing<String>, KeystoreError> {
    let trimmed = match payload.iter().rposition(|b| *b != 0) {
        Some(last) => &payload[..=last],
        None => &[],
    };
    if !trimmed.is_ascii() {
        return Err(KeystoreError::InvalidMnemonic);
    }
    let phrase = std::str::from_utf8(trimmed).map_err(|_| KeystoreError::InvalidMnemonic)?;
    Ok(Zeroizing::new(phrase.to_string()))
}
