//! Password-based encryption of secret payloads.
//!
//! Produces the Ethereum keystore v3 `crypto` record: scrypt stretches
//! the password into a 32-byte derived key, the first half keys
//! AES-128-CTR and the second half authenticates the ciphertext via
//! `keccak256(mac_key || ciphertext)`. Decryption verifies the MAC
//! before touching the cipher, so a wrong password never yields
//! plaintext.

use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::errors::KeystoreError;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Interactive-login scrypt cost, the standard "light" profile for
/// keystore files that are decrypted on every use.
const SCRYPT_N: u32 = 4096;
const SCRYPT_P: u32 = 6;
const SCRYPT_R: u32 = 8;
const DKLEN: u32 = 32;

const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;

const CIPHER_AES_128_CTR: &str = "aes-128-ctr";
const KDF_SCRYPT: &str = "scrypt";

/// The `crypto` object of a v3 keystore document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptionRecord {
    /// Hex-encoded encrypted payload.
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    /// Cipher name, always `aes-128-ctr`.
    pub cipher: String,
    /// KDF name; only `scrypt` is accepted.
    pub kdf: String,
    pub kdfparams: ScryptParams,
    /// Hex-encoded `keccak256(derived_key[16..32] || ciphertext)`.
    pub mac: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CipherParams {
    /// Hex-encoded 16-byte CTR initialization vector.
    pub iv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScryptParams {
    pub dklen: u32,
    pub n: u32,
    pub p: u32,
    pub r: u32,
    /// Hex-encoded salt.
    pub salt: String,
}

impl EncryptionRecord {
    /// Encrypts `payload` under `password` with fresh random salt and IV.
    pub fn encrypt(payload: &[u8], password: &str) -> Result<Self, KeystoreError> {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let derived = derive_key(password, &salt, SCRYPT_N, SCRYPT_R, SCRYPT_P)?;

        let mut ciphertext = payload.to_vec();
        let mut cipher = Aes128Ctr::new(derived[..16].into(), iv.as_slice().into());
        cipher.apply_keystream(&mut ciphertext);

        let mac = compute_mac(&derived[16..32], &ciphertext);
        debug!(len = payload.len(), "encrypted payload");

        Ok(Self {
            ciphertext: hex::encode(&ciphertext),
            cipherparams: CipherParams { iv: hex::encode(iv) },
            cipher: CIPHER_AES_128_CTR.to_string(),
            kdf: KDF_SCRYPT.to_string(),
            kdfparams: ScryptParams {
                dklen: DKLEN,
                n: SCRYPT_N,
                p: SCRYPT_P,
                r: SCRYPT_R,
                salt: hex::encode(salt),
            },
            mac: hex::encode(mac),
        })
    }

    /// Verifies the MAC under `password` and returns the plaintext.
    ///
    /// Fails with `UnsupportedKdf` before any key stretching if the
    /// record names a KDF other than scrypt, and with `InvalidPassword`
    /// if the MAC does not match.
    pub fn decrypt(&self, password: &str) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
        if self.kdf != KDF_SCRYPT {
            return Err(KeystoreError::UnsupportedKdf(self.kdf.clone()));
        }
        if self.cipher != CIPHER_AES_128_CTR {
            return Err(KeystoreError::Crypto(format!(
                "unsupported cipher: {}",
                self.cipher
            )));
        }
        if self.kdfparams.dklen != DKLEN {
            return Err(KeystoreError::Crypto(format!(
                "unsupported dklen: {}",
                self.kdfparams.dklen
            )));
        }

        let salt = decode_hex(&self.kdfparams.salt, "salt")?;
        let iv = decode_hex(&self.cipherparams.iv, "iv")?;
        if iv.len() != IV_LEN {
            return Err(KeystoreError::Crypto(format!(
                "iv must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        let ciphertext = decode_hex(&self.ciphertext, "ciphertext")?;
        let expected_mac = decode_hex(&self.mac, "mac")?;

        let derived = derive_key(
            password,
            &salt,
            self.kdfparams.n,
            self.kdfparams.r,
            self.kdfparams.p,
        )?;

        let mac = compute_mac(&derived[16..32], &ciphertext);
        if mac.as_slice().ct_eq(&expected_mac).unwrap_u8() != 1 {
            return Err(KeystoreError::InvalidPassword);
        }

        let mut plaintext = Zeroizing::new(ciphertext);
        let mut cipher = Aes128Ctr::new(derived[..16].into(), iv.as_slice().into());
        cipher.apply_keystream(&mut plaintext);
        Ok(plaintext)
    }
}

fn derive_key(
    password: &str,
    salt: &[u8],
    n: u32,
    r: u32,
    p: u32,
) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    if !n.is_power_of_two() || n < 2 {
        return Err(KeystoreError::Crypto(format!(
            "scrypt n must be a power of two, got {n}"
        )));
    }
    let params = scrypt::Params::new(n.trailing_zeros() as u8, r, p, DKLEN as usize)
        .map_err(|e| KeystoreError::Crypto(format!("invalid scrypt parameters: {e}")))?;

    let mut derived = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut derived[..])
        .map_err(|e| KeystoreError::Crypto(format!("scrypt derivation failed: {e}")))?;
    Ok(derived)
}

fn compute_mac(mac_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(mac_key);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

fn decode_hex(value: &str, field: &str) -> Result<Vec<u8>, KeystoreError> {
    hex::decode(value).map_err(|e| KeystoreError::Crypto(format!("invalid hex in {field}: {e}")))
}
