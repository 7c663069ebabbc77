//! Hierarchical-deterministic key derivation and signing.
//!
//! Wraps the BIP39 wordlist handling and BIP32 child derivation behind
//! the crate's own path type, and keeps the secp256k1 details (address
//! recovery, low-level signing) in one place. Derivations are counted
//! in a process-wide counter so callers can observe how often the
//! expensive seed stretch actually runs.

use std::sync::atomic::{AtomicU64, Ordering};

use coins_bip32::xkeys::XPriv;
use coins_bip39::{English, Mnemonic};
use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::core::derivation::DerivationPath;
use crate::core::errors::KeystoreError;

const MNEMONIC_WORDS: usize = 12;

static DERIVATIONS: AtomicU64 = AtomicU64::new(0);

/// Number of seed-level derivations performed by this process so far.
pub fn derivation_count() -> u64 {
    DERIVATIONS.load(Ordering::Relaxed)
}

/// Generates a fresh 12-word English mnemonic from the OS RNG.
pub fn generate_mnemonic() -> Result<Zeroizing<String>, KeystoreError> {
    let mnemonic = Mnemonic::<English>::new_with_count(&mut rand::rngs::OsRng, MNEMONIC_WORDS)
        .map_err(|_| KeystoreError::InvalidMnemonic)?;
    Ok(Zeroizing::new(mnemonic.to_phrase()))
}

/// Checks the phrase against the English wordlist and its checksum.
pub fn validate_mnemonic(phrase: &str) -> Result<(), KeystoreError> {
    Mnemonic::<English>::new_from_phrase(phrase)
        .map(|_| ())
        .map_err(|_| KeystoreError::InvalidMnemonic)
}

/// Derives the signing key at `path` from a mnemonic and optional
/// BIP39 passphrase. An empty passphrase means no passphrase.
pub fn derive_keypair(
    phrase: &str,
    passphrase: &str,
    path: &DerivationPath,
) -> Result<SigningKey, KeystoreError> {
    let mnemonic =
        Mnemonic::<English>::new_from_phrase(phrase).map_err(|_| KeystoreError::InvalidMnemonic)?;
    let password = (!passphrase.is_empty()).then_some(passphrase);
    let xpriv: XPriv = mnemonic
        .derive_key(path.to_string().as_str(), password)
        .map_err(|e| KeystoreError::Crypto(format!("derivation failed: {e}")))?;
    DERIVATIONS.fetch_add(1, Ordering::Relaxed);
    let key: &SigningKey = xpriv.as_ref();
    Ok(key.clone())
}

/// Builds a signing key from raw 32-byte secret scalar material.
pub fn keypair_from_slice(bytes: &[u8]) -> Result<SigningKey, KeystoreError> {
    SigningKey::from_slice(bytes)
        .map_err(|e| KeystoreError::Crypto(format!("invalid private key: {e}")))
}

/// EIP-55 checksummed address of the key's public half.
pub fn address_of(key: &SigningKey) -> String {
    let point = key.verifying_key().to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    checksum_address(&digest[12..])
}

fn checksum_address(raw: &[u8]) -> String {
    let lower = hex::encode(raw);
    let digest = Keccak256::digest(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (digest[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
        if nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Signs a 32-byte digest, returning `(r, s, v)` with the recovery id
/// folded into `v` as 27 or 28.
pub fn sign_hash(
    key: &SigningKey,
    hash: &[u8; 32],
) -> Result<([u8; 32], [u8; 32], u8), KeystoreError> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(hash)
        .map_err(|e| KeystoreError::Crypto(format!("signing failed: {e}")))?;
    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    Ok((r, s, recovery_id.to_byte() + 27))
}
