//! Account-level key recovery and signing.

use hd_keystore::{Coin, DerivationPath, Keystore, KeystoreError};
use tempfile::TempDir;

const PASSWORD: &str = "password";
const PASSPHRASE: &str = "TREZOR";
const MNEMONIC: &str = "often tobacco bread scare imitate song kind common bar forest yard wisdom";
const PRIVATE_KEY_HEX: &str = "d6ddd607fb6508cb48cbb0492495be247a3476f4b140473e23a829e722fd4968";

fn eth_path() -> DerivationPath {
    "m/44'/60'/0'/0/0".parse().unwrap()
}

fn dex_path() -> DerivationPath {
    "m/44'/237'/0'/0/0".parse().unwrap()
}

fn empty_keystore() -> (TempDir, Keystore) {
    hd_keystore::init_tracing();
    let dir = TempDir::new().unwrap();
    let keystore = Keystore::open(dir.path()).unwrap();
    (dir, keystore)
}

#[test]
fn test_hd_private_key_vectors() {
    let (_dir, mut keystore) = empty_keystore();
    let wallet = keystore
        .import_mnemonic(MNEMONIC, PASSPHRASE, PASSWORD, &[eth_path(), dex_path()])
        .unwrap();
    let accounts = wallet.accounts();

    let eth_key = accounts[0].private_key(PASSWORD).unwrap();
    assert_eq!(
        hex::encode(eth_key.to_bytes()),
        "e3c7d3091a4b2dd7697a9309adfafee1107eb7fff14f0a69b173706b53695250"
    );
    assert_eq!(
        accounts[0].address(),
        "0x5BbA2fd958e3a30cf84dd92853D7C194989b3DdA"
    );

    let dex_key = accounts[1].private_key(PASSWORD).unwrap();
    assert_eq!(
        hex::encode(dex_key.to_bytes()),
        "a627e7fa3a22e430763fb6cfe013125071b72447b80e76c45fecbdefa50a53bc"
    );
}

#[test]
fn test_private_keys_batch() {
    let (_dir, mut keystore) = empty_keystore();
    let wallet = keystore
        .import_mnemonic(MNEMONIC, PASSPHRASE, PASSWORD, &[eth_path()])
        .unwrap();
    let account = &wallet.accounts()[0];

    let keys = account
        .private_keys(&[eth_path(), dex_path()], PASSWORD)
        .unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(
        hex::encode(keys[0].to_bytes()),
        "e3c7d3091a4b2dd7697a9309adfafee1107eb7fff14f0a69b173706b53695250"
    );
    assert_eq!(
        hex::encode(keys[1].to_bytes()),
        "a627e7fa3a22e430763fb6cfe013125071b72447b80e76c45fecbdefa50a53bc"
    );
}

#[test]
fn test_private_keys_rejects_raw_wallet() {
    let (_dir, mut keystore) = empty_keystore();
    let secret = hex::decode(PRIVATE_KEY_HEX).unwrap();
    let wallet = keystore
        .import_private_key(&secret, PASSWORD, Coin::ETHEREUM)
        .unwrap();
    let account = &wallet.accounts()[0];
    assert!(matches!(
        account.private_keys(&[eth_path()], PASSWORD),
        Err(KeystoreError::InvalidKeyType)
    ));
}

#[test]
fn test_raw_account_private_key() {
    let (_dir, mut keystore) = empty_keystore();
    let secret = hex::decode(PRIVATE_KEY_HEX).unwrap();
    let wallet = keystore
        .import_private_key(&secret, PASSWORD, Coin::ETHEREUM)
        .unwrap();
    let account = &wallet.accounts()[0];
    let key = account.private_key(PASSWORD).unwrap();
    assert_eq!(hex::encode(key.to_bytes()), PRIVATE_KEY_HEX);
}

#[test]
fn test_sign_hash() {
    let (_dir, mut keystore) = empty_keystore();
    let secret = hex::decode(PRIVATE_KEY_HEX).unwrap();
    let wallet = keystore
        .import_private_key(&secret, PASSWORD, Coin::ETHEREUM)
        .unwrap();
    let account = &wallet.accounts()[0];

    let hash = [0x42u8; 32];
    let signature = account.sign(&hash, PASSWORD).unwrap();
    assert!(signature.v == 27 || signature.v == 28);

    let bytes = signature.to_bytes();
    assert_eq!(bytes.len(), 65);
    assert_eq!(bytes[64], signature.v);

    // RFC 6979 nonces make signing deterministic.
    let again = account.sign(&hash, PASSWORD).unwrap();
    assert_eq!(signature, again);

    assert!(matches!(
        account.sign(&hash, "password123"),
        Err(KeystoreError::InvalidPassword)
    ));
}

#[test]
fn test_sign_with_hd_account() {
    let (_dir, mut keystore) = empty_keystore();
    let wallet = keystore
        .import_mnemonic(MNEMONIC, PASSPHRASE, PASSWORD, &[eth_path()])
        .unwrap();
    let account = &wallet.accounts()[0];
    let signature = account.sign(&[0x07u8; 32], PASSWORD).unwrap();
    assert!(signature.v == 27 || signature.v == 28);
}

#[test]
fn test_account_outliving_wallet() {
    let (_dir, mut keystore) = empty_keystore();
    let wallet = keystore
        .import_mnemonic(MNEMONIC, "", PASSWORD, &[eth_path()])
        .unwrap();
    let account = wallet.accounts()[0].clone();

    keystore.delete(&wallet).unwrap();
    drop(wallet);

    assert!(matches!(
        account.private_key(PASSWORD),
        Err(KeystoreError::WalletGone)
    ));
    assert!(matches!(
        account.sign(&[0u8; 32], PASSWORD),
        Err(KeystoreError::WalletGone)
    ));
}
