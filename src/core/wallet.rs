//! A wallet is one container file plus its cache of derived accounts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::core::account::Account;
use crate::core::container::{Coin, KeystoreKey, WalletType};
use crate::core::derivation::DerivationPath;
use crate::core::errors::KeystoreError;
use crate::crypto::hd;

/// Mutable wallet state shared with the accounts derived from it.
#[derive(Debug)]
pub struct WalletState {
    key: KeystoreKey,
    accounts: Vec<Account>,
}

impl WalletState {
    pub(crate) fn key(&self) -> &KeystoreKey {
        &self.key
    }

    pub(crate) fn key_mut(&mut self) -> &mut KeystoreKey {
        &mut self.key
    }

    pub(crate) fn accounts(&self) -> &[Account] {
        &self.accounts
    }
}

/// One keystore file and the accounts derived from it so far.
///
/// Identity is the file's basename; two wallets backed by the same
/// file compare equal regardless of cache contents.
#[derive(Debug, Clone)]
pub struct Wallet {
    file: PathBuf,
    identifier: String,
    state: Arc<RwLock<WalletState>>,
}

impl Wallet {
    pub(crate) fn new(file: PathBuf, key: KeystoreKey) -> Self {
        let identifier = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file,
            identifier,
            state: Arc::new(RwLock::new(WalletState {
                key,
                accounts: Vec::new(),
            })),
        }
    }

    /// Rebuilds the account cache from the container's persisted
    /// `activeAccounts` records.
    pub(crate) fn restore_cached_accounts(&self) {
        let mut state = self.state.write();
        let records = state.key.active_accounts.clone();
        state.accounts = records
            .into_iter()
            .map(|record| Account::from_record(Arc::downgrade(&self.state), record))
            .collect();
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn wallet_type(&self) -> WalletType {
        self.state.read().key.wallet_type
    }

    /// Snapshot of the derived accounts, in derivation order.
    pub fn accounts(&self) -> Vec<Account> {
        self.state.read().accounts.clone()
    }

    /// Returns the single account of a raw-key wallet, deriving it on
    /// first use. The cached account is returned without touching the
    /// password.
    pub fn get_account(&self, password: &str, coin: Coin) -> Result<Account, KeystoreError> {
        let mut state = self.state.write();
        if state.key.wallet_type != WalletType::PrivateKey {
            return Err(KeystoreError::InvalidKeyType);
        }
        if let Some(account) = state.accounts.first() {
            return Ok(account.clone());
        }
        let secret = state.key.decrypt(password)?;
        let keypair = hd::keypair_from_slice(&secret)?;
        let address = hd::address_of(&keypair);
        let path = DerivationPath::bip44(44, coin.index(), 0, 0, 0)?;
        let account = Account::new(Arc::downgrade(&self.state), address, path);
        state.accounts.push(account.clone());
        debug!(wallet = %self.identifier, "derived raw-key account");
        Ok(account)
    }

    /// Returns accounts for the given paths on an HD wallet, reusing
    /// cached entries. The mnemonic is decrypted at most once per call,
    /// and only if some path is missing from the cache.
    pub fn get_accounts(
        &self,
        paths: &[DerivationPath],
        password: &str,
    ) -> Result<Vec<Account>, KeystoreError> {
        let mut state = self.state.write();
        if state.key.wallet_type != WalletType::Mnemonic {
            return Err(KeystoreError::InvalidKeyType);
        }
        let passphrase = state.key.passphrase.clone();
        let mut phrase = None;
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(account) = state
                .accounts
                .iter()
                .find(|account| account.derivation_path() == path)
            {
                out.push(account.clone());
                continue;
            }
            if phrase.is_none() {
                phrase = Some(state.key.decrypt_mnemonic(password)?);
            }
            if let Some(phrase) = phrase.as_ref() {
                let keypair = hd::derive_keypair(phrase, &passphrase, path)?;
                let account = Account::new(
                    Arc::downgrade(&self.state),
                    hd::address_of(&keypair),
                    path.clone(),
                );
                state.accounts.push(account.clone());
                out.push(account);
            }
        }
        debug!(wallet = %self.identifier, count = out.len(), "resolved HD accounts");
        Ok(out)
    }

    pub(crate) fn state(&self) -> &Arc<RwLock<WalletState>> {
        &self.state
    }
}

impl PartialEq for Wallet {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Wallet {}

impl std::hash::Hash for Wallet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWORD: &str = "password";
    const PHRASE: &str = "often tobacco bread scare imitate song kind common bar forest yard wisdom";

    fn hd_wallet() -> Wallet {
        let key = KeystoreKey::from_mnemonic(PASSWORD, PHRASE, "").unwrap();
        Wallet::new(PathBuf::from("/tmp/UTC--test--hd"), key)
    }

    fn raw_wallet() -> Wallet {
        let secret =
            hex::decode("d6ddd607fb6508cb48cbb0492495be247a3476f4b140473e23a829e722fd4968")
                .unwrap();
        let key = KeystoreKey::from_private_key(PASSWORD, &secret, Some(Coin::ETHEREUM)).unwrap();
        Wallet::new(PathBuf::from("/tmp/UTC--test--raw"), key)
    }

    #[test]
    fn test_identity_by_file_basename() {
        let a = hd_wallet();
        let b = hd_wallet();
        assert_eq!(a, b);
        let c = raw_wallet();
        assert_ne!(a, c);
    }

    #[test]
    fn test_get_account_type_check() {
        let wallet = hd_wallet();
        assert!(matches!(
            wallet.get_account(PASSWORD, Coin::ETHEREUM),
            Err(KeystoreError::InvalidKeyType)
        ));
    }

    #[test]
    fn test_get_accounts_type_check() {
        let wallet = raw_wallet();
        let path: DerivationPath = "m/44'/60'/0'/0/0".parse().unwrap();
        assert!(matches!(
            wallet.get_accounts(&[path], PASSWORD),
            Err(KeystoreError::InvalidKeyType)
        ));
    }

    #[test]
    fn test_raw_account_cached_without_password() {
        let wallet = raw_wallet();
        let first = wallet.get_account(PASSWORD, Coin::ETHEREUM).unwrap();
        assert_eq!(
            first.address(),
            "0x80Ef37236418320C0f7a55A84cCaa7e080cDFb17"
        );
        // Cache hit: password is never checked.
        let again = wallet.get_account("not the password", Coin::ETHEREUM).unwrap();
        assert_eq!(again.address(), first.address());
        assert_eq!(wallet.accounts().len(), 1);
    }

    #[test]
    fn test_hd_accounts_order_and_cache() {
        let wallet = hd_wallet();
        let eth: DerivationPath = "m/44'/60'/0'/0/0".parse().unwrap();
        let second: DerivationPath = "m/44'/60'/0'/0/1".parse().unwrap();
        let accounts = wallet
            .get_accounts(&[eth.clone(), second.clone()], PASSWORD)
            .unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].derivation_path(), &eth);
        assert_eq!(accounts[1].derivation_path(), &second);

        let again = wallet.get_accounts(&[second, eth], PASSWORD).unwrap();
        assert_eq!(again[0].address(), accounts[1].address());
        assert_eq!(again[1].address(), accounts[0].address());
        assert_eq!(wallet.accounts().len(), 2);
    }

    #[test]
    fn test_wrong_password_surfaces() {
        let wallet = hd_wallet();
        let path: DerivationPath = "m/44'/60'/0'/0/0".parse().unwrap();
        assert!(matches!(
            wallet.get_accounts(&[path], "password123"),
            Err(KeystoreError::InvalidPassword)
        ));
    }
}
