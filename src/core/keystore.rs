//! The directory-backed wallet collection.
//!
//! Every wallet is one JSON file named `UTC--<timestamp>--<uuid>`.
//! Mutating operations rewrite the owning file before returning, with
//! the current account cache persisted as `activeAccounts`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::core::account::Account;
use crate::core::container::{mnemonic_from_bytes, Coin, KeystoreKey, WalletType};
use crate::core::derivation::DerivationPath;
use crate::core::errors::KeystoreError;
use crate::core::wallet::Wallet;
use crate::crypto::hd;

/// Manages all wallets under one directory.
pub struct Keystore {
    directory: PathBuf,
    wallets: Vec<Wallet>,
}

impl Keystore {
    /// Opens the keystore, creating the directory if needed and
    /// loading every container file in it. Any unreadable or
    /// unparseable file fails the open.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, KeystoreError> {
        let directory = directory.into();
        if !directory.exists() {
            fs::create_dir_all(&directory)?;
        }
        let mut paths = Vec::new();
        for entry in fs::read_dir(&directory)? {
            paths.push(entry?.path());
        }
        paths.sort();

        let mut wallets = Vec::with_capacity(paths.len());
        for path in paths {
            let key = KeystoreKey::load(&path)?;
            let wallet = Wallet::new(path, key);
            wallet.restore_cached_accounts();
            wallets.push(wallet);
        }
        info!(directory = %directory.display(), count = wallets.len(), "keystore opened");
        Ok(Self { directory, wallets })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    /// Creates a wallet around a freshly generated mnemonic and
    /// derives accounts at the given paths.
    pub fn create_wallet(
        &mut self,
        password: &str,
        paths: &[DerivationPath],
    ) -> Result<Wallet, KeystoreError> {
        let key = KeystoreKey::generate(password)?;
        let wallet = Wallet::new(self.next_file(), key);
        wallet.get_accounts(paths, password)?;
        self.register(wallet)
    }

    /// Imports a raw private key, deriving its single account.
    pub fn import_private_key(
        &mut self,
        key: &[u8],
        password: &str,
        coin: Coin,
    ) -> Result<Wallet, KeystoreError> {
        let container = KeystoreKey::from_private_key(password, key, Some(coin))?;
        let wallet = Wallet::new(self.next_file(), container);
        wallet.get_account(password, coin)?;
        self.register(wallet)
    }

    /// Imports a mnemonic phrase, deriving accounts at the given paths.
    pub fn import_mnemonic(
        &mut self,
        phrase: &str,
        passphrase: &str,
        password: &str,
        paths: &[DerivationPath],
    ) -> Result<Wallet, KeystoreError> {
        hd::validate_mnemonic(phrase)?;
        let key = KeystoreKey::from_mnemonic(password, phrase, passphrase)?;
        let wallet = Wallet::new(self.next_file(), key);
        wallet.get_accounts(paths, password)?;
        self.register(wallet)
    }

    /// Imports an encrypted JSON document, re-encrypting its payload
    /// under `new_password`. The document's own coin wins over the
    /// caller's; the BIP39 passphrase is not part of the document and
    /// cannot be recovered.
    pub fn import_json(
        &mut self,
        json: &str,
        password: &str,
        new_password: &str,
        coin: Coin,
    ) -> Result<Wallet, KeystoreError> {
        let key = KeystoreKey::from_json(json)?;
        let payload = key.decrypt(password)?;
        match key.wallet_type {
            WalletType::PrivateKey => {
                self.import_private_key(&payload, new_password, key.coin.unwrap_or(coin))
            }
            WalletType::Mnemonic => {
                let phrase = mnemonic_from_bytes(&payload)?;
                let path = DerivationPath::bip44(44, coin.index(), 0, 0, 0)?;
                self.import_mnemonic(&phrase, "", new_password, &[path])
            }
        }
    }

    /// Derives additional accounts on a wallet and persists them.
    pub fn add_accounts(
        &mut self,
        wallet: &Wallet,
        paths: &[DerivationPath],
        password: &str,
    ) -> Result<Vec<Account>, KeystoreError> {
        let accounts = wallet.get_accounts(paths, password)?;
        self.save(wallet)?;
        Ok(accounts)
    }

    /// Exports a wallet as a fresh encrypted JSON document under a new
    /// password. HD wallets keep their in-memory passphrase.
    pub fn export(
        &self,
        wallet: &Wallet,
        password: &str,
        new_password: &str,
    ) -> Result<String, KeystoreError> {
        let key = wallet.state().read().key().clone();
        let payload = key.decrypt(password)?;
        let fresh = match key.wallet_type {
            WalletType::PrivateKey => KeystoreKey::from_private_key(new_password, &payload, None)?,
            WalletType::Mnemonic => {
                let phrase = mnemonic_from_bytes(&payload)?;
                KeystoreKey::from_mnemonic(new_password, &phrase, &key.passphrase)?
            }
        };
        fresh.to_json()
    }

    /// Exports the decrypted payload as raw private key bytes.
    pub fn export_private_key(
        &self,
        wallet: &Wallet,
        password: &str,
    ) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
        let key = wallet.state().read().key().clone();
        key.decrypt(password)
    }

    /// Exports the mnemonic phrase of an HD wallet.
    pub fn export_mnemonic(
        &self,
        wallet: &Wallet,
        password: &str,
    ) -> Result<Zeroizing<String>, KeystoreError> {
        let key = wallet.state().read().key().clone();
        let payload = key.decrypt(password)?;
        match key.wallet_type {
            WalletType::PrivateKey => Err(KeystoreError::InvalidMnemonic),
            WalletType::Mnemonic => mnemonic_from_bytes(&payload),
        }
    }

    /// Deletes the wallet's file and drops it from the registry. The
    /// registry entry survives if the file removal fails.
    pub fn delete(&mut self, wallet: &Wallet) -> Result<(), KeystoreError> {
        let index = self
            .wallets
            .iter()
            .position(|candidate| candidate == wallet)
            .ok_or(KeystoreError::MissingWallet)?;
        fs::remove_file(wallet.file())?;
        self.wallets.remove(index);
        info!(wallet = %wallet.identifier(), "wallet deleted");
        Ok(())
    }

    fn register(&mut self, wallet: Wallet) -> Result<Wallet, KeystoreError> {
        self.save(&wallet)?;
        self.wallets.push(wallet.clone());
        info!(wallet = %wallet.identifier(), "wallet registered");
        Ok(wallet)
    }

    fn save(&self, wallet: &Wallet) -> Result<(), KeystoreError> {
        let json = {
            let mut state = wallet.state().write();
            let records = state
                .accounts()
                .iter()
                .map(Account::to_record)
                .collect::<Vec<_>>();
            state.key_mut().active_accounts = records;
            state.key().to_json()?
        };
        fs::write(wallet.file(), json)?;
        debug!(wallet = %wallet.identifier(), "wallet persisted");
        Ok(())
    }

    fn next_file(&self) -> PathBuf {
        self.directory.join(generate_file_name())
    }
}

/// `UTC--<timestamp>--<uuid>`, sortable by creation time.
fn generate_file_name() -> String {
    format!(
        "{}{}",
        Utc::now().format("UTC--%Y-%m-%dT%H-%M-%S%.3f--"),
        Uuid::new_v4()
    )
}
