use colored::*;
use eyre::{Result, WrapErr, bail, ensure, eyre};
use log::*;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use alloy::primitives::hex;

use crate::{
    depositdata::{BLSPubkey, BLSSignature, signer::BLS_DST},
    errors::DepositError,
};

pub trait PublicKeyProvider {
    fn public_key(&self) -> Result<BLSPubkey>;
}

/// Aggregate key of a distributed account
pub trait CompositePublicKeyProvider {
    fn composite_public_key(&self) -> Result<BLSPubkey>;
}

pub trait Locker {
    fn is_unlocked(&self) -> Result<bool>;
    fn unlock(&self, passphrase: &str) -> Result<()>;
    fn lock(&self) -> Result<()>;
}

pub trait Signer {
    /// BLS signature over `message` with the consensus DST
    fn sign(&self, message: &[u8]) -> Result<BLSSignature>;
}

/// A named account with optional capabilities. Callers probe for what they
/// need instead of requiring every backend to implement everything.
pub trait Account: Send + Sync {
    fn name(&self) -> &str;

    fn as_public_key_provider(&self) -> Option<&dyn PublicKeyProvider> {
        None
    }

    fn as_composite_public_key_provider(&self) -> Option<&dyn CompositePublicKeyProvider> {
        None
    }

    fn as_locker(&self) -> Option<&dyn Locker> {
        None
    }

    fn as_signer(&self) -> Option<&dyn Signer> {
        None
    }
}

type PublicKeySource = fn(&dyn Account) -> Option<Result<BLSPubkey>>;

fn composite_public_key(account: &dyn Account) -> Option<Result<BLSPubkey>> {
    account
        .as_composite_public_key_provider()
        .map(|provider| provider.composite_public_key())
}

fn plain_public_key(account: &dyn Account) -> Option<Result<BLSPubkey>> {
    account
        .as_public_key_provider()
        .map(|provider| provider.public_key())
}

// First capability present wins
const PUBLIC_KEY_PREFERENCE: &[PublicKeySource] = &[composite_public_key, plain_public_key];

/// The public key deposits for this account should be made to
pub fn best_public_key(account: &dyn Account) -> Result<BLSPubkey, DepositError> {
    let source = PUBLIC_KEY_PREFERENCE
        .iter()
        .find_map(|source| source(account))
        .ok_or(DepositError::NoPublicKeyCapability)?;
    source.map_err(|e| DepositError::AccountResolution {
        path: account.name().to_string(),
        reason: format!("{:#}", e),
    })
}

/// Relocks the account when dropped, but only if this guard unlocked it
#[must_use = "the account is relocked as soon as the guard is dropped"]
pub struct UnlockGuard<'a> {
    name: &'a str,
    locker: Option<&'a dyn Locker>,
}

impl UnlockGuard<'_> {
    pub fn relocks(&self) -> bool {
        self.locker.is_some()
    }
}

impl Drop for UnlockGuard<'_> {
    fn drop(&mut self) {
        if let Some(locker) = self.locker.take() {
            match locker.lock() {
                Ok(_) => trace!("Relocked {}", self.name),
                Err(e) => warn!("Failed to relock {}: {:#}", self.name.white().bold(), e),
            }
        }
    }
}

/// Ensures the account is unlocked, trying each passphrase in turn. Accounts
/// without a locker, or already unlocked, are left as they are.
pub fn unlock<'a>(
    account: &'a dyn Account,
    passphrases: &[String],
) -> Result<UnlockGuard<'a>, DepositError> {
    let mut guard = UnlockGuard {
        name: account.name(),
        locker: None,
    };
    let Some(locker) = account.as_locker() else {
        return Ok(guard);
    };
    let unlocked = locker
        .is_unlocked()
        .map_err(|e| DepositError::SigningFailed(format!("{:#}", e)))?;
    if unlocked {
        return Ok(guard);
    }
    for (i, passphrase) in passphrases.iter().enumerate() {
        match locker.unlock(passphrase) {
            Ok(_) => {
                debug!("Unlocked {} with passphrase #{}", account.name(), i + 1);
                guard.locker = Some(locker);
                return Ok(guard);
            }
            Err(e) => trace!("Passphrase #{} rejected by {}: {:#}", i + 1, account.name(), e),
        }
    }
    Err(DepositError::SigningFailed(format!(
        "failed to unlock account {}",
        account.name()
    )))
}

/// EIP-2335 keystore backed account, locked until a passphrase decrypts it
#[derive(Debug)]
pub struct KeystoreAccount {
    pub name: String,
    pub uuid: String,
    pub pubkey: BLSPubkey,
    pub keypath: PathBuf,
    secret: Mutex<Vec<u8>>,
}

impl KeystoreAccount {
    pub fn from_keyfile(wallet: &str, keypath: &Path) -> Result<KeystoreAccount> {
        trace!("Reading keystore {}", keypath.display());
        let file = std::fs::File::open(keypath)
            .wrap_err_with(|| format!("failed to open {}", keypath.display()))?;
        let json = serde_json::from_reader::<_, Value>(&file)
            .wrap_err_with(|| format!("failed to parse {}", keypath.display()))?;
        let uuid = json
            .get("uuid")
            .or_else(|| json.get("id"))
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        let pubkey = json
            .get("pubkey")
            .and_then(|value| value.as_str())
            .ok_or_else(|| eyre!("{} has no pubkey", keypath.display()))?;
        let pubkey = hex::decode(pubkey)
            .ok()
            .and_then(|bytes| BLSPubkey::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| eyre!("{} has an invalid pubkey", keypath.display()))?;
        // name is optional, deposit-cli keystores only carry a path
        let name = match json.get("name").and_then(|value| value.as_str()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => keypath
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        trace!("Loading account {}/{}\n  uuid: {}\n  pubkey: {}", wallet, name, uuid, pubkey);
        Ok(KeystoreAccount {
            name: format!("{}/{}", wallet, name),
            uuid: uuid.to_string(),
            pubkey,
            keypath: keypath.to_path_buf(),
            secret: Mutex::new(Vec::new()),
        })
    }

    fn secret_key(&self) -> Result<blst::min_pk::SecretKey> {
        let secret = self.secret.lock().unwrap();
        ensure!(!secret.is_empty(), "account {} is locked", self.name);
        blst::min_pk::SecretKey::from_bytes(&secret)
            .map_err(|e| eyre!("invalid secret key: {:?}", e))
    }
}

impl PublicKeyProvider for KeystoreAccount {
    fn public_key(&self) -> Result<BLSPubkey> {
        Ok(self.pubkey)
    }
}

impl Locker for KeystoreAccount {
    fn is_unlocked(&self) -> Result<bool> {
        Ok(!self.secret.lock().unwrap().is_empty())
    }

    fn unlock(&self, passphrase: &str) -> Result<()> {
        let key = eth_keystore::decrypt_key(&self.keypath, passphrase)?;
        let sk = blst::min_pk::SecretKey::from_bytes(&key)
            .map_err(|e| eyre!("invalid secret key: {:?}", e))?;
        let pubkey = BLSPubkey::from(sk.sk_to_pk().compress());
        debug!("unlocked pubkey: {}", pubkey);
        if pubkey != self.pubkey {
            bail!("keystore {} secret does not match its pubkey", self.keypath.display());
        }
        *self.secret.lock().unwrap() = key;
        Ok(())
    }

    fn lock(&self) -> Result<()> {
        *self.secret.lock().unwrap() = Vec::new();
        Ok(())
    }
}

impl Signer for KeystoreAccount {
    fn sign(&self, message: &[u8]) -> Result<BLSSignature> {
        let sk = self.secret_key()?;
        Ok(sk.sign(message, BLS_DST, &[]).compress().into())
    }
}

impl Account for KeystoreAccount {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_public_key_provider(&self) -> Option<&dyn PublicKeyProvider> {
        Some(self)
    }

    fn as_locker(&self) -> Option<&dyn Locker> {
        Some(self)
    }

    fn as_signer(&self) -> Option<&dyn Signer> {
        Some(self)
    }
}

/// A directory of keystores, accounts sorted by name
#[derive(Debug)]
pub struct Wallet {
    pub name: String,
    pub accounts: Vec<Arc<KeystoreAccount>>,
}

impl Wallet {
    pub fn open(datadir: &Path, name: &str) -> Result<Wallet> {
        let dir = datadir.join("wallets").join(name);
        if !dir.is_dir() {
            bail!("wallet {} not found in {}", name, datadir.display());
        }
        let mut keypaths = std::fs::read_dir(&dir)
            .wrap_err_with(|| format!("failed to read {}", dir.display()))?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        keypaths.retain(|path| path.extension().is_some_and(|ext| ext == "json"));
        keypaths.sort();

        let mut names = HashSet::new();
        let mut accounts = Vec::new();
        for keypath in keypaths {
            let account = KeystoreAccount::from_keyfile(name, &keypath)?;
            if !names.insert(account.name.clone()) {
                warn!(
                    "Duplicate account {}, ignoring {}",
                    account.name.white().bold(),
                    keypath.display()
                );
                continue;
            }
            accounts.push(Arc::new(account));
        }
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Wallet {
            name: name.to_string(),
            accounts,
        })
    }
}

/// Resolves `wallet/account` paths to accounts
pub trait AccountResolver {
    /// All accounts matching `wallet/pattern`, sorted by name. An empty
    /// pattern matches every account in the wallet.
    fn accounts(&self, path: &str) -> Result<Vec<Arc<dyn Account>>, DepositError>;

    /// The single account named exactly `wallet/name`
    fn account(&self, path: &str) -> Result<Arc<dyn Account>, DepositError>;
}

fn split_path(path: &str) -> Result<(&str, &str), DepositError> {
    let (wallet, spec) = path.split_once('/').unwrap_or((path, ""));
    if wallet.is_empty() {
        return Err(DepositError::AccountResolution {
            path: path.to_string(),
            reason: "missing wallet name".into(),
        });
    }
    Ok((wallet, spec))
}

fn account_pattern(spec: &str) -> std::result::Result<Regex, regex::Error> {
    match spec {
        "" => Regex::new("^.*$"),
        spec => Regex::new(&format!("^(?:{})$", spec)),
    }
}

/// Wallets stored under `<datadir>/wallets`
#[derive(Debug, Clone)]
pub struct Wallets {
    pub datadir: PathBuf,
}

impl Wallets {
    pub fn new(datadir: PathBuf) -> Self {
        Self { datadir }
    }

    fn open(&self, path: &str, wallet: &str) -> Result<Wallet, DepositError> {
        Wallet::open(&self.datadir, wallet).map_err(|e| DepositError::AccountResolution {
            path: path.to_string(),
            reason: format!("{:#}", e),
        })
    }
}

impl AccountResolver for Wallets {
    fn accounts(&self, path: &str) -> Result<Vec<Arc<dyn Account>>, DepositError> {
        let (wallet_name, spec) = split_path(path)?;
        let pattern = account_pattern(spec).map_err(|e| DepositError::AccountResolution {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let wallet = self.open(path, wallet_name)?;
        let accounts: Vec<Arc<dyn Account>> = wallet
            .accounts
            .into_iter()
            .filter(|account| {
                let short = account
                    .name
                    .strip_prefix(wallet_name)
                    .and_then(|name| name.strip_prefix('/'))
                    .unwrap_or(&account.name);
                pattern.is_match(short)
            })
            .map(|account| account as Arc<dyn Account>)
            .collect();
        if accounts.is_empty() {
            return Err(DepositError::UnknownValidatorAccount(path.to_string()));
        }
        Ok(accounts)
    }

    fn account(&self, path: &str) -> Result<Arc<dyn Account>, DepositError> {
        let (wallet_name, _) = split_path(path)?;
        let wallet = self.open(path, wallet_name)?;
        wallet
            .accounts
            .into_iter()
            .find(|account| account.name == path)
            .map(|account| account as Arc<dyn Account>)
            .ok_or_else(|| DepositError::AccountResolution {
                path: path.to_string(),
                reason: "no such account".into(),
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use super::*;
    use crate::depositdata::signer::tests::{INTEROP_KEYS, MemoryAccount, SIGNATURE, SIGNING_ROOT};

    pub(crate) const PASSWORD: &str = "testpassword";

    /// Writes an EIP-2335 keystore for interop key `index` into `wallet`
    pub(crate) fn write_keystore(
        datadir: &Path,
        wallet: &str,
        filename: &str,
        name: Option<&str>,
        index: usize,
    ) -> PathBuf {
        let dir = datadir.join("wallets").join(wallet);
        std::fs::create_dir_all(&dir).unwrap();
        let mut rng = rand::thread_rng();
        let (secret, pubkey) = INTEROP_KEYS[index];
        eth_keystore::v4::encrypt_key(dir.clone(), &mut rng, &secret, PASSWORD, Some(filename))
            .unwrap();

        let keypath = dir.join(filename);
        let mut json: Value =
            serde_json::from_reader(std::fs::File::open(&keypath).unwrap()).unwrap();
        let object = json.as_object_mut().unwrap();
        object.insert("pubkey".into(), Value::from(hex::encode(pubkey)));
        match name {
            Some(name) => object.insert("name".into(), Value::from(name)),
            None => object.remove("name"),
        };
        std::fs::write(&keypath, serde_json::to_string(&json).unwrap()).unwrap();
        keypath
    }

    struct Composite {
        inner: MemoryAccount,
        aggregate: BLSPubkey,
    }

    impl CompositePublicKeyProvider for Composite {
        fn composite_public_key(&self) -> Result<BLSPubkey> {
            Ok(self.aggregate)
        }
    }

    impl Account for Composite {
        fn name(&self) -> &str {
            &self.inner.name
        }

        fn as_public_key_provider(&self) -> Option<&dyn PublicKeyProvider> {
            Some(&self.inner)
        }

        fn as_composite_public_key_provider(&self) -> Option<&dyn CompositePublicKeyProvider> {
            Some(self)
        }
    }

    struct Bare;

    impl Account for Bare {
        fn name(&self) -> &str {
            "wallet/bare"
        }
    }

    #[derive(Default)]
    struct CountingLocker {
        unlocked: Mutex<bool>,
        locks: AtomicUsize,
        fail_lock: bool,
    }

    impl Locker for CountingLocker {
        fn is_unlocked(&self) -> Result<bool> {
            Ok(*self.unlocked.lock().unwrap())
        }

        fn unlock(&self, passphrase: &str) -> Result<()> {
            ensure!(passphrase == PASSWORD, "wrong passphrase");
            *self.unlocked.lock().unwrap() = true;
            Ok(())
        }

        fn lock(&self) -> Result<()> {
            self.locks.fetch_add(1, Ordering::SeqCst);
            ensure!(!self.fail_lock, "locker unavailable");
            *self.unlocked.lock().unwrap() = false;
            Ok(())
        }
    }

    impl Account for CountingLocker {
        fn name(&self) -> &str {
            "wallet/locked"
        }

        fn as_locker(&self) -> Option<&dyn Locker> {
            Some(self)
        }
    }

    #[test]
    fn composite_key_is_preferred() {
        let account = Composite {
            inner: MemoryAccount::interop("wallet/composite", 0),
            aggregate: BLSPubkey::from(INTEROP_KEYS[1].1),
        };
        assert_eq!(best_public_key(&account).unwrap(), BLSPubkey::from(INTEROP_KEYS[1].1));

        let plain = MemoryAccount::interop("wallet/plain", 0);
        assert_eq!(best_public_key(&plain).unwrap(), BLSPubkey::from(INTEROP_KEYS[0].1));
    }

    #[test]
    fn no_public_key_capability() {
        assert!(matches!(
            best_public_key(&Bare),
            Err(DepositError::NoPublicKeyCapability)
        ));
    }

    #[test]
    fn guard_relocks_what_it_unlocked() {
        let account = CountingLocker::default();
        let passphrases = vec!["nope".to_string(), PASSWORD.to_string()];
        {
            let guard = unlock(&account, &passphrases).unwrap();
            assert!(guard.relocks());
            assert!(account.is_unlocked().unwrap());
        }
        assert!(!account.is_unlocked().unwrap());
        assert_eq!(account.locks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_leaves_unlocked_accounts_alone() {
        let account = CountingLocker::default();
        *account.unlocked.lock().unwrap() = true;
        drop(unlock(&account, &[]).unwrap());
        assert!(account.is_unlocked().unwrap());
        assert_eq!(account.locks.load(Ordering::SeqCst), 0);

        // Nothing to unlock
        assert!(!unlock(&Bare, &[]).unwrap().relocks());
    }

    #[test]
    fn guard_relocks_on_error_path() {
        fn failing(account: &dyn Account) -> Result<(), DepositError> {
            let _guard = unlock(account, &[PASSWORD.to_string()])?;
            Err(DepositError::SignatureVerificationFailed)
        }
        let account = CountingLocker::default();
        assert!(failing(&account).is_err());
        assert!(!account.is_unlocked().unwrap());
        assert_eq!(account.locks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_relock_is_not_fatal() {
        let account = CountingLocker {
            fail_lock: true,
            ..Default::default()
        };
        drop(unlock(&account, &[PASSWORD.to_string()]).unwrap());
        assert_eq!(account.locks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wrong_passphrases() {
        let account = CountingLocker::default();
        assert!(matches!(
            unlock(&account, &["a".to_string(), "b".to_string()]),
            Err(DepositError::SigningFailed(_))
        ));
        assert!(matches!(unlock(&account, &[]), Err(DepositError::SigningFailed(_))));
    }

    #[test]
    fn keystore_unlock_and_sign() {
        let datadir = TempDir::new().unwrap();
        write_keystore(datadir.path(), "validators", "keystore-0.json", Some("validator-0"), 0);

        let wallets = Wallets::new(datadir.path().to_path_buf());
        let account = wallets.account("validators/validator-0").unwrap();
        assert_eq!(account.name(), "validators/validator-0");
        assert_eq!(best_public_key(account.as_ref()).unwrap(), BLSPubkey::from(INTEROP_KEYS[0].1));

        let signer = account.as_signer().unwrap();
        assert!(signer.sign(b"message").is_err(), "locked account must not sign");

        let passphrases = vec!["wrong".to_string(), PASSWORD.to_string()];
        let signature = {
            let _guard = unlock(account.as_ref(), &passphrases).unwrap();
            signer.sign(&SIGNING_ROOT).unwrap()
        };
        assert!(!account.as_locker().unwrap().is_unlocked().unwrap());
        assert_eq!(signature, BLSSignature::from(SIGNATURE));
    }

    #[test]
    fn keystore_with_foreign_pubkey_does_not_unlock() {
        let datadir = TempDir::new().unwrap();
        let keypath = write_keystore(datadir.path(), "w", "k.json", Some("v"), 0);
        let mut json: Value =
            serde_json::from_reader(std::fs::File::open(&keypath).unwrap()).unwrap();
        json["pubkey"] = Value::from(hex::encode(INTEROP_KEYS[1].1));
        std::fs::write(&keypath, serde_json::to_string(&json).unwrap()).unwrap();

        let account = KeystoreAccount::from_keyfile("w", &keypath).unwrap();
        assert!(account.unlock(PASSWORD).is_err());
        assert!(!account.is_unlocked().unwrap());
    }

    #[test]
    fn pattern_matching_is_anchored_and_sorted() {
        let datadir = TempDir::new().unwrap();
        write_keystore(datadir.path(), "w", "b.json", Some("validator-2"), 1);
        write_keystore(datadir.path(), "w", "a.json", Some("validator-1"), 0);
        write_keystore(datadir.path(), "w", "c.json", Some("other"), 0);
        // Name falls back to the file stem
        write_keystore(datadir.path(), "w", "validator-10.json", None, 1);
        let wallets = Wallets::new(datadir.path().to_path_buf());

        let names = |path: &str| -> Vec<String> {
            wallets
                .accounts(path)
                .unwrap()
                .iter()
                .map(|account| account.name().to_string())
                .collect()
        };
        assert_eq!(names("w/validator-[0-9]"), vec!["w/validator-1", "w/validator-2"]);
        assert_eq!(
            names("w/validator-.*"),
            vec!["w/validator-1", "w/validator-10", "w/validator-2"]
        );
        assert_eq!(names("w"), names("w/"));
        assert_eq!(names("w").len(), 4);
        assert_eq!(names("w/other"), vec!["w/other"]);
        // Alternation is anchored as a whole
        assert_eq!(names("w/validator-1|other"), vec!["w/other", "w/validator-1"]);
        assert_eq!(names("w/oth|validator-2"), vec!["w/validator-2"]);

        assert!(matches!(
            wallets.accounts("w/validator"),
            Err(DepositError::UnknownValidatorAccount(_))
        ));
        assert!(matches!(
            wallets.accounts("w/valid(ator"),
            Err(DepositError::AccountResolution { .. })
        ));
        assert!(matches!(
            wallets.accounts("missing/validator-1"),
            Err(DepositError::AccountResolution { .. })
        ));
        assert!(matches!(
            wallets.account("w/validator"),
            Err(DepositError::AccountResolution { .. })
        ));
    }

    #[test]
    fn duplicate_names_keep_first() {
        let datadir = TempDir::new().unwrap();
        write_keystore(datadir.path(), "w", "1.json", Some("dup"), 0);
        write_keystore(datadir.path(), "w", "2.json", Some("dup"), 1);
        let wallet = Wallet::open(datadir.path(), "w").unwrap();
        assert_eq!(wallet.accounts.len(), 1);
        assert_eq!(wallet.accounts[0].pubkey, BLSPubkey::from(INTEROP_KEYS[0].1));
    }
}
