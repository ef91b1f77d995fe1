//! File-backed store and application used by the `oracle-node` binary.
//!
//! Layout under the node root:
//! ```text
//! <ROOT>/
//! ├── node.json        (store state, mode 0600)
//! └── tempkeys/        (key files waiting to be synced, mode 0700)
//!     └── <address>.json
//! ```
//!
//! Key files hold an address and a salted password verifier. Signing is not
//! done here, so no secret key material is written.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::app::models::digest;
use crate::app::{
    Account, AccountBalance, AppFactory, Application, OnConnect, ServiceError, Store, User,
};
use crate::config::Config;
use crate::orm_log::{OrmEvent, OrmLogger};

const STATE_FILE: &str = "node.json";

/// On-disk key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    pub address: String,
    /// `{salt_hex}${sha256_hex}` of the keystore password.
    pub verifier: String,
}

impl KeyFile {
    fn verify(&self, password: &str) -> bool {
        match self.verifier.split_once('$') {
            Some((salt, expected)) => digest(salt, password) == expected,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountState {
    nonce: u64,
    last_nonce: u64,
    #[serde(default = "zero")]
    eth_balance: String,
    #[serde(default = "zero")]
    link_balance: String,
}

impl Default for AccountState {
    fn default() -> Self {
        Self { nonce: 0, last_nonce: 0, eth_balance: zero(), link_balance: zero() }
    }
}

fn zero() -> String {
    "0".to_string()
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    keys: BTreeMap<String, KeyFile>,
    #[serde(default)]
    accounts: BTreeMap<String, AccountState>,
}

/// Store persisted as a single JSON document under the node root.
pub struct LocalStore {
    config: Config,
    path: PathBuf,
    state: Mutex<StoreState>,
    unlocked: AtomicBool,
    orm: OrmLogger,
}

impl LocalStore {
    /// Open (or create) the store rooted at `config.root_dir()`.
    pub fn open(config: Config) -> Result<Self, ServiceError> {
        let root = config.root_dir();
        if !root.exists() {
            create_owner_only_dir(&root)?;
        }
        let path = root.join(STATE_FILE);
        let state = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            StoreState::default()
        };
        debug!(path = %path.display(), "store opened");

        Ok(Self {
            config,
            path,
            state: Mutex::new(state),
            unlocked: AtomicBool::new(false),
            orm: OrmLogger::from_current(),
        })
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    /// Record the nonces for `address`, creating the account row if needed.
    pub fn set_nonces(&self, address: &str, nonce: u64, last_nonce: u64) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let account = state.accounts.entry(address.to_string()).or_default();
        account.nonce = nonce;
        account.last_nonce = last_nonce;
        self.persist("UPDATE accounts SET nonce", &state, 1)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Other("store state lock poisoned".into()))
    }

    /// Write the whole state atomically (temp file + rename), mode 0600.
    fn persist(&self, query: &str, state: &StoreState, rows: usize) -> Result<(), ServiceError> {
        let started = Instant::now();
        let tmp = self.path.with_extension("json.tmp");
        let result = write_owner_only(&tmp, serde_json::to_vec_pretty(state)?.as_slice())
            .and_then(|()| fs::rename(&tmp, &self.path));

        match result {
            Ok(()) => {
                self.orm.log(OrmEvent::Sql {
                    query: query.to_string(),
                    duration: json!(started.elapsed().as_micros() as u64),
                    rows_affected: json!(rows),
                });
                Ok(())
            }
            Err(e) => {
                self.orm.log(OrmEvent::Error { cause: json!(e.to_string()) });
                Err(e.into())
            }
        }
    }

    fn balances(&self, pick: fn(&AccountState) -> &String) -> Result<Vec<AccountBalance>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .keys
            .keys()
            .map(|address| AccountBalance {
                address: address.clone(),
                balance: state.accounts.get(address).map(pick).cloned().unwrap_or_else(zero),
            })
            .collect())
    }
}

impl Store for LocalStore {
    fn config(&self) -> &Config {
        &self.config
    }

    fn next_active_account(&self) -> Option<Account> {
        let state = self.lock().ok()?;
        let address = state.keys.keys().next()?;
        let nonce = state.accounts.get(address).map(|a| a.nonce).unwrap_or_default();
        Some(Account { address: address.clone(), nonce })
    }

    fn last_nonce(&self, address: &str) -> Result<u64, ServiceError> {
        let state = self.lock()?;
        Ok(state.accounts.get(address).map(|a| a.last_nonce).unwrap_or_default())
    }

    fn eth_balances(&self) -> Result<Vec<AccountBalance>, ServiceError> {
        self.balances(|a| &a.eth_balance)
    }

    fn link_balances(&self) -> Result<Vec<AccountBalance>, ServiceError> {
        self.balances(|a| &a.link_balance)
    }

    fn accounts(&self) -> Result<Vec<Account>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .keys
            .keys()
            .map(|address| Account {
                address: address.clone(),
                nonce: state.accounts.get(address).map(|a| a.nonce).unwrap_or_default(),
            })
            .collect())
    }

    fn create_account(&self, password: &str) -> Result<Account, ServiceError> {
        let mut raw = [0u8; 20];
        OsRng.fill_bytes(&mut raw);
        let address = format!("0x{}", hex::encode(raw));

        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let key = KeyFile { address: address.clone(), verifier: format!("{salt}${}", digest(&salt, password)) };

        let keys_dir = self.config.keys_dir();
        if !keys_dir.exists() {
            create_owner_only_dir(&keys_dir)?;
        }
        write_owner_only(&keys_dir.join(format!("{address}.json")), &serde_json::to_vec_pretty(&key)?)?;

        let mut state = self.lock()?;
        state.keys.insert(address.clone(), key);
        state.accounts.entry(address.clone()).or_default();
        self.persist("INSERT INTO keys", &state, 1)?;
        info!(%address, "created keystore account");

        Ok(Account { address, nonce: 0 })
    }

    fn unlock(&self, password: &str) -> Result<(), ServiceError> {
        let state = self.lock()?;
        if state.keys.is_empty() {
            return Err(ServiceError::Keystore("no accounts in keystore".into()));
        }
        if let Some(key) = state.keys.values().find(|k| !k.verify(password)) {
            return Err(ServiceError::Keystore(format!("invalid password for {}", key.address)));
        }
        self.unlocked.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn find_user(&self) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.user.clone())
    }

    fn save_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.user = Some(user.clone());
        self.persist("INSERT INTO users", &state, 1)
    }

    fn delete_user(&self) -> Result<User, ServiceError> {
        let mut state = self.lock()?;
        let user = state.user.take().ok_or_else(|| ServiceError::NotFound("API user".into()))?;
        self.persist("DELETE FROM users", &state, 1)?;
        Ok(user)
    }

    fn sync_disk_keystore(&self) -> Result<(), ServiceError> {
        let keys_dir = self.config.keys_dir();
        let mut loaded = Vec::new();
        if keys_dir.exists() {
            for entry in fs::read_dir(&keys_dir)? {
                let path = entry?.path();
                if path.is_file() {
                    let key: KeyFile = serde_json::from_slice(&fs::read(&path)?)?;
                    loaded.push(key);
                }
            }
        }

        let mut state = self.lock()?;
        let rows = loaded.len();
        for key in loaded {
            state.accounts.entry(key.address.clone()).or_default();
            state.keys.insert(key.address.clone(), key);
        }
        self.persist("UPSERT INTO keys", &state, rows)?;
        debug!(keys = rows, dir = %keys_dir.display(), "synced disk keystore");
        Ok(())
    }
}

/// Node application backed by a [`LocalStore`].
pub struct NodeApplication {
    store: LocalStore,
    running: AtomicBool,
}

impl NodeApplication {
    pub fn new(store: LocalStore) -> Self {
        Self { store, running: AtomicBool::new(false) }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Application for NodeApplication {
    fn store(&self) -> &dyn Store {
        &self.store
    }

    fn start(&self) -> Result<(), ServiceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::Other("application already started".into()));
        }
        let config = self.store.config();
        info!(
            chain_id = config.eth_chain_id(),
            port = config.port(),
            replay_from_block = ?config.replay_from_block(),
            "node services started"
        );
        Ok(())
    }

    /// Idempotent: stopping a node that never started is a no-op.
    fn stop(&self) -> Result<(), ServiceError> {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("node services stopped");
        }
        Ok(())
    }
}

/// Builds [`NodeApplication`]s from config.
#[derive(Debug, Default)]
pub struct LocalAppFactory;

impl AppFactory for LocalAppFactory {
    fn new_application(
        &self,
        config: &Config,
        on_connect: Option<OnConnect>,
    ) -> Result<Arc<dyn Application>, ServiceError> {
        let app: Arc<dyn Application> = Arc::new(NodeApplication::new(LocalStore::open(config.clone())?));
        if let Some(hook) = on_connect {
            hook(app.as_ref());
        }
        Ok(app)
    }
}

// ── internals ────────────────────────────────────────────────────────────────

pub(crate) fn create_owner_only_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(bytes)
}

// ── tests ─────────────────────────────────────────────────────────────────────
