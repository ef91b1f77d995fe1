//! In-memory doubles for unit tests.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::Mutex;

use crate::app::{
    Account, AccountBalance, AppFactory, Application, OnConnect, ServiceError, Store, User,
};
use crate::bootstrap::api::{ApiCredentials, ApiInitError, ApiInitializer};
use crate::config::Config;
use crate::prompt::Prompter;

#[derive(Default)]
struct MemoryState {
    accounts: Vec<Account>,
    password: Option<String>,
    unlocked_with: Option<String>,
    last_nonce: u64,
    user: Option<User>,
    fail_nonce_lookup: bool,
    fail_accounts: bool,
    fail_users: bool,
    fail_sync: bool,
    sync_calls: usize,
    nonce_lookups: usize,
    eth_balance_reads: usize,
}

/// Store backed by a mutex-guarded struct, with switchable failures.
pub struct MemoryStore {
    config: Config,
    state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            config: Config::test_default(Path::new("/tmp/oracle-node-test")),
            state: Mutex::new(MemoryState::default()),
        }
    }
}

impl MemoryStore {
    /// Password of accounts created by [`MemoryStore::with_account`].
    pub const PASSWORD: &'static str = "correct horse";

    pub fn with_account(address: &str, nonce: u64) -> Self {
        let store = Self::default();
        {
            let mut state = store.state();
            state.accounts.push(Account { address: address.to_string(), nonce });
            state.password = Some(Self::PASSWORD.to_string());
        }
        store
    }

    pub fn unlocked_with(&self) -> Option<String> {
        self.state().unlocked_with.clone()
    }

    pub fn set_last_nonce(&self, nonce: u64) {
        self.state().last_nonce = nonce;
    }

    pub fn fail_nonce_lookup(&self) {
        self.state().fail_nonce_lookup = true;
    }

    /// Makes account and balance lookups fail.
    pub fn fail_accounts(&self) {
        self.state().fail_accounts = true;
    }

    pub fn fail_users(&self) {
        self.state().fail_users = true;
    }

    pub fn fail_sync(&self) {
        self.state().fail_sync = true;
    }

    pub fn sync_calls(&self) -> usize {
        self.state().sync_calls
    }

    pub fn nonce_lookups(&self) -> usize {
        self.state().nonce_lookups
    }

    pub fn eth_balance_reads(&self) -> usize {
        self.state().eth_balance_reads
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    fn balances(&self, balance: &str) -> Result<Vec<AccountBalance>, ServiceError> {
        let state = self.state();
        if state.fail_accounts {
            return Err(ServiceError::Other("balances unavailable".into()));
        }
        Ok(state
            .accounts
            .iter()
            .map(|a| AccountBalance { address: a.address.clone(), balance: balance.to_string() })
            .collect())
    }
}

impl Store for MemoryStore {
    fn config(&self) -> &Config {
        &self.config
    }

    fn next_active_account(&self) -> Option<Account> {
        self.state().accounts.first().cloned()
    }

    fn last_nonce(&self, _address: &str) -> Result<u64, ServiceError> {
        let mut state = self.state();
        state.nonce_lookups += 1;
        if state.fail_nonce_lookup {
            return Err(ServiceError::Other("database is locked".into()));
        }
        Ok(state.last_nonce)
    }

    fn eth_balances(&self) -> Result<Vec<AccountBalance>, ServiceError> {
        self.state().eth_balance_reads += 1;
        self.balances("1.5")
    }

    fn link_balances(&self) -> Result<Vec<AccountBalance>, ServiceError> {
        self.balances("100")
    }

    fn accounts(&self) -> Result<Vec<Account>, ServiceError> {
        let state = self.state();
        if state.fail_accounts {
            return Err(ServiceError::Other("keystore unavailable".into()));
        }
        Ok(state.accounts.clone())
    }

    fn create_account(&self, password: &str) -> Result<Account, ServiceError> {
        let mut state = self.state();
        let account = Account { address: format!("0x{:040x}", state.accounts.len() + 1), nonce: 0 };
        state.accounts.push(account.clone());
        state.password = Some(password.to_string());
        Ok(account)
    }

    fn unlock(&self, password: &str) -> Result<(), ServiceError> {
        let mut state = self.state();
        if state.password.as_deref() != Some(password) {
            return Err(ServiceError::Keystore("could not decrypt key with given password".into()));
        }
        state.unlocked_with = Some(password.to_string());
        Ok(())
    }

    fn find_user(&self) -> Result<Option<User>, ServiceError> {
        let state = self.state();
        if state.fail_users {
            return Err(ServiceError::Other("users table unavailable".into()));
        }
        Ok(state.user.clone())
    }

    fn save_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut state = self.state();
        if state.fail_users {
            return Err(ServiceError::Other("users table unavailable".into()));
        }
        state.user = Some(user.clone());
        Ok(())
    }

    fn delete_user(&self) -> Result<User, ServiceError> {
        self.state().user.take().ok_or_else(|| ServiceError::NotFound("API user".into()))
    }

    fn sync_disk_keystore(&self) -> Result<(), ServiceError> {
        let mut state = self.state();
        state.sync_calls += 1;
        if state.fail_sync {
            return Err(ServiceError::Keystore("unreadable key file".into()));
        }
        Ok(())
    }
}

/// Answers prompts from a queue; an exhausted queue reads as a closed terminal.
pub struct ScriptedPrompter {
    terminal: bool,
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedPrompter {
    pub fn new<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            terminal: true,
            answers: Mutex::new(answers.into_iter().map(str::to_string).collect()),
        }
    }

    pub fn headless() -> Self {
        Self { terminal: false, answers: Mutex::new(VecDeque::new()) }
    }

    fn next(&self) -> io::Result<String> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more answers"))
    }
}

impl Prompter for ScriptedPrompter {
    fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn prompt(&self, _label: &str) -> io::Result<String> {
        self.next()
    }

    fn password_prompt(&self, _label: &str) -> io::Result<String> {
        self.next()
    }
}

/// Application that counts lifecycle calls.
pub struct FakeApp {
    store: MemoryStore,
    starts: Cell<usize>,
    stops: Cell<usize>,
    fail_start: Cell<bool>,
    fail_stop: Cell<bool>,
}

impl FakeApp {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            starts: Cell::new(0),
            stops: Cell::new(0),
            fail_start: Cell::new(false),
            fail_stop: Cell::new(false),
        }
    }

    pub fn memory_store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn starts(&self) -> usize {
        self.starts.get()
    }

    pub fn stops(&self) -> usize {
        self.stops.get()
    }

    pub fn fail_start(&self) {
        self.fail_start.set(true);
    }

    pub fn fail_stop(&self) {
        self.fail_stop.set(true);
    }
}

impl Application for FakeApp {
    fn store(&self) -> &dyn Store {
        &self.store
    }

    fn start(&self) -> Result<(), ServiceError> {
        self.starts.set(self.starts.get() + 1);
        if self.fail_start.get() {
            return Err(ServiceError::Other("port 6688 already in use".into()));
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.stops.set(self.stops.get() + 1);
        if self.fail_stop.get() {
            return Err(ServiceError::Other("listener already closed".into()));
        }
        Ok(())
    }
}

/// Hands out one shared [`FakeApp`], running the connect hook like a real factory.
pub struct FakeFactory {
    app: Arc<FakeApp>,
    constructed: Rc<Cell<usize>>,
}

impl FakeFactory {
    pub fn new(app: Arc<FakeApp>) -> Self {
        Self { app, constructed: Rc::new(Cell::new(0)) }
    }

    pub fn constructed(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.constructed)
    }
}

impl AppFactory for FakeFactory {
    fn new_application(
        &self,
        _config: &Config,
        on_connect: Option<OnConnect>,
    ) -> Result<Arc<dyn Application>, ServiceError> {
        self.constructed.set(self.constructed.get() + 1);
        let app: Arc<dyn Application> = self.app.clone();
        if let Some(hook) = on_connect {
            hook(app.as_ref());
        }
        Ok(app)
    }
}

enum FixedOutcome {
    User(String),
    NotConfigured,
    NoCredentials,
    StoreError,
}

/// API initializer with a canned outcome.
pub struct FixedApi(FixedOutcome);

impl FixedApi {
    pub fn user(email: &str) -> Self {
        Self(FixedOutcome::User(email.to_string()))
    }

    pub fn not_configured() -> Self {
        Self(FixedOutcome::NotConfigured)
    }

    pub fn no_credentials() -> Self {
        Self(FixedOutcome::NoCredentials)
    }

    pub fn store_error() -> Self {
        Self(FixedOutcome::StoreError)
    }
}

impl ApiInitializer for FixedApi {
    fn initialize(&self, _store: &dyn Store) -> ApiCredentials {
        match &self.0 {
            FixedOutcome::User(email) => match User::new(email, "password123") {
                Ok(user) => ApiCredentials::Resolved(user),
                Err(e) => ApiCredentials::Failed(e.into()),
            },
            FixedOutcome::NotConfigured => ApiCredentials::NotConfigured,
            FixedOutcome::NoCredentials => ApiCredentials::Failed(ApiInitError::NoCredentialsAvailable),
            FixedOutcome::StoreError => ApiCredentials::Failed(ApiInitError::Store("users table unavailable".into())),
        }
    }
}
