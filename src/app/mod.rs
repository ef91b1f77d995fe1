//! Application seams: the collaborators the bootstrap sequence drives.
//!
//! The sequence only talks to these traits. [`local`] provides the
//! file-backed implementations the binary runs with; [`runner`] provides the
//! signal-driven run loop.

pub mod local;
pub mod models;
pub mod runner;

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;

pub use models::{Account, AccountBalance, User, UserError};

/// Error surface shared by every collaborator trait.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("keystore error: {0}")]
    Keystore(String),

    #[error("prompt error: {0}")]
    Prompt(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Persistent node state as seen by the bootstrap sequence.
///
/// Methods take `&self`; implementations own their interior mutability.
pub trait Store {
    fn config(&self) -> &Config;

    /// The account the transaction manager will send from next, if any.
    fn next_active_account(&self) -> Option<Account>;

    /// Last nonce recorded in durable storage for `address`.
    fn last_nonce(&self, address: &str) -> Result<u64, ServiceError>;

    fn eth_balances(&self) -> Result<Vec<AccountBalance>, ServiceError>;

    fn link_balances(&self) -> Result<Vec<AccountBalance>, ServiceError>;

    /// Accounts known to the keystore, in a stable order.
    fn accounts(&self) -> Result<Vec<Account>, ServiceError>;

    /// Create a keystore account protected by `password`.
    fn create_account(&self, password: &str) -> Result<Account, ServiceError>;

    /// Unlock every keystore account with `password`.
    fn unlock(&self, password: &str) -> Result<(), ServiceError>;

    fn find_user(&self) -> Result<Option<User>, ServiceError>;

    fn save_user(&self, user: &User) -> Result<(), ServiceError>;

    /// Remove the API user, returning the deleted record.
    fn delete_user(&self) -> Result<User, ServiceError>;

    /// Load every key file in the key directory into the keystore.
    fn sync_disk_keystore(&self) -> Result<(), ServiceError>;
}

/// A constructed node: store plus whatever background services it runs.
pub trait Application {
    fn store(&self) -> &dyn Store;

    fn start(&self) -> Result<(), ServiceError>;

    fn stop(&self) -> Result<(), ServiceError>;
}

/// Hook run by the factory right after the application is constructed.
pub type OnConnect = Box<dyn FnOnce(&dyn Application)>;

pub trait AppFactory {
    fn new_application(
        &self,
        config: &Config,
        on_connect: Option<OnConnect>,
    ) -> Result<Arc<dyn Application>, ServiceError>;
}

/// Unlocks the keystore. An empty password means "ask the operator".
pub trait KeyStoreAuthenticator {
    fn authenticate(&self, store: &dyn Store, password: &str) -> Result<(), ServiceError>;
}

/// Blocks until the node is told to shut down.
pub trait Runner {
    fn run(&self, app: &dyn Application) -> Result<(), ServiceError>;
}
