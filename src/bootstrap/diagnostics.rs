//! Startup diagnostics: balances, nonce drift and the audited config dump.
//!
//! Nothing in here is fatal except [`log_config_variables`], whose error the
//! bootstrap sequence reports.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::app::{ServiceError, Store};

/// Outcome of [`log_if_nonce_out_of_sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceCheck {
    NoActiveAccount,
    InSync,
    /// The key has sent transactions this node never recorded.
    OutOfSync,
    LookupFailed,
}

/// True when the persisted nonce trails the account by more than one,
/// i.e. something else has been sending from this key.
pub fn nonce_out_of_sync(last_nonce: u64, nonce: u64) -> bool {
    last_nonce.saturating_add(1) < nonce
}

pub fn log_if_nonce_out_of_sync(store: &dyn Store) -> NonceCheck {
    let Some(account) = store.next_active_account() else {
        return NonceCheck::NoActiveAccount;
    };

    let last_nonce = match store.last_nonce(&account.address) {
        Ok(n) => n,
        Err(e) => {
            error!(address = %account.address, error = %e, "database error when checking nonce");
            return NonceCheck::LookupFailed;
        }
    };

    if nonce_out_of_sync(last_nonce, account.nonce) {
        warn!(
            address = %account.address,
            last_nonce,
            nonce = account.nonce,
            "The account is being used by another wallet and is not safe to use with this node"
        );
        NonceCheck::OutOfSync
    } else {
        NonceCheck::InSync
    }
}

/// Log ETH and LINK balances for every keystore account.
pub fn log_node_balance(store: &dyn Store) {
    match store.eth_balances() {
        Ok(balances) => {
            for b in balances {
                info!(address = %b.address, eth_balance = %b.balance, "ETH balance for {}", b.address);
            }
        }
        Err(e) => warn!(error = %e, "unable to read ETH balances"),
    }

    match store.link_balances() {
        Ok(balances) => {
            for b in balances {
                info!(address = %b.address, link_balance = %b.balance, "LINK balance for {}", b.address);
            }
        }
        Err(e) => warn!(error = %e, "unable to read LINK balances"),
    }
}

/// Config settings that are safe to print, plus the node's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWhitelist {
    pub account_address: Option<String>,
    pub entries: Vec<(&'static str, String)>,
}

impl ConfigWhitelist {
    pub fn from_store(store: &dyn Store) -> Result<Self, ServiceError> {
        let account_address = store.accounts()?.into_iter().next().map(|a| a.address);
        Ok(Self { account_address, entries: store.config().whitelist() })
    }
}

impl fmt::Display for ConfigWhitelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(address) = &self.account_address {
            writeln!(f, "ACCOUNT_ADDRESS: {address}")?;
        }
        for (key, value) in &self.entries {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

pub fn log_config_variables(store: &dyn Store) -> Result<(), ServiceError> {
    let whitelist = ConfigWhitelist::from_store(store)?;
    debug!("Environment variables\n{whitelist}");
    Ok(())
}
