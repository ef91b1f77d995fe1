//! Keystore password resolution and authentication.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::app::{KeyStoreAuthenticator, ServiceError, Store};
use crate::error::AppError;
use crate::prompt::Prompter;

/// Read the keystore password from `path`, trimmed of surrounding whitespace.
///
/// No path (or an empty one) yields an empty password, which tells the
/// authenticator to ask the operator instead.
pub fn password_from_file(path: Option<&Path>) -> Result<String, AppError> {
    let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(String::new());
    };
    let data = fs::read(path)
        .map_err(|e| AppError::Password(format!("cannot read {}: {e}", path.display())))?;
    let data = String::from_utf8(data).map_err(|_| {
        AppError::Password(format!("password file {} is not UTF-8", path.display()))
    })?;
    Ok(data.trim().to_string())
}

/// Unlocks the keystore with a supplied password, or prompts for one.
///
/// With no accounts in the keystore the first account is created with the
/// password, so a fresh node comes up with a usable key.
pub struct TerminalAuthenticator<P> {
    prompter: P,
}

impl<P: Prompter> TerminalAuthenticator<P> {
    pub fn new(prompter: P) -> Self {
        Self { prompter }
    }

    fn prompt_new_password(&self) -> Result<String, ServiceError> {
        let password = self.password_prompt("New keystore password")?;
        let confirm = self.password_prompt("Confirm keystore password")?;
        if password != confirm {
            return Err(ServiceError::Keystore("passwords don't match".into()));
        }
        Ok(password)
    }

    fn password_prompt(&self, label: &str) -> Result<String, ServiceError> {
        self.prompter
            .password_prompt(label)
            .map_err(|e| ServiceError::Prompt(e.to_string()))
    }
}

impl<P: Prompter> KeyStoreAuthenticator for TerminalAuthenticator<P> {
    fn authenticate(&self, store: &dyn Store, password: &str) -> Result<(), ServiceError> {
        let has_accounts = !store.accounts()?.is_empty();

        let password = if !password.is_empty() {
            password.to_string()
        } else if !self.prompter.is_terminal() {
            return Err(ServiceError::Keystore("no keystore password provided".into()));
        } else if has_accounts {
            self.password_prompt("Enter keystore password")?
        } else {
            self.prompt_new_password()?
        };

        if !has_accounts {
            let account = store.create_account(&password)?;
            info!(address = %account.address, "created first keystore account");
        }
        store.unlock(&password)?;
        info!("keystore unlocked");
        Ok(())
    }
}
