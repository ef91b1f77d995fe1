//! API user provisioning.
//!
//! Two initializers run in order during bootstrap: [`FileApiInitializer`]
//! seeds the store from an `--api` credentials file when one is given, then
//! the fallback initializer (normally [`PromptingApiInitializer`]) produces
//! the user the node actually exposes. The outcome of each is an
//! [`ApiCredentials`], which keeps "nothing configured" apart from failure.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::app::{Store, User, UserError};
use crate::prompt::Prompter;

#[derive(Debug, Error)]
pub enum ApiInitError {
    #[error("API credentials must be supplied; pass --api <FILE> or run interactively")]
    NoCredentialsAvailable,

    #[error("invalid API credentials file {}: {reason}", .path.display())]
    InvalidFile { path: PathBuf, reason: String },

    #[error("invalid API user: {0}")]
    InvalidUser(#[from] UserError),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("{0}")]
    Store(String),
}

/// Outcome of one API initializer.
#[derive(Debug)]
pub enum ApiCredentials {
    /// A user exists in the store (found or newly created).
    Resolved(User),
    /// This initializer had nothing to work with.
    NotConfigured,
    Failed(ApiInitError),
}

pub trait ApiInitializer {
    fn initialize(&self, store: &dyn Store) -> ApiCredentials;
}

/// Returns the stored user if there is one.
fn existing_user(store: &dyn Store) -> Result<Option<User>, ApiInitError> {
    store.find_user().map_err(|e| ApiInitError::Store(e.to_string()))
}

fn save(store: &dyn Store, user: User) -> ApiCredentials {
    match store.save_user(&user) {
        Ok(()) => ApiCredentials::Resolved(user),
        Err(e) => ApiCredentials::Failed(ApiInitError::Store(e.to_string())),
    }
}

// ── file initializer ─────────────────────────────────────────────────────────

/// Creates the API user from a two-line file: email, then password.
#[derive(Debug, Clone, Default)]
pub struct FileApiInitializer {
    path: Option<PathBuf>,
}

impl FileApiInitializer {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ApiInitializer for FileApiInitializer {
    fn initialize(&self, store: &dyn Store) -> ApiCredentials {
        match existing_user(store) {
            Ok(Some(user)) => return ApiCredentials::Resolved(user),
            Ok(None) => {}
            Err(e) => return ApiCredentials::Failed(e),
        }

        let Some(path) = self.path.as_deref().filter(|p| !p.as_os_str().is_empty()) else {
            return ApiCredentials::NotConfigured;
        };
        if !path.exists() {
            debug!(path = %path.display(), "no API credentials file");
            return ApiCredentials::NotConfigured;
        }

        let user = credentials_from_file(path)
            .and_then(|(email, password)| User::new(&email, &password).map_err(ApiInitError::from));
        match user {
            Ok(user) => save(store, user),
            Err(e) => ApiCredentials::Failed(e),
        }
    }
}

/// Parse `(email, password)` from the first two non-blank lines of `path`.
pub fn credentials_from_file(path: &Path) -> Result<(String, String), ApiInitError> {
    let invalid = |reason: String| ApiInitError::InvalidFile { path: path.to_path_buf(), reason };

    let contents = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(email), Some(password)) => Ok((email.to_string(), password.to_string())),
        _ => Err(invalid("expected email and password on separate lines".into())),
    }
}

// ── prompting initializer ────────────────────────────────────────────────────

/// Asks the operator for API credentials when no user exists yet.
pub struct PromptingApiInitializer<P> {
    prompter: P,
}

impl<P: Prompter> PromptingApiInitializer<P> {
    pub fn new(prompter: P) -> Self {
        Self { prompter }
    }
}

impl<P: Prompter> ApiInitializer for PromptingApiInitializer<P> {
    fn initialize(&self, store: &dyn Store) -> ApiCredentials {
        match existing_user(store) {
            Ok(Some(user)) => return ApiCredentials::Resolved(user),
            Ok(None) => {}
            Err(e) => return ApiCredentials::Failed(e),
        }

        if !self.prompter.is_terminal() {
            return ApiCredentials::Failed(ApiInitError::NoCredentialsAvailable);
        }

        // Re-prompt on invalid input; only prompt I/O errors end the loop.
        loop {
            let answers = self
                .prompter
                .prompt("Enter API Email")
                .and_then(|email| Ok((email, self.prompter.password_prompt("Enter API Password")?)));
            let (email, password) = match answers {
                Ok(answers) => answers,
                Err(e) => return ApiCredentials::Failed(ApiInitError::Prompt(e.to_string())),
            };

            match User::new(&email, &password) {
                Ok(user) => return save(store, user),
                Err(e) => warn!(error = %e, "invalid API credentials, try again"),
            }
        }
    }
}
