//! Bootstrap layer: everything that runs between process start and the
//! node's run loop.
//!
//! - **api**: API user provisioning (file, then fallback).
//! - **diagnostics**: balance, nonce-drift and config-whitelist logging.
//! - **enclave**: secure enclave initialization.
//! - **keys**: key file import.
//! - **password**: keystore password resolution and authentication.
//! - **permissions**: owner-only audit of the node root.
//!
//! [`Client::run_node`] is the startup sequence. Each step either hands an
//! immutable result to the next one or aborts the whole sequence with an
//! [`AppError`] naming the step; nothing is retried.

pub mod api;
pub mod diagnostics;
pub mod enclave;
pub mod keys;
pub mod password;
pub mod permissions;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::local::LocalAppFactory;
use crate::app::runner::SignalRunner;
use crate::app::{AppFactory, Application, KeyStoreAuthenticator, Runner, ServiceError, Store, User};
use crate::config::{self, Config};
use crate::error::AppError;
use crate::logger;
use crate::prompt::TerminalPrompter;

use api::{ApiCredentials, ApiInitError, ApiInitializer, FileApiInitializer, PromptingApiInitializer};
use enclave::{Enclave, SoftwareEnclave};
use password::TerminalAuthenticator;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT_SHA: &str = env!("NODE_COMMIT_SHA");

/// Already-parsed arguments of the `node` command.
#[derive(Debug, Clone)]
pub struct RunNodeArgs {
    pub debug: bool,
    /// Negative means "no override".
    pub replay_from_block: i64,
    pub password: Option<PathBuf>,
    pub api: Option<PathBuf>,
}

impl Default for RunNodeArgs {
    fn default() -> Self {
        Self { debug: false, replay_from_block: -1, password: None, api: None }
    }
}

/// The node's command surface plus the collaborators it drives.
pub struct Client {
    pub config: Config,
    pub app_factory: Box<dyn AppFactory>,
    pub enclave: Box<dyn Enclave>,
    pub authenticator: Box<dyn KeyStoreAuthenticator>,
    pub fallback_api_initializer: Box<dyn ApiInitializer>,
    pub runner: Box<dyn Runner>,
}

impl Client {
    /// Client wired with the collaborators the binary ships.
    pub fn production(config: Config) -> Self {
        Self {
            config,
            app_factory: Box::new(LocalAppFactory),
            enclave: Box::new(SoftwareEnclave),
            authenticator: Box::new(TerminalAuthenticator::new(TerminalPrompter)),
            fallback_api_initializer: Box::new(PromptingApiInitializer::new(TerminalPrompter)),
            runner: Box::new(SignalRunner::new()),
        }
    }

    /// Bring the node up, block in the run loop, and stop it again.
    pub fn run_node(&mut self, args: &RunNodeArgs) -> Result<(), AppError> {
        update_config(&mut self.config, args.debug, args.replay_from_block)?;

        let dispatch = logger::build(&self.config)?;
        let _log_guard = tracing::dispatcher::set_default(&dispatch);
        info!("Starting node {VERSION} at commit {COMMIT_SHA}");

        self.enclave.init().map_err(|e| AppError::Enclave(e.to_string()))?;

        let app = self
            .app_factory
            .new_application(
                &self.config,
                Some(Box::new(|app: &dyn Application| {
                    let store = app.store();
                    diagnostics::log_node_balance(store);
                    diagnostics::log_if_nonce_out_of_sync(store);
                })),
            )
            .map_err(|e| AppError::Application(e.to_string()))?;
        let store = app.store();

        permissions::check_file_permissions(&self.config.root_dir())?;

        let pwd = password::password_from_file(args.password.as_deref())?;
        self.authenticator
            .authenticate(store, &pwd)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        let user = resolve_api_user(
            &FileApiInitializer::new(args.api.clone()),
            self.fallback_api_initializer.as_ref(),
            store,
        )?;
        info!(email = %user.email, "API exposed for user {}", user.email);

        let running = AppGuard::start(Arc::clone(&app)).map_err(|e| AppError::Start(e.to_string()))?;

        diagnostics::log_config_variables(running.store())
            .map_err(|e| AppError::ConfigWhitelist(e.to_string()))?;

        self.runner
            .run(running.app())
            .map_err(|e| AppError::Run(e.to_string()))
    }

    /// Copy a key file into the key directory and load it into the store.
    pub fn import_key(&self, src: &Path) -> Result<PathBuf, AppError> {
        let dispatch = logger::build(&self.config)?;
        let _log_guard = tracing::dispatcher::set_default(&dispatch);

        let app = self
            .app_factory
            .new_application(&self.config, None)
            .map_err(|e| AppError::Application(e.to_string()))?;
        keys::import_key(&self.config.keys_dir(), app.store(), src)
    }

    /// Remove the API user from the node's store.
    pub fn delete_user(&self) -> Result<User, AppError> {
        let dispatch = logger::build(&self.config)?;
        let _log_guard = tracing::dispatcher::set_default(&dispatch);

        let app = self
            .app_factory
            .new_application(&self.config, None)
            .map_err(|e| AppError::Application(e.to_string()))?;
        let guard = AppGuard::adopt(app);

        let user = guard.store().delete_user().map_err(|e| AppError::Store(e.to_string()))?;
        info!(email = %user.email, "Deleted API user {}", user.email);
        Ok(user)
    }
}

/// Apply command-line overrides to `config` before anything reads it.
pub fn update_config(config: &mut Config, debug: bool, replay_from_block: i64) -> Result<(), AppError> {
    if debug {
        config.set(config::LOG_LEVEL, "debug")?;
    }
    if replay_from_block >= 0 {
        config.set(&config::env_var_name("ReplayFromBlock"), replay_from_block)?;
    }
    Ok(())
}

/// Run the file initializer for its side effect, then let the fallback
/// decide which user the node exposes.
pub fn resolve_api_user(
    file: &dyn ApiInitializer,
    fallback: &dyn ApiInitializer,
    store: &dyn Store,
) -> Result<User, AppError> {
    match file.initialize(store) {
        ApiCredentials::Resolved(_) | ApiCredentials::NotConfigured => {}
        ApiCredentials::Failed(e) => return Err(AppError::ApiInitializer(e)),
    }

    match fallback.initialize(store) {
        ApiCredentials::Resolved(user) => Ok(user),
        ApiCredentials::NotConfigured => Err(AppError::NoApiCredentials(ApiInitError::NoCredentialsAvailable)),
        ApiCredentials::Failed(e @ ApiInitError::NoCredentialsAvailable) => Err(AppError::NoApiCredentials(e)),
        ApiCredentials::Failed(e) => Err(AppError::FallbackInitializer(e)),
    }
}

/// Owns an application that must be stopped.
///
/// `Drop` calls [`Application::stop`] exactly once; a stop error is logged,
/// never returned.
pub struct AppGuard {
    app: Arc<dyn Application>,
}

impl AppGuard {
    /// Start `app`. If start fails the app is still stopped before the error
    /// is returned, so partially started services are released.
    pub fn start(app: Arc<dyn Application>) -> Result<Self, ServiceError> {
        let guard = Self { app };
        guard.app.start()?;
        Ok(guard)
    }

    /// Guard an app that was never started but still holds resources.
    pub fn adopt(app: Arc<dyn Application>) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &dyn Application {
        self.app.as_ref()
    }

    pub fn store(&self) -> &dyn Store {
        self.app.store()
    }
}

impl Drop for AppGuard {
    fn drop(&mut self) {
        if let Err(e) = self.app.stop() {
            warn!(error = %e, "error stopping application");
        }
    }
}
