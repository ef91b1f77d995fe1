//! Shared fixtures for the bootstrap integration tests.

#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use oracle_node::app::local::LocalAppFactory;
use oracle_node::app::runner::SignalRunner;
use oracle_node::bootstrap::Client;
use oracle_node::bootstrap::api::PromptingApiInitializer;
use oracle_node::bootstrap::enclave::SoftwareEnclave;
use oracle_node::bootstrap::password::TerminalAuthenticator;
use oracle_node::config::Config;
use oracle_node::prompt::Prompter;
use tempfile::TempDir;

pub const KEYSTORE_PASSWORD: &str = "hunter2hunter2";

/// No operator attached.
#[derive(Clone, Copy)]
pub struct Headless;

impl Prompter for Headless {
    fn is_terminal(&self) -> bool {
        false
    }

    fn prompt(&self, _label: &str) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "no terminal"))
    }

    fn password_prompt(&self, _label: &str) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "no terminal"))
    }
}

/// Scratch space: `node/` is the node root, everything else lives beside it.
pub struct Workspace {
    pub tmp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self { tmp: TempDir::new().unwrap() }
    }

    pub fn root(&self) -> PathBuf {
        self.tmp.path().join("node")
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.tmp.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Headless client on the file-backed store whose run loop returns at once.
    pub fn client(&self) -> Client {
        client_at(&self.root())
    }
}

pub fn client_at(root: &Path) -> Client {
    let runner = SignalRunner::new();
    runner.shutdown_token().cancel();
    Client {
        config: Config::test_default(root),
        app_factory: Box::new(LocalAppFactory),
        enclave: Box::new(SoftwareEnclave),
        authenticator: Box::new(TerminalAuthenticator::new(Headless)),
        fallback_api_initializer: Box::new(PromptingApiInitializer::new(Headless)),
        runner: Box::new(runner),
    }
}
