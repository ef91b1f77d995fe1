//! Application-wide error types.
//!
//! Every fatal bootstrap condition maps to one variant naming the step it
//! came from, so operator logs can tell the causes apart.

use thiserror::Error;

use crate::bootstrap::api::ApiInitError;
use crate::bootstrap::permissions::PermissionViolation;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("error initializing enclave: {0}")]
    Enclave(String),

    #[error("error constructing application: {0}")]
    Application(String),

    #[error("{0}")]
    Permissions(#[from] PermissionViolation),

    #[error("error reading password: {0}")]
    Password(String),

    #[error("error authenticating keystore: {0}")]
    Authentication(String),

    #[error("error creating api initializer: {0}")]
    ApiInitializer(ApiInitError),

    /// Reported verbatim: no prefix, the message is already operator-facing.
    #[error("{0}")]
    NoApiCredentials(ApiInitError),

    #[error("error creating fallback initializer: {0}")]
    FallbackInitializer(ApiInitError),

    #[error("error starting app: {0}")]
    Start(String),

    #[error("error logging config variables: {0}")]
    ConfigWhitelist(String),

    #[error("run loop error: {0}")]
    Run(String),

    #[error("error importing key: {0}")]
    KeyImport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
