//! Logger construction via tracing-subscriber.
//!
//! [`build`] is called once per command, after config overrides are applied.
//! It returns a [`Dispatch`] rather than installing a global subscriber; the
//! caller scopes it with [`tracing::dispatcher::set_default`] and hands clones
//! to components that wrap it (see [`crate::orm_log::OrmLogger`]).

use std::path::Path;
use std::sync::Arc;

use tracing::Dispatch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::app::local::create_owner_only_dir;
use crate::config::Config;
use crate::error::AppError;

/// Build the production logger described by `config`.
///
/// `LOG_LEVEL` takes precedence; `RUST_LOG` is only used as a fallback when
/// the configured level does not parse. With `LOG_TO_DISK` set, output is
/// written to stderr and appended to [`Config::log_file`].
pub fn build(config: &Config) -> Result<Dispatch, AppError> {
    let log_file = config.log_to_disk().then(|| config.log_file());
    build_with(config.log_level(), log_file.as_deref())
}

/// Build a logger at `level`, optionally teeing into `log_file`.
pub fn build_with(level: &str, log_file: Option<&Path>) -> Result<Dispatch, AppError> {
    let filter = match EnvFilter::try_new(level) {
        Ok(filter) => filter,
        Err(level_err) => EnvFilter::try_from_default_env().map_err(|env_err| {
            AppError::Logger(format!(
                "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
            ))
        })?,
    };

    let writer = if let Some(path) = log_file {
        let file = open_log_file(path).map_err(|e| {
            AppError::Logger(format!("failed to open log file '{}': {e}", path.display()))
        })?;
        BoxMakeWriter::new(std::io::stderr.and(Arc::new(file)))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish();

    Ok(Dispatch::new(subscriber))
}

/// The log file lives under the node root, so it must stay owner-only or the
/// next startup's permission audit rejects it.
fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.exists()) {
        create_owner_only_dir(dir)?;
    }
    let mut options = std::fs::OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// The verbosity a `LOG_LEVEL` value names (`error` through `trace`, or
/// `off`). `Config::set` uses this to reject a bad level up front.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    let invalid = || {
        AppError::Logger(format!(
            "'{level}' is not a log level (error, warn, info, debug, trace, off)"
        ))
    };
    // tracing reads "" as ERROR.
    match level.trim() {
        "" => Err(invalid()),
        name => name.parse::<LevelFilter>().map_err(|_| invalid()),
    }
}
