//! Adapter from the ORM's callback-style log protocol to `tracing`.
//!
//! The ORM reports through a single variadic `print(args...)` call whose
//! first argument is a tag and whose other positions depend on that tag.
//! [`OrmEvent::from_callback`] is the only place that knows the positions;
//! everything downstream works with the typed [`OrmEvent`].

use std::borrow::Cow;
use std::panic::Location;

use serde_json::Value;
use tracing::{Dispatch, debug, error, warn};

/// One decoded ORM callback.
#[derive(Debug, Clone, PartialEq)]
pub enum OrmEvent {
    /// `("error", _, cause)`
    Error { cause: Value },
    /// `("log", _, message)`
    Warn { message: Value },
    /// `("sql", _, duration, query, _, rows_affected)`
    Sql { query: String, duration: Value, rows_affected: Value },
    /// Any other tag. These are the ORM's internal callback traces.
    Other,
}

impl OrmEvent {
    /// Decode a positional callback. Unknown tags and calls missing a
    /// required position decode to [`OrmEvent::Other`].
    pub fn from_callback(args: &[Value]) -> Self {
        match args.first().and_then(Value::as_str) {
            Some("error") => match args.get(2) {
                Some(cause) => OrmEvent::Error { cause: cause.clone() },
                None => OrmEvent::Other,
            },
            Some("log") => match args.get(2) {
                Some(message) => OrmEvent::Warn { message: message.clone() },
                None => OrmEvent::Other,
            },
            Some("sql") => match (args.get(3).and_then(Value::as_str), args.get(2), args.get(5)) {
                (Some(query), Some(duration), Some(rows)) => OrmEvent::Sql {
                    query: query.to_string(),
                    duration: duration.clone(),
                    rows_affected: rows.clone(),
                },
                _ => OrmEvent::Other,
            },
            _ => OrmEvent::Other,
        }
    }
}

/// Leveled logger for ORM events.
///
/// Every entry carries a `caller` field with the location of whoever called
/// [`OrmLogger::print`] or [`OrmLogger::log`], not this module.
#[derive(Clone)]
pub struct OrmLogger {
    dispatch: Dispatch,
}

impl OrmLogger {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Wrap whatever dispatcher is current on this thread.
    pub fn from_current() -> Self {
        Self::new(tracing::dispatcher::get_default(Dispatch::clone))
    }

    /// Entry point for the raw callback protocol.
    #[track_caller]
    pub fn print(&self, args: &[Value]) {
        self.emit(OrmEvent::from_callback(args), Location::caller());
    }

    #[track_caller]
    pub fn log(&self, event: OrmEvent) {
        self.emit(event, Location::caller());
    }

    fn emit(&self, event: OrmEvent, caller: &'static Location<'static>) {
        tracing::dispatcher::with_default(&self.dispatch, || match &event {
            OrmEvent::Error { cause } => error!(caller = %caller, "{}", text(cause)),
            OrmEvent::Warn { message } => warn!(caller = %caller, "{}", text(message)),
            OrmEvent::Sql { query, duration, rows_affected } => debug!(
                caller = %caller,
                time = %text(duration),
                rows_affected = %text(rows_affected),
                "{query}"
            ),
            OrmEvent::Other => {}
        });
    }
}

/// Strings render bare; everything else renders as JSON.
fn text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}
