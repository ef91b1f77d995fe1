//! Secure enclave initialization.

use tracing::debug;

use crate::app::ServiceError;

/// Hardware-backed execution environment, initialized once before anything
/// else touches key material.
pub trait Enclave {
    fn init(&self) -> Result<(), ServiceError>;
}

/// Used when the node is built without enclave support.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareEnclave;

impl Enclave for SoftwareEnclave {
    fn init(&self) -> Result<(), ServiceError> {
        debug!("no hardware enclave available, continuing without one");
        Ok(())
    }
}
