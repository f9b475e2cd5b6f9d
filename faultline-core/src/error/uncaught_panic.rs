//! Error type for panics intercepted while handling a request.

use std::any::Any;
use std::sync::{Arc, Mutex};

use thiserror::Error;

const DEFAULT_MESSAGE: &str = "Uncaught panic occurred";

/// An error that represents an uncaught panic that occurred during request
/// processing.
///
/// The error handling middleware wraps panics raised by the inner service in
/// this type when catching is enabled, so that they are rendered like any
/// other failure instead of tearing down the connection.
///
/// The panic payload is stored in a thread-safe manner and can be accessed
/// for debugging purposes, though it should be handled carefully as it may
/// contain sensitive information.
///
/// # Examples
///
/// ```
/// use faultline_core::UncaughtPanic;
///
/// let panic = UncaughtPanic::new(Box::new("Something went wrong"));
/// assert_eq!(panic.message(), Some("Something went wrong"));
/// assert_eq!(panic.to_string(), "Something went wrong");
/// ```
#[derive(Debug, Clone, Error)]
#[error("{}", .message.as_deref().unwrap_or(DEFAULT_MESSAGE))]
pub struct UncaughtPanic {
    message: Option<String>,
    payload: Arc<Mutex<Box<dyn Any + Send + 'static>>>,
}

impl UncaughtPanic {
    /// Creates a new `UncaughtPanic` with the given panic payload.
    ///
    /// Payloads produced by `panic!` with a message (`&'static str` or
    /// `String`) are used as the error message.
    #[must_use]
    pub fn new(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|message| (*message).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned());

        Self {
            message,
            payload: Arc::new(Mutex::new(payload)),
        }
    }

    /// Returns the panic message, if the payload was a string.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the payload of the panic.
    ///
    /// This method provides access to the original panic payload, which can be
    /// useful for debugging purposes. The payload is returned as a thread-safe
    /// reference that can be cloned and shared.
    #[must_use]
    pub fn payload(&self) -> Arc<Mutex<Box<dyn Any + Send + 'static>>> {
        Arc::clone(&self.payload)
    }
}
