//! Error model for the `faultline` error handling middleware.
//!
//! This crate contains the types describing "something went wrong" while a
//! request was processed: the normalized [`ErrorInfo`] record that
//! formatters render, the structured [`HttpError`] that handlers can return
//! to pick their own status code and context, and [`UncaughtPanic`] for
//! panics intercepted by the middleware.

pub mod error;

pub use crate::error::{ErrorInfo, ErrorKind, HttpError, UncaughtPanic};

/// A type-erased error, as returned by `tower` services.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A type alias for an HTTP status code.
pub type StatusCode = http::StatusCode;

/// A type alias for the structured context attached to errors.
pub type Context = serde_json::Map<String, serde_json::Value>;
