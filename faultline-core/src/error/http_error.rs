use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use serde_json::Value;

use crate::{Context, StatusCode};

/// An error carrying an explicit HTTP status code and structured context.
///
/// Returning an `HttpError` from a service wrapped by the error handling
/// middleware bypasses the generic failure classification: the middleware
/// renders it with its own status code, message and context, even when
/// catching of other failures is disabled.
///
/// # Examples
///
/// ```
/// use faultline_core::{HttpError, StatusCode};
///
/// let error = HttpError::new(StatusCode::NOT_FOUND)
///     .with_message("no user with id 42")
///     .with_context("user_id", 42);
///
/// assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
/// assert_eq!(error.message(), "no user with id 42");
/// assert_eq!(error.context()["user_id"], 42);
/// ```
#[derive(Debug, Clone)]
pub struct HttpError {
    status_code: StatusCode,
    message: String,
    context: Context,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl HttpError {
    /// Creates a new error with the given status code.
    ///
    /// The message defaults to the canonical reason phrase of the status
    /// code, e.g. `Not Found` for 404.
    ///
    /// # Examples
    ///
    /// ```
    /// use faultline_core::{HttpError, StatusCode};
    ///
    /// let error = HttpError::new(StatusCode::INTERNAL_SERVER_ERROR);
    /// assert_eq!(error.message(), "Internal Server Error");
    /// ```
    #[must_use]
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            message: reason_phrase(status_code).to_owned(),
            context: Context::new(),
            source: None,
        }
    }

    /// Replaces the message of this error.
    #[must_use]
    pub fn with_message<T: Into<String>>(mut self, message: T) -> Self {
        self.message = message.into();
        self
    }

    /// Adds a context entry to this error.
    ///
    /// Entries with the same key are overwritten.
    #[must_use]
    pub fn with_context<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets the lower-level failure that caused this error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.source = Some(Arc::from(source.into()));
        self
    }

    /// Returns the HTTP status code of this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Returns the human-readable message of this error.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the structured context of this error.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        StatusCode,
        String,
        Context,
        Option<Arc<dyn StdError + Send + Sync>>,
    ) {
        (self.status_code, self.message, self.context, self.source)
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for HttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let source: &(dyn StdError + 'static) = self.source.as_deref()?;
        Some(source)
    }
}

impl From<StatusCode> for HttpError {
    fn from(status_code: StatusCode) -> Self {
        Self::new(status_code)
    }
}

pub(crate) fn reason_phrase(status_code: StatusCode) -> &'static str {
    status_code.canonical_reason().unwrap_or("Unknown Error")
}
