use std::error::Error as StdError;
use std::sync::Arc;

use derive_more::Display;

use crate::error::http_error::reason_phrase;
use crate::{BoxError, Context, HttpError, StatusCode, UncaughtPanic};

/// The kind of failure an [`ErrorInfo`] was built from.
///
/// The [`Display`](std::fmt::Display) output is the "type" shown by
/// formatters, e.g. `HttpError 404`.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An [`HttpError`], or an error-range status code returned by the inner
    /// service.
    #[display("HttpError")]
    Http,
    /// Any other failure returned by the inner service.
    #[display("Error")]
    Failure,
    /// A panic caught while handling the request.
    #[display("UncaughtPanic")]
    Panic,
}

/// A normalized record of an error that occurred while handling a request.
///
/// `ErrorInfo` is what formatters render. It is created once per failure and
/// never modified afterwards; the cause is reference counted so that the
/// record can be cheaply cloned into request extensions.
///
/// The status code always lies in the `100..600` range. Codes outside of it
/// are replaced by `500 Internal Server Error` on construction.
///
/// # Examples
///
/// ```
/// use faultline_core::{ErrorInfo, ErrorKind, StatusCode};
///
/// let info = ErrorInfo::from_status(StatusCode::NOT_FOUND);
/// assert_eq!(info.status_code(), StatusCode::NOT_FOUND);
/// assert_eq!(info.kind(), ErrorKind::Http);
/// assert_eq!(info.message(), "Not Found");
/// assert!(info.cause().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    status_code: StatusCode,
    kind: ErrorKind,
    message: String,
    context: Context,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl ErrorInfo {
    /// Creates a new error record.
    ///
    /// Status codes outside of `100..600` are normalized to `500`.
    #[must_use]
    pub fn new<T: Into<String>>(status_code: StatusCode, kind: ErrorKind, message: T) -> Self {
        Self {
            status_code: normalize(status_code),
            kind,
            message: message.into(),
            context: Context::new(),
            cause: None,
        }
    }

    /// Builds an error record from an error-range status code, using the
    /// canonical reason phrase as the message.
    #[must_use]
    pub fn from_status(status_code: StatusCode) -> Self {
        Self::new(status_code, ErrorKind::Http, reason_phrase(status_code))
    }

    /// Builds an error record from an arbitrary failure.
    ///
    /// The status code is `500 Internal Server Error`, unless an
    /// [`HttpError`] appears in the failure's source chain, in which case its
    /// status code is used. The failure is kept as the cause.
    ///
    /// # Examples
    ///
    /// ```
    /// use faultline_core::{ErrorInfo, ErrorKind, StatusCode};
    ///
    /// let info = ErrorInfo::from_failure("Something went wrong".into());
    /// assert_eq!(info.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    /// assert_eq!(info.kind(), ErrorKind::Failure);
    /// assert_eq!(info.message(), "Something went wrong");
    /// assert!(info.cause().is_some());
    /// ```
    #[must_use]
    pub fn from_failure(failure: BoxError) -> Self {
        let status_code =
            nested_status_code(&*failure).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut info = Self::new(status_code, ErrorKind::Failure, failure.to_string());
        info.cause = Some(Arc::from(failure));
        info
    }

    /// Replaces the context of this record.
    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Returns the HTTP status code of the error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Returns the kind of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message of the error.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the structured context of the error.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the underlying failure, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl From<HttpError> for ErrorInfo {
    fn from(error: HttpError) -> Self {
        let (status_code, message, context, source) = error.into_parts();
        let mut info = Self::new(status_code, ErrorKind::Http, message).with_context(context);
        info.cause = source;
        info
    }
}

impl From<UncaughtPanic> for ErrorInfo {
    fn from(panic: UncaughtPanic) -> Self {
        let mut info = Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Panic,
            panic.to_string(),
        );
        info.cause = Some(Arc::new(panic));
        info
    }
}

fn normalize(status_code: StatusCode) -> StatusCode {
    if (100..600).contains(&status_code.as_u16()) {
        status_code
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn nested_status_code(failure: &(dyn StdError + 'static)) -> Option<StatusCode> {
    let mut error = Some(failure);
    while let Some(inner) = error {
        if let Some(http_error) = inner.downcast_ref::<HttpError>() {
            return Some(http_error.status_code());
        }
        error = inner.source();
    }
    None
}
