use bytes::Bytes;
use faultline_core::ErrorInfo;

use crate::format::{FormatError, Formatter};
use crate::headers::{TEXT_CSS, TEXT_JAVASCRIPT, TEXT_PLAIN};

/// Renders errors as two lines of plain text: `<Type> <Code>` followed by
/// the message.
///
/// Besides `text/plain`, the formatter answers requests for stylesheets and
/// scripts, so a failing `<link>` or `<script>` resource still gets a
/// readable body.
///
/// # Examples
///
/// ```
/// use faultline::format::{Formatter, PlainFormatter};
/// use faultline::{ErrorInfo, StatusCode};
///
/// let error = ErrorInfo::from_status(StatusCode::NOT_FOUND);
/// let body = PlainFormatter::new().format(&error, "text/plain").unwrap();
/// assert_eq!(body, "HttpError 404\nNot Found");
/// ```
#[derive(Debug, Default, Copy, Clone)]
pub struct PlainFormatter;

impl PlainFormatter {
    /// Creates a new plain text formatter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn render(error: &ErrorInfo) -> String {
        format!(
            "{} {}\n{}",
            error.kind(),
            error.status_code().as_u16(),
            error.message()
        )
    }
}

impl Formatter for PlainFormatter {
    fn content_types(&self) -> &[&'static str] {
        &[TEXT_PLAIN, TEXT_CSS, TEXT_JAVASCRIPT]
    }

    fn format(&self, error: &ErrorInfo, _content_type: &str) -> Result<Bytes, FormatError> {
        Ok(Bytes::from(Self::render(error)))
    }
}
