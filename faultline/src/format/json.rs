use bytes::Bytes;
use faultline_core::{Context, ErrorInfo};
use serde::Serialize;

use crate::format::{FormatError, Formatter};
use crate::headers::APPLICATION_JSON;

#[derive(Debug, Serialize)]
struct JsonError<'a> {
    #[serde(rename = "type")]
    kind: String,
    code: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a Context>,
}

/// Renders errors as a JSON object with `type`, `code` and `message` keys.
///
/// The error's context is added under the `context` key when it is not
/// empty.
///
/// # Examples
///
/// ```
/// use faultline::format::{Formatter, JsonFormatter};
/// use faultline::{ErrorInfo, StatusCode};
///
/// let error = ErrorInfo::from_status(StatusCode::NOT_FOUND);
/// let body = JsonFormatter::new().format(&error, "application/json").unwrap();
/// assert_eq!(
///     body,
///     r#"{"type":"HttpError","code":404,"message":"Not Found"}"#
/// );
/// ```
#[derive(Debug, Default, Copy, Clone)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Creates a new JSON formatter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Formatter for JsonFormatter {
    fn content_types(&self) -> &[&'static str] {
        &[APPLICATION_JSON]
    }

    fn format(&self, error: &ErrorInfo, _content_type: &str) -> Result<Bytes, FormatError> {
        let body = JsonError {
            kind: error.kind().to_string(),
            code: error.status_code().as_u16(),
            message: error.message(),
            context: (!error.context().is_empty()).then_some(error.context()),
        };

        Ok(Bytes::from(serde_json::to_vec(&body)?))
    }
}
