use askama::Template;
use bytes::Bytes;
use faultline_core::{ErrorInfo, ErrorKind};

use crate::format::{FormatError, Formatter};
use crate::headers::TEXT_HTML;

#[derive(Debug, Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{{ kind }} {{ code }}</title>
    <style>html{font-family: sans-serif;}</style>
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
    <h1>{{ kind }} {{ code }}</h1>
    <p>{% if escaped %}{{ message }}{% else %}{{ message|safe }}{% endif %}</p>
</body>
</html>"#
)]
struct HtmlTemplate<'a> {
    kind: ErrorKind,
    code: u16,
    message: &'a str,
    escaped: bool,
}

/// Renders errors as a minimal HTML document.
///
/// The type and status code are shown in the `<title>` and `<h1>` elements
/// and the message in a paragraph. The message is HTML-escaped unless the
/// formatter was created with [`HtmlFormatter::raw`].
///
/// # Examples
///
/// ```
/// use faultline::format::{Formatter, HtmlFormatter};
/// use faultline::{ErrorInfo, StatusCode};
///
/// let error = ErrorInfo::from_status(StatusCode::NOT_FOUND);
/// let body = HtmlFormatter::new().format(&error, "text/html").unwrap();
/// let body = String::from_utf8(body.to_vec()).unwrap();
/// assert!(body.contains("<h1>HttpError 404</h1>"));
/// assert!(body.contains("<p>Not Found</p>"));
/// ```
#[derive(Debug, Copy, Clone)]
pub struct HtmlFormatter {
    escaped: bool,
}

impl HtmlFormatter {
    /// Creates a new HTML formatter that escapes the error message.
    #[must_use]
    pub fn new() -> Self {
        Self { escaped: true }
    }

    /// Creates a new HTML formatter that inserts the error message as-is.
    ///
    /// Only use this when error messages are known to be trusted markup.
    #[must_use]
    pub fn raw() -> Self {
        Self { escaped: false }
    }
}

impl Default for HtmlFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for HtmlFormatter {
    fn content_types(&self) -> &[&'static str] {
        &[TEXT_HTML]
    }

    fn format(&self, error: &ErrorInfo, _content_type: &str) -> Result<Bytes, FormatError> {
        let template = HtmlTemplate {
            kind: error.kind(),
            code: error.status_code().as_u16(),
            message: error.message(),
            escaped: self.escaped,
        };

        Ok(Bytes::from(template.render()?))
    }
}
