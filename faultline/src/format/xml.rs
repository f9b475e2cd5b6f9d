use askama::Template;
use bytes::Bytes;
use faultline_core::{ErrorInfo, ErrorKind};

use crate::format::{FormatError, Formatter};
use crate::headers::{APPLICATION_XML, TEXT_XML};

#[derive(Debug, Template)]
#[template(
    ext = "xml",
    source = r#"<?xml version="1.0" encoding="utf-8"?>
<error>
    <type>{{ kind }}</type>
    <code>{{ code }}</code>
    <message>{% if escaped %}{{ message }}{% else %}{{ message|safe }}{% endif %}</message>
</error>"#
)]
struct XmlTemplate<'a> {
    kind: ErrorKind,
    code: u16,
    message: &'a str,
    escaped: bool,
}

/// Renders errors as an XML document with an `<error>` root element.
///
/// The message is escaped unless the formatter was created with
/// [`XmlFormatter::raw`].
#[derive(Debug, Copy, Clone)]
pub struct XmlFormatter {
    escaped: bool,
}

impl XmlFormatter {
    /// Creates a new XML formatter that escapes the error message.
    #[must_use]
    pub fn new() -> Self {
        Self { escaped: true }
    }

    /// Creates a new XML formatter that inserts the error message as-is.
    #[must_use]
    pub fn raw() -> Self {
        Self { escaped: false }
    }
}

impl Default for XmlFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for XmlFormatter {
    fn content_types(&self) -> &[&'static str] {
        &[TEXT_XML, APPLICATION_XML]
    }

    fn format(&self, error: &ErrorInfo, _content_type: &str) -> Result<Bytes, FormatError> {
        let template = XmlTemplate {
            kind: error.kind(),
            code: error.status_code().as_u16(),
            message: error.message(),
            escaped: self.escaped,
        };

        Ok(Bytes::from(template.render()?))
    }
}
