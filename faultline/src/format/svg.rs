use askama::Template;
use bytes::Bytes;
use faultline_core::{ErrorInfo, ErrorKind};

use crate::format::{FormatError, Formatter};
use crate::headers::IMAGE_SVG;

#[derive(Debug, Template)]
#[template(
    ext = "svg",
    source = r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="50" viewBox="0 0 200 50">
    <text x="20" y="30" font-family="sans-serif" title="{% if escaped %}{{ message }}{% else %}{{ message|safe }}{% endif %}">
        {{ kind }} {{ code }}
    </text>
</svg>"#
)]
struct SvgTemplate<'a> {
    kind: ErrorKind,
    code: u16,
    message: &'a str,
    escaped: bool,
}

/// Renders errors as a 200×50 SVG image.
///
/// The type and status code are drawn as text; the message is attached as the
/// `title` attribute of the text element. The message is escaped unless the
/// formatter was created with [`SvgFormatter::raw`].
#[derive(Debug, Copy, Clone)]
pub struct SvgFormatter {
    escaped: bool,
}

impl SvgFormatter {
    /// Creates a new SVG formatter that escapes the error message.
    #[must_use]
    pub fn new() -> Self {
        Self { escaped: true }
    }

    /// Creates a new SVG formatter that inserts the error message as-is.
    #[must_use]
    pub fn raw() -> Self {
        Self { escaped: false }
    }
}

impl Default for SvgFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for SvgFormatter {
    fn content_types(&self) -> &[&'static str] {
        &[IMAGE_SVG]
    }

    fn format(&self, error: &ErrorInfo, _content_type: &str) -> Result<Bytes, FormatError> {
        let template = SvgTemplate {
            kind: error.kind(),
            code: error.status_code().as_u16(),
            message: error.message(),
            escaped: self.escaped,
        };

        Ok(Bytes::from(template.render()?))
    }
}
