//! Selection of an error formatter from the request's `Accept` header.

use std::sync::Arc;

use bytes::Bytes;
use faultline_core::ErrorInfo;
use http::HeaderValue;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::format::{Formatter, PlainFormatter, default_formatters};
use crate::headers::TEXT_PLAIN;

/// An ordered, validated set of error formatters.
///
/// Formatters are tried in registration order. When two formatters declare
/// the same content type, the one registered first is used.
///
/// Negotiation is deliberately simple: a content type matches when it
/// appears anywhere in the `Accept` header, compared case-insensitively.
/// Quality values are not parsed, so `Accept: text/html;q=0.1,
/// application/json` selects HTML if the HTML formatter is registered before
/// the JSON one. When nothing matches, the first content type of the first
/// formatter is used.
///
/// # Examples
///
/// ```
/// use faultline::Formatters;
///
/// let formatters = Formatters::defaults(false);
///
/// let negotiated = formatters.negotiate(Some("application/json"));
/// assert_eq!(negotiated.content_type(), "application/json");
///
/// let negotiated = formatters.negotiate(Some("application/msword"));
/// assert_eq!(negotiated.content_type(), "text/plain");
/// ```
#[derive(Debug, Clone)]
pub struct Formatters {
    formatters: Vec<Arc<dyn Formatter>>,
}

impl Formatters {
    /// Creates a formatter set from `formatters`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoFormatters`] if `formatters` is empty,
    /// [`ConfigError::NoContentTypes`] if a formatter declares no content
    /// types and [`ConfigError::InvalidContentType`] if a declared content
    /// type is empty or cannot be used as a header value.
    pub fn new<I>(formatters: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Arc<dyn Formatter>>,
    {
        let formatters: Vec<_> = formatters.into_iter().collect();
        if formatters.is_empty() {
            return Err(ConfigError::NoFormatters);
        }

        for (index, formatter) in formatters.iter().enumerate() {
            let content_types = formatter.content_types();
            if content_types.is_empty() {
                return Err(ConfigError::NoContentTypes { index });
            }
            if let Some(content_type) = content_types
                .iter()
                .find(|content_type| !is_valid_content_type(content_type))
            {
                return Err(ConfigError::InvalidContentType {
                    content_type: (*content_type).to_owned(),
                });
            }
        }

        Ok(Self { formatters })
    }

    /// Returns the built-in formatters: plain text, HTML, image, JSON, SVG
    /// and XML, in that order.
    ///
    /// See [`default_formatters`] for the meaning of `raw_markup`.
    #[must_use]
    pub fn defaults(raw_markup: bool) -> Self {
        Self {
            formatters: default_formatters(raw_markup),
        }
    }

    /// Picks the formatter and content type for the given `Accept` header.
    ///
    /// A missing header behaves like a header that matches nothing.
    #[must_use]
    pub fn negotiate(&self, accept: Option<&str>) -> Negotiated<'_> {
        let accept = accept.unwrap_or_default().to_ascii_lowercase();

        for formatter in &self.formatters {
            for &content_type in formatter.content_types() {
                if accept.contains(&content_type.to_ascii_lowercase()) {
                    debug!(content_type, "negotiated error content type");
                    return Negotiated {
                        content_type,
                        formatter: formatter.as_ref(),
                    };
                }
            }
        }

        let formatter = self.formatters[0].as_ref();
        let content_type = formatter
            .content_types()
            .first()
            .copied()
            .unwrap_or(TEXT_PLAIN);
        debug!(
            content_type,
            accept = accept.as_str(),
            "no error formatter matched; using the default"
        );
        Negotiated {
            content_type,
            formatter,
        }
    }

    /// Negotiates a formatter and renders `error` with it.
    ///
    /// If the negotiated formatter fails, `error` is rendered as plain text
    /// instead, so rendering always produces a body.
    #[must_use]
    pub fn render(&self, error: &ErrorInfo, accept: Option<&str>) -> Rendered {
        let negotiated = self.negotiate(accept);

        match negotiated.formatter.format(error, negotiated.content_type) {
            Ok(body) => Rendered {
                content_type: negotiated.content_type,
                body,
            },
            Err(format_error) => {
                warn!(
                    content_type = negotiated.content_type,
                    error = %format_error,
                    "error formatter failed; falling back to plain text"
                );
                Rendered {
                    content_type: TEXT_PLAIN,
                    body: Bytes::from(PlainFormatter::render(error)),
                }
            }
        }
    }
}

impl Default for Formatters {
    fn default() -> Self {
        Self::defaults(false)
    }
}

/// Content types end up in `HeaderValue::from_static`, which accepts visible
/// ASCII and spaces only.
fn is_valid_content_type(content_type: &str) -> bool {
    !content_type.is_empty()
        && content_type
            .bytes()
            .all(|byte| byte.is_ascii_graphic() || byte == b' ')
        && HeaderValue::from_str(content_type).is_ok()
}

/// The outcome of content negotiation.
#[derive(Debug, Copy, Clone)]
pub struct Negotiated<'a> {
    content_type: &'static str,
    formatter: &'a dyn Formatter,
}

impl<'a> Negotiated<'a> {
    /// Returns the selected content type.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Returns the formatter that declared the selected content type.
    #[must_use]
    pub fn formatter(&self) -> &'a dyn Formatter {
        self.formatter
    }
}

/// A rendered error body together with its content type.
#[derive(Debug, Clone)]
pub struct Rendered {
    content_type: &'static str,
    body: Bytes,
}

impl Rendered {
    /// Returns the content type of the body.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Returns the rendered body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the content type as a header value.
    pub(crate) fn header_value(&self) -> HeaderValue {
        // Declared content types are validated when the formatter set is
        // built.
        HeaderValue::from_static(self.content_type)
    }

    pub(crate) fn into_body(self) -> Bytes {
        self.body
    }
}
