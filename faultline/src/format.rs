//! Formatters rendering an [`ErrorInfo`] into a response body.
//!
//! A formatter declares the content types it can produce and renders an
//! error for one of them. The middleware picks a formatter by matching the
//! declared content types against the request's `Accept` header (see
//! [`Formatters`](crate::Formatters)).
//!
//! The built-in formatters are:
//!
//! | Formatter         | Content types                                        |
//! |-------------------|------------------------------------------------------|
//! | [`PlainFormatter`] | `text/plain`, `text/css`, `text/javascript`         |
//! | [`HtmlFormatter`]  | `text/html`                                         |
//! | [`ImageFormatter`] | `image/gif`, `image/jpeg`, `image/png`, `image/webp` |
//! | [`JsonFormatter`]  | `application/json`                                  |
//! | [`SvgFormatter`]   | `image/svg+xml`                                     |
//! | [`XmlFormatter`]   | `text/xml`, `application/xml`                       |
//!
//! # Custom formatters
//!
//! ```
//! use bytes::Bytes;
//! use faultline::ErrorInfo;
//! use faultline::format::{FormatError, Formatter};
//!
//! #[derive(Debug)]
//! struct CsvFormatter;
//!
//! impl Formatter for CsvFormatter {
//!     fn content_types(&self) -> &[&'static str] {
//!         &["text/csv"]
//!     }
//!
//!     fn format(&self, error: &ErrorInfo, _content_type: &str) -> Result<Bytes, FormatError> {
//!         Ok(Bytes::from(format!(
//!             "code,message\n{},{}",
//!             error.status_code().as_u16(),
//!             error.message()
//!         )))
//!     }
//! }
//! ```

mod html;
mod json;
mod plain;
mod raster;
mod svg;
mod xml;

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use faultline_core::ErrorInfo;
use thiserror::Error;

pub use self::html::HtmlFormatter;
pub use self::json::JsonFormatter;
pub use self::plain::PlainFormatter;
pub use self::raster::ImageFormatter;
pub use self::svg::SvgFormatter;
pub use self::xml::XmlFormatter;

/// An error that can occur while rendering an error into a response body.
///
/// The middleware never sends these to the client; when the negotiated
/// formatter fails, the error is rendered as plain text instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormatError {
    /// A markup template could not be rendered.
    #[error("failed to render template: {0}")]
    Template(#[from] askama::Error),
    /// The JSON document could not be serialized.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The raster image could not be encoded.
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
    /// The formatter was asked for a content type it does not declare.
    #[error("content type `{0}` is not supported by this formatter")]
    UnsupportedContentType(String),
}

/// Renders errors for a fixed, ordered list of content types.
///
/// Implementations must be pure functions of the [`ErrorInfo`]: formatting
/// the same error twice yields the same bytes, and a formatter can be used
/// from many requests at once.
pub trait Formatter: Debug + Send + Sync {
    /// The content types this formatter can produce, in order of preference.
    ///
    /// The list must not be empty.
    fn content_types(&self) -> &[&'static str];

    /// Renders `error` as `content_type`.
    ///
    /// `content_type` is always one of the values returned by
    /// [`content_types`](Formatter::content_types).
    ///
    /// # Errors
    ///
    /// Returns an error if the body could not be produced.
    fn format(&self, error: &ErrorInfo, content_type: &str) -> Result<Bytes, FormatError>;
}

/// Returns the default, ordered set of formatters.
///
/// Plain text comes first, which makes it the fallback for requests whose
/// `Accept` header matches no formatter. Markup formatters escape the error
/// message unless `raw_markup` is set.
#[must_use]
pub fn default_formatters(raw_markup: bool) -> Vec<Arc<dyn Formatter>> {
    let (html, svg, xml) = if raw_markup {
        (
            HtmlFormatter::raw(),
            SvgFormatter::raw(),
            XmlFormatter::raw(),
        )
    } else {
        (
            HtmlFormatter::new(),
            SvgFormatter::new(),
            XmlFormatter::new(),
        )
    };

    vec![
        Arc::new(PlainFormatter::new()),
        Arc::new(html),
        Arc::new(ImageFormatter::new()),
        Arc::new(JsonFormatter::new()),
        Arc::new(svg),
        Arc::new(xml),
    ]
}

fn unsupported(content_type: &str) -> FormatError {
    FormatError::UnsupportedContentType(content_type.to_owned())
}
