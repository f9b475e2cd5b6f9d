//! Declarative configuration for the error handling middleware.
//!
//! [`ErrorHandlerConfig`] can be built in code with
//! [`ErrorHandlerConfig::builder`] or parsed from TOML with
//! [`ErrorHandlerConfig::from_toml`], and is then applied with
//! [`ErrorHandlerLayer::from_config`](crate::ErrorHandlerLayer::from_config).
//!
//! # Examples
//!
//! ```
//! use faultline::{ErrorHandlerConfig, FormatterKind};
//!
//! let config = ErrorHandlerConfig::from_toml(
//!     r#"
//!     catch_errors = false
//!     formatters = ["json", "plain"]
//!     "#,
//! )
//! .unwrap();
//!
//! assert!(!config.catch_errors);
//! assert_eq!(config.attribute, "error");
//! assert_eq!(config.formatters, [FormatterKind::Json, FormatterKind::Plain]);
//! ```

use std::sync::Arc;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::{
    Formatter, HtmlFormatter, ImageFormatter, JsonFormatter, PlainFormatter, SvgFormatter,
    XmlFormatter,
};

pub(crate) const DEFAULT_ATTRIBUTE: &str = "error";

/// An error that can occur while configuring the error handling middleware.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No formatters were registered.
    #[error("at least one error formatter must be registered")]
    NoFormatters,
    /// A formatter declares no content types.
    #[error("the error formatter at position {index} declares no content types")]
    NoContentTypes {
        /// The position of the formatter in registration order.
        index: usize,
    },
    /// A formatter declares a content type that is not a valid header value.
    #[error("`{content_type}` is not a valid content type")]
    InvalidContentType {
        /// The offending content type.
        content_type: String,
    },
    /// The TOML configuration could not be parsed.
    #[error("could not parse the error handler configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A built-in error formatter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum FormatterKind {
    /// [`PlainFormatter`]
    Plain,
    /// [`HtmlFormatter`]
    Html,
    /// [`ImageFormatter`]
    Image,
    /// [`JsonFormatter`]
    Json,
    /// [`SvgFormatter`]
    Svg,
    /// [`XmlFormatter`]
    Xml,
}

impl FormatterKind {
    /// All built-in formatters, in their default order.
    pub const ALL: [Self; 6] = [
        Self::Plain,
        Self::Html,
        Self::Image,
        Self::Json,
        Self::Svg,
        Self::Xml,
    ];

    /// Creates the formatter.
    ///
    /// `raw_markup` disables escaping of the error message in the HTML, SVG
    /// and XML formatters; it is ignored by the others.
    #[must_use]
    pub fn formatter(self, raw_markup: bool) -> Arc<dyn Formatter> {
        match (self, raw_markup) {
            (Self::Plain, _) => Arc::new(PlainFormatter::new()),
            (Self::Html, false) => Arc::new(HtmlFormatter::new()),
            (Self::Html, true) => Arc::new(HtmlFormatter::raw()),
            (Self::Image, _) => Arc::new(ImageFormatter::new()),
            (Self::Json, _) => Arc::new(JsonFormatter::new()),
            (Self::Svg, false) => Arc::new(SvgFormatter::new()),
            (Self::Svg, true) => Arc::new(SvgFormatter::raw()),
            (Self::Xml, false) => Arc::new(XmlFormatter::new()),
            (Self::Xml, true) => Arc::new(XmlFormatter::raw()),
        }
    }
}

/// The configuration of the error handling middleware.
///
/// Missing keys take their default values when the configuration is
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(build_fn(skip, error = std::convert::Infallible), derive(Debug))]
#[serde(default)]
#[non_exhaustive]
pub struct ErrorHandlerConfig {
    /// Whether failures returned by the inner service and panics are turned
    /// into error responses.
    ///
    /// [`HttpError`](crate::HttpError)s and error-range status codes are
    /// always handled. When this is `false`, other failures are passed on to
    /// the caller and panics are not caught.
    ///
    /// Default: `true`
    pub catch_errors: bool,
    /// The name under which the error is exposed to custom error page
    /// handlers.
    ///
    /// Default: `"error"`
    #[builder(setter(into))]
    pub attribute: String,
    /// Whether markup formatters insert error messages without escaping.
    ///
    /// Only enable this when error messages never contain user input.
    ///
    /// Default: `false`
    pub raw_markup: bool,
    /// The built-in formatters to register, in order.
    ///
    /// The first one is used when the `Accept` header matches none of them.
    ///
    /// Default: all built-in formatters, in [`FormatterKind::ALL`] order
    pub formatters: Vec<FormatterKind>,
}

impl ErrorHandlerConfigBuilder {
    /// Builds the configuration, filling in defaults for unset values.
    #[must_use]
    pub fn build(&self) -> ErrorHandlerConfig {
        ErrorHandlerConfig {
            catch_errors: self.catch_errors.unwrap_or(true),
            attribute: self
                .attribute
                .clone()
                .unwrap_or_else(|| DEFAULT_ATTRIBUTE.to_owned()),
            raw_markup: self.raw_markup.unwrap_or_default(),
            formatters: self
                .formatters
                .clone()
                .unwrap_or_else(|| FormatterKind::ALL.to_vec()),
        }
    }
}

impl ErrorHandlerConfig {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use faultline::{ErrorHandlerConfig, FormatterKind};
    ///
    /// let config = ErrorHandlerConfig::builder()
    ///     .attribute("failure")
    ///     .formatters(vec![FormatterKind::Html])
    ///     .build();
    ///
    /// assert!(config.catch_errors);
    /// assert_eq!(config.attribute, "failure");
    /// ```
    #[must_use]
    pub fn builder() -> ErrorHandlerConfigBuilder {
        ErrorHandlerConfigBuilder::default()
    }

    /// Parses a configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is not valid TOML or
    /// does not describe a valid configuration.
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_content)?;
        Ok(config)
    }

    /// Creates the configured formatters, in order.
    #[must_use]
    pub fn build_formatters(&self) -> Vec<Arc<dyn Formatter>> {
        self.formatters
            .iter()
            .map(|kind| kind.formatter(self.raw_markup))
            .collect()
    }
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
