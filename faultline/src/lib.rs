//! Tower middleware turning unhandled errors into content-negotiated HTTP
//! responses.
//!
//! [`ErrorHandlerLayer`] wraps a service and intercepts three kinds of
//! failures: errors returned by the service, panics raised by it, and
//! responses with an error-range status code. Each of them is normalized
//! into an [`ErrorInfo`] and rendered by the [`Formatter`](format::Formatter)
//! matching the request's `Accept` header: plain text, HTML, JSON, XML, SVG
//! or a raster image.
//!
//! # Examples
//!
//! ```
//! use faultline::format::JsonFormatter;
//! use faultline::{ErrorHandlerLayer, StatusCode};
//! use http::{Request, Response};
//! use http_body_util::{BodyExt, Full};
//! use tower::{Layer, ServiceExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let layer = ErrorHandlerLayer::builder()
//!     .formatter(JsonFormatter::new())
//!     .build()
//!     .unwrap();
//! let service = layer.layer(tower::service_fn(|_request: Request<()>| async {
//!     Err::<Response<Full<bytes::Bytes>>, _>(std::io::Error::other("disk full"))
//! }));
//!
//! let response = service.oneshot(Request::new(())).await.unwrap();
//!
//! assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
//! assert_eq!(response.headers()["content-type"], "application/json");
//! let body = response.into_body().collect().await.unwrap().to_bytes();
//! assert_eq!(body, r#"{"type":"Error","code":500,"message":"disk full"}"#);
//! # }
//! ```

pub mod format;

mod config;
mod handler;
mod headers;
mod middleware;
mod negotiate;
mod output;

pub use faultline_core::{
    BoxError, Context, ErrorInfo, ErrorKind, HttpError, StatusCode, UncaughtPanic,
};

pub use crate::config::{ConfigError, ErrorHandlerConfig, ErrorHandlerConfigBuilder, FormatterKind};
pub use crate::handler::{DynErrorPageHandler, ErrorAttribute, ErrorPageHandler};
pub use crate::middleware::{ErrorHandlerBuilder, ErrorHandlerLayer, ErrorHandlerService};
pub use crate::negotiate::{Formatters, Negotiated, Rendered};
pub use crate::output::OutputBuffer;
