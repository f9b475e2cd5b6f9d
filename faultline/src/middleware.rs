//! The error handling middleware.
//!
//! [`ErrorHandlerLayer`] wraps a [`tower::Service`] handling HTTP requests.
//! Whenever the service fails, panics or responds with an error-range status
//! code, the middleware replaces the outcome with an error response whose
//! body format is negotiated against the request's `Accept` header.

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::Bytes;
use derive_more::with_trait::Debug;
use faultline_core::{BoxError, ErrorInfo, HttpError, StatusCode, UncaughtPanic};
use futures_util::FutureExt;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderMap, Request, Response};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use crate::config::{ConfigError, DEFAULT_ATTRIBUTE, ErrorHandlerConfig};
use crate::format::Formatter;
use crate::handler::{DynErrorPageHandler, ErrorAttribute, ErrorPageHandler};
use crate::negotiate::Formatters;
use crate::output::{OutputBuffer, OutputCapture};

type StatusPredicate = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&ErrorInfo, &Parts) + Send + Sync>;

/// A [`Layer`] that turns unhandled errors into formatted error responses.
///
/// Three kinds of outcomes are treated as errors:
///
/// * an [`HttpError`] returned by the inner service, rendered with its own
///   status code, message and context;
/// * any other failure returned by the inner service, and any panic raised
///   by it, rendered with status `500` unless an [`HttpError`] is found in
///   the failure's source chain. This only happens when catching is enabled
///   (the default); otherwise failures are passed on and panics unwind;
/// * a response whose status code is considered an error (by default, any
///   `4xx` or `5xx` code). Its body is discarded.
///
/// The error is rendered by the first registered formatter whose content type
/// appears in the `Accept` header (see [`Formatters`]), or handed to a custom
/// [`ErrorPageHandler`] if one is configured. Successful responses pass
/// through untouched.
///
/// # Examples
///
/// ```
/// use faultline::{ErrorHandlerLayer, HttpError, StatusCode};
/// use http::{Request, Response};
/// use http_body_util::{BodyExt, Empty};
/// use tower::{ServiceBuilder, ServiceExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let service = ServiceBuilder::new()
///     .layer(ErrorHandlerLayer::new())
///     .service_fn(|_request: Request<()>| async {
///         Err::<Response<Empty<bytes::Bytes>>, _>(HttpError::new(StatusCode::NOT_FOUND))
///     });
///
/// let request = Request::builder()
///     .header("accept", "application/json")
///     .body(())
///     .unwrap();
/// let response = service.oneshot(request).await.unwrap();
///
/// assert_eq!(response.status(), StatusCode::NOT_FOUND);
/// let body = response.into_body().collect().await.unwrap().to_bytes();
/// assert_eq!(body, r#"{"type":"HttpError","code":404,"message":"Not Found"}"#);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ErrorHandlerLayer {
    shared: Arc<Shared>,
}

impl ErrorHandlerLayer {
    /// Creates a new layer with the default configuration.
    ///
    /// This catches failures and panics, treats `4xx` and `5xx` responses as
    /// errors and renders them with the built-in formatters.
    #[must_use]
    pub fn new() -> Self {
        ErrorHandlerBuilder::new().finish(Formatters::default())
    }

    /// Creates a new builder for the layer.
    pub fn builder() -> ErrorHandlerBuilder {
        ErrorHandlerBuilder::new()
    }

    /// Creates a new layer from a declarative configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoFormatters`] if the configuration lists no
    /// formatters.
    pub fn from_config(config: &ErrorHandlerConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }
}

impl Default for ErrorHandlerLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for ErrorHandlerLayer {
    type Service = ErrorHandlerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorHandlerService {
            inner,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// A builder for [`ErrorHandlerLayer`].
#[derive(Debug)]
#[must_use]
pub struct ErrorHandlerBuilder {
    formatters: Option<Vec<Arc<dyn Formatter>>>,
    raw_markup: bool,
    #[debug("..")]
    is_error: StatusPredicate,
    catch_errors: bool,
    attribute: Arc<str>,
    #[debug("..")]
    on_error: Option<ErrorHook>,
    error_page_handler: Option<DynErrorPageHandler>,
}

impl ErrorHandlerBuilder {
    fn new() -> Self {
        Self {
            formatters: None,
            raw_markup: false,
            is_error: Arc::new(|status: StatusCode| {
                status.is_client_error() || status.is_server_error()
            }),
            catch_errors: true,
            attribute: Arc::from(DEFAULT_ATTRIBUTE),
            on_error: None,
            error_page_handler: None,
        }
    }

    /// Registers a formatter after the ones already registered.
    ///
    /// Registering any formatter replaces the built-in set.
    pub fn formatter<F>(mut self, formatter: F) -> Self
    where
        F: Formatter + 'static,
    {
        self.formatters
            .get_or_insert_with(Vec::new)
            .push(Arc::new(formatter));
        self
    }

    /// Registers several formatters after the ones already registered.
    ///
    /// Registering any formatter replaces the built-in set. Passing an empty
    /// iterator without registering anything else makes
    /// [`build`](Self::build) fail.
    pub fn formatters<I>(mut self, formatters: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Formatter>>,
    {
        self.formatters
            .get_or_insert_with(Vec::new)
            .extend(formatters);
        self
    }

    /// Sets whether the built-in markup formatters skip escaping of error
    /// messages.
    ///
    /// Has no effect once formatters are registered explicitly.
    pub fn raw_markup(mut self, raw_markup: bool) -> Self {
        self.raw_markup = raw_markup;
        self
    }

    /// Sets the predicate deciding which response status codes are errors.
    ///
    /// Default: `400..=599`
    pub fn status_code<P>(mut self, is_error: P) -> Self
    where
        P: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.is_error = Arc::new(is_error);
        self
    }

    /// Sets whether failures other than [`HttpError`] and panics are turned
    /// into error responses.
    ///
    /// Default: `true`
    pub fn catch_errors(mut self, catch_errors: bool) -> Self {
        self.catch_errors = catch_errors;
        self
    }

    /// Sets the name under which custom error page handlers find the error.
    ///
    /// Default: `"error"`
    pub fn attribute<T: Into<Arc<str>>>(mut self, attribute: T) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Sets a callback invoked for every handled error, e.g. for logging.
    ///
    /// The callback receives the error and the head of the failed request. A
    /// panicking callback does not affect the response.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&ErrorInfo, &Parts) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// Hands errors to `handler` instead of rendering them with the
    /// formatters.
    pub fn error_page_handler<H>(mut self, handler: H) -> Self
    where
        H: ErrorPageHandler + Send + Sync + 'static,
    {
        self.error_page_handler = Some(DynErrorPageHandler::new(handler));
        self
    }

    /// Applies a declarative configuration.
    ///
    /// The configured formatters replace any registered ones.
    pub fn config(mut self, config: &ErrorHandlerConfig) -> Self {
        self.formatters = Some(config.build_formatters());
        self.raw_markup = config.raw_markup;
        self.catch_errors = config.catch_errors;
        self.attribute = Arc::from(config.attribute.as_str());
        self
    }

    /// Builds the layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the registered formatters are empty or declare
    /// invalid content types. See [`Formatters::new`].
    pub fn build(mut self) -> Result<ErrorHandlerLayer, ConfigError> {
        let formatters = match self.formatters.take() {
            Some(formatters) => Formatters::new(formatters)?,
            None => Formatters::defaults(self.raw_markup),
        };

        Ok(self.finish(formatters))
    }

    fn finish(self, formatters: Formatters) -> ErrorHandlerLayer {
        ErrorHandlerLayer {
            shared: Arc::new(Shared {
                formatters,
                is_error: self.is_error,
                catch_errors: self.catch_errors,
                attribute: self.attribute,
                on_error: self.on_error,
                error_page_handler: self.error_page_handler,
            }),
        }
    }
}

#[derive(Debug)]
struct Shared {
    formatters: Formatters,
    #[debug("..")]
    is_error: StatusPredicate,
    catch_errors: bool,
    attribute: Arc<str>,
    #[debug("..")]
    on_error: Option<ErrorHook>,
    error_page_handler: Option<DynErrorPageHandler>,
}

impl Shared {
    /// Turns a failure of the inner service into an error record, or gives
    /// it back if it should be propagated.
    fn classify(&self, failure: BoxError) -> Result<ErrorInfo, BoxError> {
        let failure = match failure.downcast::<HttpError>() {
            Ok(http_error) => return Ok(ErrorInfo::from(*http_error)),
            Err(failure) => failure,
        };
        if !self.catch_errors {
            return Err(failure);
        }

        match failure.downcast::<UncaughtPanic>() {
            Ok(panic) => Ok(ErrorInfo::from(*panic)),
            Err(failure) => Ok(ErrorInfo::from_failure(failure)),
        }
    }

    fn report(&self, error: &ErrorInfo, head: &Parts) {
        let Some(on_error) = &self.on_error else {
            return;
        };

        if std::panic::catch_unwind(AssertUnwindSafe(|| on_error(error, head))).is_err() {
            warn!(
                status = error.status_code().as_u16(),
                "error callback panicked; the error response is unaffected"
            );
        }
    }

    async fn respond(&self, error: ErrorInfo, head: Parts) -> Response<Body> {
        self.report(&error, &head);

        if let Some(handler) = &self.error_page_handler {
            let mut request = Request::from_parts(head, ());
            request
                .extensions_mut()
                .insert(ErrorAttribute::new(Arc::clone(&self.attribute), error));
            return handler.handle(request).await;
        }

        let accept = accept_header(&head.headers);
        let rendered = self.formatters.render(&error, Some(accept.as_str()));
        let content_type = rendered.header_value();

        let mut response = Response::new(Body::from(rendered.into_body()));
        *response.status_mut() = error.status_code();
        response.headers_mut().insert(CONTENT_TYPE, content_type);
        response
    }
}

/// The [`Service`] produced by [`ErrorHandlerLayer`].
#[derive(Debug, Clone)]
pub struct ErrorHandlerService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ErrorHandlerService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: http_body::Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // The clone might not be ready; keep the service that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let shared = Arc::clone(&self.shared);

        let output = OutputBuffer::new();
        request.extensions_mut().insert(output.clone());
        let (head, body) = request.into_parts();
        let request = Request::from_parts(head.clone(), body);

        Box::pin(async move {
            let _capture = OutputCapture::new(output);

            let result = if shared.catch_errors {
                AssertUnwindSafe(async move { inner.call(request).await.map_err(Into::into) })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(BoxError::from(UncaughtPanic::new(payload))))
            } else {
                inner.call(request).await.map_err(Into::into)
            };

            let error = match result {
                Ok(response) if !(shared.is_error)(response.status()) => {
                    return Ok(response.map(Body::new));
                }
                Ok(response) => {
                    debug!(
                        status = response.status().as_u16(),
                        "inner service responded with an error status"
                    );
                    ErrorInfo::from_status(response.status())
                }
                Err(failure) => {
                    let error = shared.classify(failure)?;
                    log_failure(&error, &head);
                    error
                }
            };

            Ok(shared.respond(error, head).await)
        })
    }
}

fn log_failure(error: &ErrorInfo, head: &Parts) {
    error!(
        status = error.status_code().as_u16(),
        kind = %error.kind(),
        method = %head.method,
        uri = %head.uri,
        cause = error.cause().map(tracing::field::display),
        "request failed: {}",
        error.message()
    );
}

/// Joins all `Accept` header lines, skipping the ones that are not valid
/// UTF-8.
fn accept_header(headers: &HeaderMap) -> String {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ")
}
