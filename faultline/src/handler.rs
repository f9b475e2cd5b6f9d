//! Custom error page handlers.
//!
//! Instead of rendering errors with the registered formatters, the
//! middleware can hand them to an [`ErrorPageHandler`]. The handler receives
//! a copy of the failed request's head with the error attached under a
//! named [`ErrorAttribute`].

use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::response::IntoResponse;
use derive_more::with_trait::Debug;
use faultline_core::ErrorInfo;
use http::{Extensions, Request, Response};

/// A trait for building error pages.
///
/// The request passed to the handler is **not** the original request: it
/// carries the method, URI, version, headers and extensions of the failed
/// request but no body, and has an [`ErrorAttribute`] in its extensions.
///
/// The trait is implemented for all async functions and closures taking a
/// `Request<()>` and returning a type that implements [`IntoResponse`].
///
/// # Examples
///
/// ```
/// use faultline::{ErrorAttribute, ErrorHandlerLayer};
/// use http::Request;
///
/// async fn error_page(request: Request<()>) -> (http::StatusCode, String) {
///     let error = ErrorAttribute::get(request.extensions(), "error").unwrap();
///     (
///         error.status_code(),
///         format!("{} {} went wrong", request.method(), request.uri()),
///     )
/// }
///
/// let layer = ErrorHandlerLayer::builder()
///     .error_page_handler(error_page)
///     .build()
///     .unwrap();
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid error page handler",
    label = "not a valid error page handler",
    note = "make sure the function is marked `async`",
    note = "make sure the function takes a single `Request<()>` parameter",
    note = "make sure the function returns a type that implements `IntoResponse`"
)]
pub trait ErrorPageHandler {
    /// Builds an error page for the given request.
    fn handle(&self, request: Request<()>) -> impl Future<Output = Response<Body>> + Send;
}

impl<Func, Fut, R> ErrorPageHandler for Func
where
    Func: Fn(Request<()>) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send,
    R: IntoResponse,
{
    fn handle(&self, request: Request<()>) -> impl Future<Output = Response<Body>> + Send {
        let response = self(request);
        async move { response.await.into_response() }
    }
}

trait BoxErrorPageHandler: Send + Sync {
    fn handle(
        &self,
        request: Request<()>,
    ) -> Pin<Box<dyn Future<Output = Response<Body>> + Send + '_>>;
}

impl<H: ErrorPageHandler + Send + Sync> BoxErrorPageHandler for H {
    fn handle(
        &self,
        request: Request<()>,
    ) -> Pin<Box<dyn Future<Output = Response<Body>> + Send + '_>> {
        Box::pin(ErrorPageHandler::handle(self, request))
    }
}

/// A type-erased wrapper around an error page handler.
#[derive(Debug, Clone)]
pub struct DynErrorPageHandler {
    #[debug("..")]
    handler: Arc<dyn BoxErrorPageHandler>,
}

impl DynErrorPageHandler {
    /// Creates a new `DynErrorPageHandler` from a concrete error page handler.
    pub fn new<H>(handler: H) -> Self
    where
        H: ErrorPageHandler + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub(crate) async fn handle(&self, request: Request<()>) -> Response<Body> {
        self.handler.handle(request).await
    }
}

/// The error being handled, as seen by a custom error page handler.
///
/// The middleware stores one `ErrorAttribute` in the extensions of the
/// request it passes to the handler. The attribute name is configurable so
/// that applications can keep their own conventions.
#[derive(Debug, Clone)]
pub struct ErrorAttribute {
    name: Arc<str>,
    error: ErrorInfo,
}

impl ErrorAttribute {
    pub(crate) fn new(name: Arc<str>, error: ErrorInfo) -> Self {
        Self { name, error }
    }

    /// Returns the error stored in `extensions` under `name`, if any.
    #[must_use]
    pub fn get<'a>(extensions: &'a Extensions, name: &str) -> Option<&'a ErrorInfo> {
        extensions
            .get::<Self>()
            .filter(|attribute| &*attribute.name == name)
            .map(Self::error)
    }

    /// Returns the name of the attribute.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the error.
    #[must_use]
    pub fn error(&self) -> &ErrorInfo {
        &self.error
    }
}
