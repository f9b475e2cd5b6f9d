mod error_info;
mod http_error;
mod uncaught_panic;

pub use error_info::{ErrorInfo, ErrorKind};
pub use http_error::HttpError;
pub use uncaught_panic::UncaughtPanic;
