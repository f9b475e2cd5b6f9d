pub(crate) const TEXT_PLAIN: &str = "text/plain";
pub(crate) const TEXT_CSS: &str = "text/css";
pub(crate) const TEXT_JAVASCRIPT: &str = "text/javascript";
pub(crate) const TEXT_HTML: &str = "text/html";
pub(crate) const APPLICATION_JSON: &str = "application/json";
pub(crate) const TEXT_XML: &str = "text/xml";
pub(crate) const APPLICATION_XML: &str = "application/xml";
pub(crate) const IMAGE_SVG: &str = "image/svg+xml";
pub(crate) const IMAGE_GIF: &str = "image/gif";
pub(crate) const IMAGE_JPEG: &str = "image/jpeg";
pub(crate) const IMAGE_PNG: &str = "image/png";
pub(crate) const IMAGE_WEBP: &str = "image/webp";
