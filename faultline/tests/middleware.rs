use std::sync::{Arc, Mutex};

use axum::body::Body;
use bytes::Bytes;
use faultline::format::{FormatError, Formatter};
use faultline::{
    BoxError, ErrorAttribute, ErrorHandlerConfig, ErrorHandlerLayer, ErrorInfo, FormatterKind,
    HttpError, OutputBuffer, StatusCode,
};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use tower::{Layer, Service, ServiceExt};

type TestResponse = Response<Full<Bytes>>;

const DEFAULT_CONTENT_TYPES: [&str; 12] = [
    "text/plain",
    "text/css",
    "text/javascript",
    "text/html",
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/webp",
    "application/json",
    "image/svg+xml",
    "text/xml",
    "application/xml",
];

async fn call<S>(layer: &ErrorHandlerLayer, service: S, request: Request<()>) -> Response<Body>
where
    S: Service<Request<()>, Response = TestResponse, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    layer.layer(service).oneshot(request).await.unwrap()
}

fn request(accept: Option<&str>) -> Request<()> {
    let mut builder = Request::builder().uri("/");
    if let Some(accept) = accept {
        builder = builder.header(ACCEPT, accept);
    }
    builder.body(()).unwrap()
}

fn status_response(status: StatusCode, body: &'static str) -> TestResponse {
    let mut response = TestResponse::new(Full::from(body));
    *response.status_mut() = status;
    response
}

async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

async fn crash() -> Result<TestResponse, BoxError> {
    panic!("template engine crashed")
}

fn content_type(response: &Response<Body>) -> &str {
    response.headers()[CONTENT_TYPE].to_str().unwrap()
}

#[derive(Debug)]
struct Named {
    name: &'static str,
    content_types: &'static [&'static str],
}

impl Formatter for Named {
    fn content_types(&self) -> &[&'static str] {
        self.content_types
    }

    fn format(&self, error: &ErrorInfo, _content_type: &str) -> Result<Bytes, FormatError> {
        Ok(Bytes::from(format!(
            "{}:{}",
            self.name,
            error.status_code().as_u16()
        )))
    }
}

#[derive(Debug)]
struct AlwaysFails;

impl Formatter for AlwaysFails {
    fn content_types(&self) -> &[&'static str] {
        &["application/problem+json"]
    }

    fn format(&self, _error: &ErrorInfo, content_type: &str) -> Result<Bytes, FormatError> {
        Err(FormatError::UnsupportedContentType(content_type.to_owned()))
    }
}

#[tokio::test]
async fn every_error_status_is_formatted_as_plain_text() {
    let layer = ErrorHandlerLayer::new();

    for code in 400..600 {
        let status = StatusCode::from_u16(code).unwrap();
        let service = tower::service_fn(move |_request: Request<()>| async move {
            Ok::<_, BoxError>(status_response(status, "original body"))
        });

        for accept in [None, Some("application/msword")] {
            let response = call(&layer, service.clone(), request(accept)).await;

            assert_eq!(response.status(), status);
            assert_eq!(content_type(&response), "text/plain");
            let reason = status.canonical_reason().unwrap_or("Unknown Error");
            let body = body_string(response).await;
            assert!(!body.contains("original body"), "{code}");
            assert_eq!(body, format!("HttpError {code}\n{reason}"));
        }
    }
}

#[tokio::test]
async fn every_content_type_is_honored() {
    let layer = ErrorHandlerLayer::new();
    let service = tower::service_fn(|_request: Request<()>| async {
        Ok::<_, BoxError>(status_response(StatusCode::CONFLICT, ""))
    });

    for accept in DEFAULT_CONTENT_TYPES {
        let response = call(&layer, service.clone(), request(Some(accept))).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(content_type(&response), accept);
        assert_eq!(response.headers().get_all(CONTENT_TYPE).iter().count(), 1);
        assert!(!body_bytes(response).await.is_empty(), "{accept}");
    }
}

#[tokio::test]
async fn earlier_formatter_wins() {
    let layer = ErrorHandlerLayer::builder()
        .formatter(Named {
            name: "first",
            content_types: &["text/csv", "application/vnd.report"],
        })
        .formatter(Named {
            name: "second",
            content_types: &["application/vnd.report"],
        })
        .build()
        .unwrap();
    let service = tower::service_fn(|_request: Request<()>| async {
        Ok::<_, BoxError>(status_response(StatusCode::NOT_FOUND, ""))
    });

    for _ in 0..3 {
        let response = call(
            &layer,
            service.clone(),
            request(Some("application/vnd.report, text/plain")),
        )
        .await;

        assert_eq!(content_type(&response), "application/vnd.report");
        assert_eq!(body_string(response).await, "first:404");
    }
}

#[tokio::test]
async fn unknown_accept_uses_first_formatter() {
    let layer = ErrorHandlerLayer::new();
    let service = tower::service_fn(|_request: Request<()>| async {
        Ok::<_, BoxError>(status_response(StatusCode::BAD_REQUEST, ""))
    });

    let response = call(&layer, service, request(Some("unknown/type"))).await;

    assert_eq!(content_type(&response), "text/plain");
}

#[tokio::test]
async fn generic_failure_is_caught() {
    let layer = ErrorHandlerLayer::new();
    let service = tower::service_fn(|_request: Request<()>| async {
        Err::<TestResponse, BoxError>("Something went wrong".into())
    });

    let response = call(&layer, service, request(None)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type(&response), "text/plain");
    assert!(
        body_string(response)
            .await
            .contains("Something went wrong")
    );
}

#[tokio::test]
async fn not_found_as_json() {
    let layer = ErrorHandlerLayer::new();
    let service = tower::service_fn(|_request: Request<()>| async {
        Ok::<_, BoxError>(status_response(StatusCode::NOT_FOUND, "<h1>no such page</h1>"))
    });

    let response = call(&layer, service, request(Some("application/json"))).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(content_type(&response), "application/json");
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["code"], 404);
    assert_eq!(json["message"], "Not Found");
    assert_eq!(json["type"], "HttpError");
}

#[tokio::test]
async fn custom_predicate_passes_other_statuses_through() {
    let layer = ErrorHandlerLayer::builder()
        .status_code(|status| status == StatusCode::NOT_FOUND)
        .build()
        .unwrap();
    let service = tower::service_fn(|_request: Request<()>| async {
        let mut response = status_response(StatusCode::INTERNAL_SERVER_ERROR, "original body");
        response
            .headers_mut()
            .insert("x-upstream", "legacy".parse().unwrap());
        Ok::<_, BoxError>(response)
    });

    let response = call(&layer, service, request(Some("application/json"))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["x-upstream"], "legacy");
    assert!(response.headers().get(CONTENT_TYPE).is_none());
    assert_eq!(body_string(response).await, "original body");
}

#[tokio::test]
async fn success_passes_through() {
    let layer = ErrorHandlerLayer::new();
    let service = tower::service_fn(|_request: Request<()>| async {
        Ok::<_, BoxError>(status_response(StatusCode::CREATED, "created"))
    });

    let response = call(&layer, service, request(Some("text/html"))).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_string(response).await, "created");
}

#[tokio::test]
async fn failure_propagates_when_not_catching() {
    let layer = ErrorHandlerLayer::builder()
        .catch_errors(false)
        .build()
        .unwrap();
    let service = tower::service_fn(|_request: Request<()>| async {
        Err::<TestResponse, BoxError>(Box::new(std::io::Error::other("socket closed")))
    });

    let error = layer
        .layer(service)
        .oneshot(request(None))
        .await
        .unwrap_err();

    let io_error = error.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(io_error.to_string(), "socket closed");
}

#[tokio::test]
async fn http_error_is_formatted_when_not_catching() {
    let layer = ErrorHandlerLayer::builder()
        .catch_errors(false)
        .build()
        .unwrap();
    let service = tower::service_fn(|_request: Request<()>| async {
        Err::<TestResponse, BoxError>(Box::new(
            HttpError::new(StatusCode::UNPROCESSABLE_ENTITY)
                .with_message("invalid email")
                .with_context("field", "email"),
        ))
    });

    let response = call(&layer, service, request(Some("application/json"))).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "type": "HttpError",
            "code": 422,
            "message": "invalid email",
            "context": { "field": "email" },
        })
    );
}

#[tokio::test]
async fn panic_is_caught_and_output_discarded() {
    let captured: Arc<Mutex<Option<OutputBuffer>>> = Arc::default();
    let layer = ErrorHandlerLayer::new();
    let service = {
        let captured = Arc::clone(&captured);
        tower::service_fn(move |request: Request<()>| {
            let captured = Arc::clone(&captured);
            async move {
                let output = request.extensions().get::<OutputBuffer>().unwrap().clone();
                output.write_bytes("<pre>half-rendered template</pre>");
                *captured.lock().unwrap() = Some(output);
                crash().await
            }
        })
    };

    let response = call(&layer, service, request(Some("text/html"))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(body.contains("<h1>UncaughtPanic 500</h1>"));
    assert!(body.contains("template engine crashed"));
    assert!(!body.contains("half-rendered"));
    let output = captured.lock().unwrap().take().unwrap();
    assert!(output.is_empty());
}

#[tokio::test]
#[should_panic(expected = "template engine crashed")]
async fn panic_unwinds_when_not_catching() {
    let layer = ErrorHandlerLayer::builder()
        .catch_errors(false)
        .build()
        .unwrap();
    let service = tower::service_fn(|_request: Request<()>| crash());

    call(&layer, service, request(None)).await;
}

#[tokio::test]
async fn output_is_discarded_on_success() {
    let captured: Arc<Mutex<Option<OutputBuffer>>> = Arc::default();
    let layer = ErrorHandlerLayer::new();
    let service = {
        let captured = Arc::clone(&captured);
        tower::service_fn(move |request: Request<()>| {
            let captured = Arc::clone(&captured);
            async move {
                let output = request.extensions().get::<OutputBuffer>().unwrap().clone();
                output.write_bytes("debug output");
                *captured.lock().unwrap() = Some(output);
                Ok::<_, BoxError>(status_response(StatusCode::OK, "page"))
            }
        })
    };

    let response = call(&layer, service, request(None)).await;

    assert_eq!(body_string(response).await, "page");
    assert!(captured.lock().unwrap().take().unwrap().is_empty());
}

#[tokio::test]
async fn custom_handler_receives_error_attribute() {
    let layer = ErrorHandlerLayer::builder()
        .attribute("failure")
        .error_page_handler(|request: Request<()>| async move {
            let error = ErrorAttribute::get(request.extensions(), "failure").unwrap();
            (
                error.status_code(),
                format!("{} {}: {}", request.method(), request.uri(), error.message()),
            )
        })
        .build()
        .unwrap();
    let service = tower::service_fn(|_request: Request<()>| async {
        Err::<TestResponse, BoxError>(Box::new(
            HttpError::new(StatusCode::FORBIDDEN).with_message("members only"),
        ))
    });
    let request = Request::builder()
        .method("DELETE")
        .uri("/posts/3")
        .body(())
        .unwrap();

    let response = call(&layer, service, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "DELETE /posts/3: members only");
}

#[tokio::test]
async fn failing_formatter_falls_back_to_plain_text() {
    let layer = ErrorHandlerLayer::builder()
        .formatter(AlwaysFails)
        .build()
        .unwrap();
    let service = tower::service_fn(|_request: Request<()>| async {
        Ok::<_, BoxError>(status_response(StatusCode::SERVICE_UNAVAILABLE, ""))
    });

    let response = call(&layer, service, request(None)).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(content_type(&response), "text/plain");
    assert_eq!(
        body_string(response).await,
        "HttpError 503\nService Unavailable"
    );
}

#[tokio::test]
async fn config_selects_formatters() {
    let config = ErrorHandlerConfig::builder()
        .formatters(vec![FormatterKind::Json, FormatterKind::Plain])
        .build();
    let layer = ErrorHandlerLayer::from_config(&config).unwrap();
    let service = tower::service_fn(|_request: Request<()>| async {
        Ok::<_, BoxError>(status_response(StatusCode::NOT_FOUND, ""))
    });

    let response = call(&layer, service, request(Some("text/html"))).await;

    assert_eq!(content_type(&response), "application/json");
}

#[tokio::test]
async fn config_from_toml_disables_catching() {
    let config = ErrorHandlerConfig::from_toml("catch_errors = false").unwrap();
    let layer = ErrorHandlerLayer::from_config(&config).unwrap();
    let service = tower::service_fn(|_request: Request<()>| async {
        Err::<TestResponse, BoxError>("not caught".into())
    });

    let result = layer.layer(service).oneshot(request(None)).await;

    assert_eq!(result.unwrap_err().to_string(), "not caught");
}

#[test]
fn empty_registry_is_rejected() {
    let result = ErrorHandlerLayer::builder().formatters(Vec::new()).build();

    assert!(result.is_err());
}

#[test]
fn non_ascii_content_type_is_rejected_at_build_time() {
    let result = ErrorHandlerLayer::builder()
        .formatter(Named {
            name: "accented",
            content_types: &["text/plaïn"],
        })
        .build();

    assert!(matches!(
        result,
        Err(faultline::ConfigError::InvalidContentType { content_type }) if content_type == "text/plaïn"
    ));
}
