use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tracing::{Span, debug, info_span};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// How many reverse proxies sit in front of the app for each forwarded header.
/// Zero disables trust for that header.
#[derive(Debug, Clone, Copy)]
pub struct ProxyTrust {
    pub x_proto: usize,
    pub x_host: usize,
}

impl Default for ProxyTrust {
    fn default() -> Self {
        Self {
            x_proto: 1,
            x_host: 1,
        }
    }
}

/// Scheme and host the client actually used, after trusted proxy rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: Option<String>,
}

impl RequestOrigin {
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }
}

/// The origin as seen on the socket, before any rewriting.
#[derive(Debug, Clone)]
pub struct OriginalOrigin(pub RequestOrigin);

pub async fn trust_forwarded_headers(
    State(trust): State<ProxyTrust>,
    mut request: Request,
    next: Next,
) -> Response {
    let original = RequestOrigin {
        scheme: request.uri().scheme_str().unwrap_or("http").to_string(),
        host: request
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };
    let mut resolved = original.clone();

    if let Some(proto) = trusted_value(request.headers(), X_FORWARDED_PROTO, trust.x_proto) {
        resolved.scheme = proto.to_ascii_lowercase();
    }

    if let Some(host) = trusted_value(request.headers(), X_FORWARDED_HOST, trust.x_host) {
        match HeaderValue::from_str(&host) {
            Ok(value) => {
                request.headers_mut().insert(header::HOST, value);
                resolved.host = Some(host);
            }
            Err(_) => debug!(%host, "ignoring unusable forwarded host"),
        }
    }

    request.extensions_mut().insert(OriginalOrigin(original));
    request.extensions_mut().insert(resolved);
    next.run(request).await
}

/// `TraceLayer` span for a request that already passed through [`trust_forwarded_headers`].
pub fn request_span(request: &Request) -> Span {
    let origin = request.extensions().get::<RequestOrigin>();
    let socket = request
        .extensions()
        .get::<OriginalOrigin>()
        .map(|OriginalOrigin(original)| original);

    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        scheme = origin.map_or("-", |origin| origin.scheme.as_str()),
        host = origin.and_then(|origin| origin.host.as_deref()).unwrap_or("-"),
        socket_scheme = socket.map_or("-", |socket| socket.scheme.as_str()),
        socket_host = socket.and_then(|socket| socket.host.as_deref()).unwrap_or("-"),
    )
}

/// Pick the entry `hops` from the right of a comma-separated forwarded header.
/// Entries further left were supplied by untrusted parties.
fn trusted_value(headers: &HeaderMap, name: &str, hops: usize) -> Option<String> {
    if hops == 0 {
        return None;
    }

    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .collect();

    if values.len() < hops {
        return None;
    }

    let value = values[values.len() - hops];
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension, Router,
        body::{Body, to_bytes},
        http::Request as HttpRequest,
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    async fn describe(
        Extension(origin): Extension<RequestOrigin>,
        Extension(OriginalOrigin(original)): Extension<OriginalOrigin>,
        headers: HeaderMap,
    ) -> String {
        format!(
            "{} {} {} {}",
            origin.scheme,
            origin.host.unwrap_or_default(),
            headers[header::HOST].to_str().unwrap(),
            original.host.unwrap_or_default(),
        )
    }

    async fn call(request: HttpRequest<Body>) -> String {
        let app = Router::new()
            .route("/", get(describe))
            .layer(middleware::from_fn_with_state(
                ProxyTrust::default(),
                trust_forwarded_headers,
            ));
        let response = app.oneshot(request).await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn forwarded_headers_rewrite_scheme_and_host() {
        let request = HttpRequest::get("/")
            .header(header::HOST, "10.0.0.5:8080")
            .header(X_FORWARDED_PROTO, "https")
            .header(X_FORWARDED_HOST, "print.campus.edu")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            call(request).await,
            "https print.campus.edu print.campus.edu 10.0.0.5:8080"
        );
    }

    #[tokio::test]
    async fn only_the_last_hop_is_trusted() {
        let request = HttpRequest::get("/")
            .header(header::HOST, "internal")
            .header(X_FORWARDED_PROTO, "http, https")
            .header(X_FORWARDED_HOST, "evil.example, print.campus.edu")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            call(request).await,
            "https print.campus.edu print.campus.edu internal"
        );
    }

    #[tokio::test]
    async fn requests_without_forwarding_pass_through() {
        let request = HttpRequest::get("/")
            .header(header::HOST, "localhost:8080")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            call(request).await,
            "http localhost:8080 localhost:8080 localhost:8080"
        );
    }

    #[test]
    fn request_span_records_both_origins() {
        let mut request = HttpRequest::get("/api/me").body(Body::empty()).unwrap();
        request.extensions_mut().insert(RequestOrigin {
            scheme: "https".to_string(),
            host: Some("print.campus.edu".to_string()),
        });
        request.extensions_mut().insert(OriginalOrigin(RequestOrigin {
            scheme: "http".to_string(),
            host: Some("10.0.0.5:8080".to_string()),
        }));

        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = request_span(&request);
            let fields = span.metadata().unwrap().fields();
            for name in ["scheme", "host", "socket_scheme", "socket_host"] {
                assert!(fields.field(name).is_some(), "missing span field {name}");
            }
        });
    }

    #[test]
    fn more_hops_than_entries_ignores_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        assert_eq!(trusted_value(&headers, X_FORWARDED_PROTO, 2), None);
        assert_eq!(trusted_value(&headers, X_FORWARDED_PROTO, 0), None);
        assert_eq!(
            trusted_value(&headers, X_FORWARDED_PROTO, 1).as_deref(),
            Some("https")
        );
    }
}
