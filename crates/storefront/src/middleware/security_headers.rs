//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! The storefront only serves JSON, so the policy denies everything a
//! document could load.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `X-Content-Type-Options: nosniff` - Prevent MIME sniffing
/// - `Referrer-Policy: no-referrer` - Zero referrer leakage
/// - `Content-Security-Policy: default-src 'none'; frame-ancestors 'none'`
/// - `Cache-Control: no-store, max-age=0` unless the handler set its own
/// - `Cross-Origin-Resource-Policy: same-site`
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    // Catalog handlers mark themselves cacheable; everything else is private
    let cache_control = HeaderName::from_static("cache-control");
    if !headers.contains_key(&cache_control) {
        headers.insert(cache_control, HeaderValue::from_static("no-store, max-age=0"));
    }

    // The web front-end lives on a sibling subdomain
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-site"),
    );

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http, middleware, routing::get};
    use tower::ServiceExt;

    async fn headers_for(router: Router) -> http::HeaderMap {
        let response = router
            .layer(middleware::from_fn(security_headers_middleware))
            .oneshot(http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.headers().clone()
    }

    #[tokio::test]
    async fn test_headers_applied() {
        let headers = headers_for(Router::new().route("/", get(|| async { "ok" }))).await;
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(headers.get("cache-control").unwrap(), "no-store, max-age=0");
    }

    #[tokio::test]
    async fn test_handler_cache_control_kept() {
        let router = Router::new().route(
            "/",
            get(|| async { ([(http::header::CACHE_CONTROL, "public, max-age=60")], "ok") }),
        );
        let headers = headers_for(router).await;
        assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=60");
    }
}
