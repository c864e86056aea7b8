mod common;

use common::{get, harness, harness_with, location, RecordingProxy, SITE_HOST};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use web_unblocker::config::UnblockerConfig;
use web_unblocker::context::empty_body;
use web_unblocker::site::ConnectionInfo;

#[tokio::test]
async fn test_canonical_path_is_proxied_without_redirect() {
    let h = harness(UnblockerConfig::new());

    let response = h.handle(get("/proxy/http://example.com/foo?q=1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "http://example.com/foo?q=1");
    assert_eq!(h.proxy.targets(), vec!["http://example.com/foo?q=1"]);
    assert_eq!(h.fallthrough.count(), 0);
}

#[tokio::test]
async fn test_collapsed_slashes_are_proxied_without_redirect() {
    let h = harness(UnblockerConfig::new());

    let response = h.handle(get("/proxy/http:/example.com/foo")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.proxy.targets(), vec!["http://example.com/foo"]);
}

#[tokio::test]
async fn test_non_canonical_target_redirects() {
    let h = harness(UnblockerConfig::new());

    let response = h.handle(get("/proxy/http://example.com")).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        format!("http://{}/proxy/http://example.com/", SITE_HOST)
    );
    assert!(h.proxy.targets().is_empty());
}

#[tokio::test]
async fn test_missing_scheme_is_recovered() {
    let h = harness(UnblockerConfig::new());

    let response = h.handle(get("/proxy/example.com")).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:8080/proxy/http://example.com/");

    // http로 시작하는 호스트 이름
    let response = h.handle(get("/proxy/httpbin.org/get")).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:8080/proxy/http://httpbin.org/get");

    assert!(h.proxy.targets().is_empty());
    assert_eq!(h.fallthrough.count(), 0);
}

#[tokio::test]
async fn test_prefix_root_calls_fallthrough_once() {
    for uri in ["/proxy/", "/proxy"] {
        let h = harness(UnblockerConfig::new());
        let response = h.handle(get(uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "경로: {}", uri);
        assert_eq!(h.fallthrough.count(), 1, "경로: {}", uri);
        assert!(h.proxy.targets().is_empty());
    }
}

#[tokio::test]
async fn test_relative_resource_recovered_from_referer() {
    let h = harness(UnblockerConfig::new());
    let request = Request::get("/favicon.ico")
        .header("host", SITE_HOST)
        .header("referer", "http://localhost:8080/proxy/http://example.com/page")
        .body(empty_body())
        .unwrap();

    let response = h.handle(request).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "http://localhost:8080/proxy/http://example.com/favicon.ico"
    );
}

#[tokio::test]
async fn test_referer_recovery_with_explicit_default_port() {
    let h = harness(UnblockerConfig::new());
    let request = Request::get("/favicon.ico")
        .header("host", "proxy.test:80")
        .header("referer", "http://proxy.test:80/proxy/http://example.com/page")
        .body(empty_body())
        .unwrap();

    let response = h.handle(request).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "http://proxy.test:80/proxy/http://example.com/favicon.ico"
    );
    assert_eq!(h.fallthrough.count(), 0);
}

#[tokio::test]
async fn test_unrelated_path_falls_through() {
    let h = harness(UnblockerConfig::new());
    let request = Request::get("/about")
        .header("host", SITE_HOST)
        .header("referer", "http://elsewhere.test/proxy/http://example.com/")
        .body(empty_body())
        .unwrap();

    let response = h.handle(request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.fallthrough.count(), 1);
}

#[tokio::test]
async fn test_declined_request_reaches_fallthrough() {
    let h = harness_with(UnblockerConfig::new(), RecordingProxy::declining());

    let response = h.handle(get("/proxy/http://example.com/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.proxy.targets(), vec!["http://example.com/"]);
    assert_eq!(h.fallthrough.count(), 1);
}

#[tokio::test]
async fn test_default_fallthrough_redirects_to_root() {
    let h = harness(UnblockerConfig::new());

    let response = h.unblocker.handle(get("/about"), None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:8080/proxy/");
}

#[tokio::test]
async fn test_custom_prefix() {
    let h = harness(UnblockerConfig::new().with_prefix("browse"));

    let response = h.handle(get("/browse/example.com/")).await;
    assert_eq!(location(&response), "http://localhost:8080/browse/http://example.com/");

    h.handle(get("/browse/https://example.com/")).await;
    assert_eq!(h.proxy.targets(), vec!["https://example.com/"]);
}

#[tokio::test]
async fn test_scheme_precedence() {
    // X-Forwarded-Proto
    let h = harness(UnblockerConfig::new());
    let request = Request::get("/proxy/example.com/")
        .header("host", SITE_HOST)
        .header("x-forwarded-proto", "https")
        .body(empty_body())
        .unwrap();
    let response = h.handle(request).await;
    assert_eq!(location(&response), "https://localhost:8080/proxy/http://example.com/");

    // 설정된 scheme이 감지보다 우선
    let h = harness(UnblockerConfig::new().with_scheme("http"));
    let request = Request::get("/proxy/example.com/")
        .header("host", SITE_HOST)
        .header("x-forwarded-proto", "https")
        .body(empty_body())
        .unwrap();
    let response = h.handle(request).await;
    assert_eq!(location(&response), "http://localhost:8080/proxy/http://example.com/");

    // 연결의 TLS 여부
    let h = harness(UnblockerConfig::new());
    let mut request = get("/proxy/example.com/");
    request.extensions_mut().insert(ConnectionInfo {
        remote_addr: None,
        encrypted: true,
    });
    let response = h.handle(request).await;
    assert_eq!(location(&response), "https://localhost:8080/proxy/http://example.com/");
}

#[tokio::test]
async fn test_configured_host_overrides_header() {
    let h = harness(UnblockerConfig::new().with_host("proxy.example.org"));

    let response = h.handle(get("/proxy/example.com/")).await;
    assert_eq!(location(&response), "http://proxy.example.org/proxy/http://example.com/");
}
