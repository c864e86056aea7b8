//! 이 서버 자신의 오리진 계산과 리다이렉트 응답
//!
//! 스킴 결정 우선순위:
//! 1. 설정된 `scheme` (지정되면 감지를 하지 않음)
//! 2. 절대 형식 요청 URI의 스킴
//! 3. `X-Forwarded-Proto`, `X-Forwarded-Protocol` 헤더
//! 4. 연결의 TLS 여부 (`ConnectionInfo`)
//! 5. `http`

use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::request::Parts;
use http::{Response, StatusCode};
use http_body_util::Full;
use tracing::{debug, error};
use url::Url;

use crate::config::ExpandedConfig;

const FORWARDED_PROTO_HEADERS: [&str; 2] = ["x-forwarded-proto", "x-forwarded-protocol"];

/// 리스너가 요청 확장(extension)으로 붙이는 연결 정보
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub remote_addr: Option<SocketAddr>,
    pub encrypted: bool,
}

/// 요청마다 계산되는 (scheme, host, prefix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    pub scheme: String,
    pub host: String,
    pub prefix: String,
}

impl SiteIdentity {
    pub fn resolve(parts: &Parts, config: &ExpandedConfig) -> Self {
        Self {
            scheme: resolve_scheme(parts, config.scheme()),
            host: resolve_host(parts, config.host()),
            prefix: config.prefix().to_string(),
        }
    }

    /// `scheme://host/prefix/`
    pub fn origin(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.prefix)
    }

    /// `url`이 이 서버를 가리키는지 확인합니다.
    ///
    /// 호스트는 대소문자를 무시하고, 포트가 생략되면 `url` 스킴의 기본 포트로 봅니다.
    pub fn is_own_url(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let Ok(own) = Url::parse(&format!("{}://{}/", url.scheme(), self.host)) else {
            return false;
        };
        own.host_str()
            .map_or(false, |own_host| own_host.eq_ignore_ascii_case(host))
            && own.port_or_known_default() == url.port_or_known_default()
    }
}

fn resolve_host(parts: &Parts, configured: Option<&str>) -> String {
    if let Some(host) = configured {
        return host.to_string();
    }
    parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
        .unwrap_or_default()
        .to_string()
}

fn resolve_scheme(parts: &Parts, configured: Option<&str>) -> String {
    if let Some(scheme) = configured {
        return scheme.to_string();
    }
    if let Some(scheme) = parts.uri.scheme_str() {
        return scheme.to_ascii_lowercase();
    }
    if let Some(scheme) = forwarded_scheme(&parts.headers) {
        return scheme;
    }
    let encrypted = parts
        .extensions
        .get::<ConnectionInfo>()
        .map_or(false, |info| info.encrypted);
    if encrypted {
        "https".to_string()
    } else {
        "http".to_string()
    }
}

fn forwarded_scheme(headers: &HeaderMap) -> Option<String> {
    FORWARDED_PROTO_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        let first = value.split(',').next()?.trim().to_ascii_lowercase();
        matches!(first.as_str(), "http" | "https").then_some(first)
    })
}

/// 사이트 오리진 기준으로 307 리다이렉트를 만듭니다.
///
/// 대상 앞의 `/` 하나와 접두사 하나를 제거하므로 `/proxy/http://x.com`과
/// `http://x.com`은 같은 Location이 됩니다. 응답을 만들 수 없으면 로그만 남기고
/// 연결을 닫는 빈 응답을 돌려줍니다.
pub fn redirect_to(
    site: &SiteIdentity,
    target: &str,
    headers: Option<HeaderMap>,
) -> Response<Full<Bytes>> {
    let location = format!("{}{}", site.origin(), strip_target(target, &site.prefix));
    debug!(location = %location, "리다이렉트");

    match build_redirect(&location, headers) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, location = %location, "리다이렉트 응답 전송 실패");
            closed_response()
        }
    }
}

fn strip_target<'a>(target: &'a str, prefix: &str) -> &'a str {
    let target = target.strip_prefix('/').unwrap_or(target);
    let bare_prefix = prefix.trim_start_matches('/');
    target.strip_prefix(bare_prefix).unwrap_or(target)
}

fn build_redirect(
    location: &str,
    headers: Option<HeaderMap>,
) -> Result<Response<Full<Bytes>>, http::Error> {
    let mut headers = headers.unwrap_or_default();
    headers.insert(header::LOCATION, HeaderValue::from_str(location)?);

    let mut response = Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .body(Full::new(Bytes::new()))?;
    *response.headers_mut() = headers;
    Ok(response)
}

fn closed_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
