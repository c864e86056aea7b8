use std::fmt;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName};
use http::request::Parts;
use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use tokio::io::{AsyncRead, AsyncWrite};
use url::Url;

use crate::site::SiteIdentity;

/// 클라이언트 요청 본문 타입
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// 업그레이드 요청의 원시 클라이언트 소켓
pub trait ClientSocket: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ClientSocket for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// 연결 단위 hop-by-hop 헤더. 업스트림과 클라이언트 사이에서 전달하지 않습니다.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

pub fn empty_body() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

pub fn full_body<T: Into<Bytes>>(chunk: T) -> ProxyBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

/// hop-by-hop 헤더와 `Upgrade`를 제거합니다.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(header::UPGRADE);
}

/// 요청 대상(경로 + 쿼리)을 반환합니다.
pub fn request_target(uri: &http::Uri) -> &str {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path())
}

/// 업스트림 응답. 본문은 응답 미들웨어가 다룰 수 있도록 버퍼링됩니다.
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RemoteResponse {
    /// 파라미터를 제외한 소문자 MIME 타입
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .filter(|mime| !mime.is_empty())
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut headers = self.headers;
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}

/// 요청 하나(또는 업그레이드 하나)의 수명 동안 미들웨어 체인을 따라 전달되는 상태
pub struct RequestContext {
    /// 디코딩된 절대 대상 URL
    pub url: Url,
    /// 클라이언트 요청 헤드
    pub client_request: Parts,
    /// 업스트림으로 보낼 헤더. 클라이언트 헤더와 독립된 사본입니다.
    pub headers: HeaderMap,
    /// 클라이언트 요청 본문
    pub body: Option<ProxyBody>,
    pub site: SiteIdentity,
    pub is_websocket: bool,
    /// 업그레이드 핸드셰이크 뒤에 이미 읽힌 바이트
    pub client_head: Bytes,
    pub client_socket: Option<Box<dyn ClientSocket>>,
    pub remote_response: Option<RemoteResponse>,
}

impl RequestContext {
    pub fn http(url: Url, client_request: Parts, body: ProxyBody, site: SiteIdentity) -> Self {
        let headers = client_request.headers.clone();
        Self {
            url,
            client_request,
            headers,
            body: Some(body),
            site,
            is_websocket: false,
            client_head: Bytes::new(),
            client_socket: None,
            remote_response: None,
        }
    }

    pub fn websocket(
        url: Url,
        client_request: Parts,
        socket: Box<dyn ClientSocket>,
        head: Bytes,
        site: SiteIdentity,
    ) -> Self {
        let headers = client_request.headers.clone();
        Self {
            url,
            client_request,
            headers,
            body: None,
            site,
            is_websocket: true,
            client_head: head,
            client_socket: Some(socket),
            remote_response: None,
        }
    }

    /// 폴스루로 넘기기 위해 원래 요청을 다시 조립합니다.
    pub fn into_request(self) -> Request<ProxyBody> {
        Request::from_parts(self.client_request, self.body.unwrap_or_else(empty_body))
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("url", &self.url.as_str())
            .field("method", &self.client_request.method)
            .field("uri", &self.client_request.uri)
            .field("site", &self.site)
            .field("is_websocket", &self.is_websocket)
            .field("client_head", &self.client_head.len())
            .field("remote_status", &self.remote_response.as_ref().map(|r| r.status))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_strips_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "Text/HTML; charset=utf-8".parse().unwrap(),
        );
        let remote = RemoteResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
        };
        assert_eq!(remote.content_type().as_deref(), Some("text/html"));
    }

    #[test]
    fn test_into_response_drops_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert("x-kept", "1".parse().unwrap());
        let remote = RemoteResponse {
            status: StatusCode::NOT_FOUND,
            headers,
            body: Bytes::from_static(b"missing"),
        };

        let response = remote.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        assert!(response.headers().get(header::CONNECTION).is_none());
        assert_eq!(response.headers()["x-kept"], "1");
    }

    #[test]
    fn test_request_target_keeps_query() {
        let uri: http::Uri = "/proxy/http://example.com/a?b=c".parse().unwrap();
        assert_eq!(request_target(&uri), "/proxy/http://example.com/a?b=c");
    }
}
