use async_trait::async_trait;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Request, Response, StatusCode};
use http_body_util::Full;

use crate::codec::UrlCodec;
use crate::context::ProxyBody;
use crate::router::Fallthrough;
use crate::site::{redirect_to, SiteIdentity};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Web Unblocker</title></head>
<body>
<form method="get" action="{action}">
<input type="text" name="url" placeholder="http://example.com/" autofocus>
<button type="submit">Go</button>
</form>
</body>
</html>
"#;

/// 실행 파일의 폴스루. `/`와 접두사 루트에서 주소 입력 폼을 보여 줍니다.
///
/// `?url=`이 있으면 해당 주소의 프록시 경로로 리다이렉트합니다.
pub struct LandingPage {
    codec: UrlCodec,
}

impl LandingPage {
    pub fn new(prefix: &str) -> Self {
        Self {
            codec: UrlCodec::new(prefix),
        }
    }

    fn is_root(&self, path: &str) -> bool {
        let prefix = self.codec.prefix();
        path == "/" || path == prefix || path == prefix.trim_end_matches('/')
    }

    fn requested_target(&self, query: Option<&str>) -> Option<String> {
        let query = query?;
        let (_, value) = url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, value)| name == "url" && !value.trim().is_empty())?;
        let value = value.trim();
        if value.contains("://") {
            Some(value.to_string())
        } else {
            Some(format!("http://{}", value))
        }
    }
}

fn html(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

#[async_trait]
impl Fallthrough for LandingPage {
    async fn call(&self, request: Request<ProxyBody>, site: &SiteIdentity) -> Response<Full<Bytes>> {
        if !self.is_root(request.uri().path()) {
            return html(StatusCode::NOT_FOUND, "<h1>404 Not Found</h1>\n".to_string());
        }

        match self.requested_target(request.uri().query()) {
            Some(target) => match self.codec.canonicalize(&target) {
                Some(url) => redirect_to(site, &self.codec.encode(&url), None),
                None => html(
                    StatusCode::BAD_REQUEST,
                    "<h1>400 Bad Request</h1>\n<p>잘못된 주소입니다.</p>\n".to_string(),
                ),
            },
            None => html(StatusCode::OK, PAGE.replace("{action}", self.codec.prefix())),
        }
    }
}
