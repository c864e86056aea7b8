use async_trait::async_trait;
use http::header::{self, HeaderValue};
use tracing::debug;

use crate::codec::UrlCodec;
use crate::context::RequestContext;
use crate::middleware::{Flow, Middleware, MiddlewareError, Phase};

/// 3xx 응답의 `Location`을 대상 URL 기준으로 해석한 뒤 접두사 경로로 바꿉니다.
#[derive(Debug, Clone)]
pub struct RedirectRewrite {
    codec: UrlCodec,
}

impl RedirectRewrite {
    pub fn new(codec: UrlCodec) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl Middleware for RedirectRewrite {
    fn name(&self) -> &str {
        "redirects"
    }

    fn phase(&self) -> Phase {
        Phase::Response
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        let Some(remote) = ctx.remote_response.as_mut() else {
            return Ok(Flow::Continue);
        };
        if !remote.status.is_redirection() {
            return Ok(Flow::Continue);
        }

        let resolved = remote
            .headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| ctx.url.join(location).ok());

        if let Some(target) = resolved {
            if matches!(target.scheme(), "http" | "https") {
                let location = self.codec.encode(&target);
                debug!(from = %target, to = %location, "업스트림 리다이렉트 재작성");
                remote
                    .headers
                    .insert(header::LOCATION, HeaderValue::from_str(&location)?);
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::builtin::test_support::{context, with_response};
    use http::StatusCode;

    fn middleware() -> RedirectRewrite {
        RedirectRewrite::new(UrlCodec::new("/proxy/"))
    }

    async fn location_after(status: StatusCode, location: &'static str) -> String {
        let mut ctx = with_response(
            context("http://example.com/dir/page"),
            status,
            &[("location", location)],
            "",
        );
        middleware().handle(&mut ctx).await.unwrap();
        ctx.remote_response.unwrap().headers[header::LOCATION]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_relative_location() {
        assert_eq!(
            location_after(StatusCode::FOUND, "other?a=1").await,
            "/proxy/http://example.com/dir/other?a=1"
        );
        assert_eq!(
            location_after(StatusCode::MOVED_PERMANENTLY, "/login").await,
            "/proxy/http://example.com/login"
        );
    }

    #[tokio::test]
    async fn test_absolute_location() {
        assert_eq!(
            location_after(StatusCode::SEE_OTHER, "https://other.test/x").await,
            "/proxy/https://other.test/x"
        );
    }

    #[tokio::test]
    async fn test_non_redirect_untouched() {
        assert_eq!(location_after(StatusCode::CREATED, "/item/1").await, "/item/1");
    }
}
