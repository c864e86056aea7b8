use async_trait::async_trait;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};

use crate::context::RequestContext;
use crate::middleware::{Flow, Middleware, MiddlewareError, Phase};

/// 버퍼링된 본문 길이로 `content-length`를 다시 계산합니다.
///
/// 앞선 단계들이 본문 크기를 바꿀 수 있으므로 항상 응답 파이프라인의 마지막에 놓입니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentLength;

fn has_no_body(method: &Method, status: StatusCode) -> bool {
    method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

#[async_trait]
impl Middleware for ContentLength {
    fn name(&self) -> &str {
        "content-length"
    }

    fn phase(&self) -> Phase {
        Phase::Response
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        let Some(remote) = ctx.remote_response.as_mut() else {
            return Ok(Flow::Continue);
        };
        if has_no_body(&ctx.client_request.method, remote.status) {
            return Ok(Flow::Continue);
        }

        remote.headers.remove(header::TRANSFER_ENCODING);
        remote
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(remote.body.len()));
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::builtin::test_support::{context, with_response};

    #[tokio::test]
    async fn test_length_matches_body() {
        let mut ctx = with_response(
            context("http://example.com/"),
            StatusCode::OK,
            &[("content-length", "999"), ("transfer-encoding", "chunked")],
            "hello",
        );

        ContentLength.handle(&mut ctx).await.unwrap();
        let headers = ctx.remote_response.unwrap().headers;
        assert_eq!(headers[header::CONTENT_LENGTH], "5");
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
    }

    #[tokio::test]
    async fn test_bodiless_responses_untouched() {
        let mut ctx = with_response(
            context("http://example.com/"),
            StatusCode::NOT_MODIFIED,
            &[],
            "",
        );
        ContentLength.handle(&mut ctx).await.unwrap();
        assert!(ctx.remote_response.unwrap().headers.get(header::CONTENT_LENGTH).is_none());

        let mut ctx = with_response(
            context("http://example.com/"),
            StatusCode::OK,
            &[("content-length", "1234")],
            "",
        );
        ctx.client_request.method = Method::HEAD;
        ContentLength.handle(&mut ctx).await.unwrap();
        assert_eq!(ctx.remote_response.unwrap().headers[header::CONTENT_LENGTH], "1234");
    }
}
