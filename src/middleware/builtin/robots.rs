use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};

use crate::config::HTML_CONTENT_TYPES;
use crate::context::RequestContext;
use crate::middleware::registry::StageOptions;
use crate::middleware::{Flow, Middleware, MiddlewareError, Phase};

const X_ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");

/// 검색 엔진이 프록시된 HTML 페이지를 색인하지 않도록 합니다.
#[derive(Debug, Clone)]
pub struct MetaRobots {
    options: StageOptions,
}

impl MetaRobots {
    pub fn new(options: StageOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Middleware for MetaRobots {
    fn name(&self) -> &str {
        "meta-robots"
    }

    fn phase(&self) -> Phase {
        Phase::Response
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        let Some(remote) = ctx.remote_response.as_mut() else {
            return Ok(Flow::Continue);
        };

        let is_html = remote.content_type().map_or(false, |mime| {
            HTML_CONTENT_TYPES.contains(&mime.as_str()) && self.options.is_processable(&mime)
        });
        if is_html {
            remote
                .headers
                .insert(X_ROBOTS_TAG, HeaderValue::from_static("noindex, nofollow"));
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::builtin::test_support::{context, with_response};
    use http::StatusCode;

    fn middleware(types: &[&str]) -> MetaRobots {
        MetaRobots::new(StageOptions {
            prefix: "/proxy/".to_string(),
            process_content_types: types.iter().map(|t| t.to_string()).collect(),
        })
    }

    async fn robots_tag(middleware: &MetaRobots, content_type: &'static str) -> Option<String> {
        let mut ctx = with_response(
            context("http://example.com/"),
            StatusCode::OK,
            &[("content-type", content_type)],
            "<html></html>",
        );
        middleware.handle(&mut ctx).await.unwrap();
        ctx.remote_response
            .unwrap()
            .headers
            .get("x-robots-tag")
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_html_gets_robots_tag() {
        let middleware = middleware(&["text/html", "text/css"]);
        assert_eq!(
            robots_tag(&middleware, "text/html; charset=utf-8").await.as_deref(),
            Some("noindex, nofollow")
        );
        assert_eq!(robots_tag(&middleware, "text/css").await, None);
        assert_eq!(robots_tag(&middleware, "image/png").await, None);
    }

    #[tokio::test]
    async fn test_unprocessable_html_untouched() {
        let middleware = middleware(&["text/css"]);
        assert_eq!(robots_tag(&middleware, "text/html").await, None);
    }
}
