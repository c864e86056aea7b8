//! 사용자 설정과 기본값을 병합하고 미들웨어 파이프라인을 조립합니다.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::middleware::pipeline::{PipelineBuilder, Stage};
use crate::middleware::registry::{MiddlewareRegistry, StageOptions};
use crate::middleware::{Middleware, Phase, Pipeline};

pub const DEFAULT_PREFIX: &str = "/proxy/";

pub const HTML_CONTENT_TYPES: [&str; 3] = [
    "text/html",
    "application/xml+xhtml",
    "application/xhtml+xml",
];

pub const CSS_CONTENT_TYPES: [&str; 1] = ["text/css"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("미들웨어 {name}은(는) {actual:?} 단계인데 {expected:?} 파이프라인에 추가됨")]
    PhaseMismatch {
        name: String,
        expected: Phase,
        actual: Phase,
    },

    #[error("삽입 기준 단계 '{0}'가 파이프라인에 없습니다")]
    MissingAnchor(&'static str),
}

pub fn default_content_types() -> Vec<String> {
    HTML_CONTENT_TYPES
        .iter()
        .chain(CSS_CONTENT_TYPES.iter())
        .map(|s| s.to_string())
        .collect()
}

/// 접두사를 `/`로 시작하고 `/` 하나로 끝나도록 맞춥니다. 빈 접두사는 `/`가 됩니다.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// 사용자가 지정한 부분 설정. 지정하지 않은 항목은 확장 시 기본값을 씁니다.
#[derive(Clone, Default)]
pub struct UnblockerConfig {
    pub prefix: Option<String>,
    /// 리다이렉트에 쓸 호스트를 강제합니다.
    pub host: Option<String>,
    /// 사이트 오리진 스킴을 강제합니다. 지정하면 스킴 감지를 하지 않습니다.
    pub scheme: Option<String>,
    pub request_middleware: Vec<Arc<dyn Middleware>>,
    pub response_middleware: Vec<Arc<dyn Middleware>>,
    pub standard_middleware: Option<bool>,
    /// `standard_middleware`가 꺼져 있으면 함께 꺼집니다.
    pub client_scripts: Option<bool>,
    pub process_content_types: Option<Vec<String>>,
}

impl UnblockerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_request_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.request_middleware.push(middleware);
        self
    }

    pub fn with_response_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.response_middleware.push(middleware);
        self
    }

    pub fn with_standard_middleware(mut self, enabled: bool) -> Self {
        self.standard_middleware = Some(enabled);
        self
    }

    pub fn with_client_scripts(mut self, enabled: bool) -> Self {
        self.client_scripts = Some(enabled);
        self
    }

    pub fn with_process_content_types(mut self, types: Vec<String>) -> Self {
        self.process_content_types = Some(types);
        self
    }

    /// 설정을 확장합니다. 설정을 소비하므로 같은 설정을 두 번 확장할 수 없습니다.
    ///
    /// 응답 단계 순서:
    /// `hsts, hpkp, csp, redirects, decompress, charsets, url-prefixer,
    /// [client-scripts], cookies, meta-robots, <사용자>, content-length`
    pub fn expand(self, registry: &MiddlewareRegistry) -> Result<ExpandedConfig, ConfigError> {
        let prefix = normalize_prefix(self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX));
        let standard_middleware = self.standard_middleware.unwrap_or(true);
        let client_scripts = standard_middleware && self.client_scripts.unwrap_or(true);
        let process_content_types = self
            .process_content_types
            .map(|types| types.into_iter().map(|t| t.trim().to_ascii_lowercase()).collect())
            .unwrap_or_else(default_content_types);

        let options = StageOptions {
            prefix: prefix.clone(),
            process_content_types: process_content_types.clone(),
        };

        let mut request = PipelineBuilder::new(Phase::Request);
        let mut response = PipelineBuilder::new(Phase::Response);

        if standard_middleware {
            for stage in Stage::STANDARD_REQUEST {
                request.push_stage(stage, registry.create(stage, &options))?;
            }
            for stage in Stage::STANDARD_RESPONSE {
                response.push_stage(stage, registry.create(stage, &options))?;
            }
            if client_scripts {
                response.insert_after(
                    Stage::UrlPrefixer,
                    Stage::ClientScripts,
                    registry.create(Stage::ClientScripts, &options),
                )?;
            }
        }

        for middleware in self.request_middleware {
            request.push_user(middleware)?;
        }
        for middleware in self.response_middleware {
            response.push_user(middleware)?;
        }
        response.finish_with(
            Stage::ContentLength,
            registry.create(Stage::ContentLength, &options),
        )?;

        let config = ExpandedConfig {
            prefix,
            host: self.host.filter(|h| !h.is_empty()),
            scheme: self.scheme.map(|s| s.to_ascii_lowercase()),
            standard_middleware,
            client_scripts,
            process_content_types,
            request_pipeline: request.build(),
            response_pipeline: response.build(),
        };

        debug!(
            prefix = %config.prefix,
            request = ?config.request_pipeline.names(),
            response = ?config.response_pipeline.names(),
            "설정 확장 완료"
        );
        Ok(config)
    }
}

impl fmt::Debug for UnblockerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |list: &[Arc<dyn Middleware>]| {
            list.iter().map(|m| m.name().to_string()).collect::<Vec<_>>()
        };
        f.debug_struct("UnblockerConfig")
            .field("prefix", &self.prefix)
            .field("host", &self.host)
            .field("scheme", &self.scheme)
            .field("request_middleware", &names(&self.request_middleware))
            .field("response_middleware", &names(&self.response_middleware))
            .field("standard_middleware", &self.standard_middleware)
            .field("client_scripts", &self.client_scripts)
            .field("process_content_types", &self.process_content_types)
            .finish()
    }
}

/// 확장이 끝난 설정. 시작 이후에는 읽기 전용으로 공유됩니다.
#[derive(Debug)]
pub struct ExpandedConfig {
    prefix: String,
    host: Option<String>,
    scheme: Option<String>,
    standard_middleware: bool,
    client_scripts: bool,
    process_content_types: Vec<String>,
    request_pipeline: Pipeline,
    response_pipeline: Pipeline,
}

impl ExpandedConfig {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn standard_middleware(&self) -> bool {
        self.standard_middleware
    }

    pub fn client_scripts(&self) -> bool {
        self.client_scripts
    }

    pub fn process_content_types(&self) -> &[String] {
        &self.process_content_types
    }

    pub fn is_processable(&self, content_type: &str) -> bool {
        self.process_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }

    pub fn request_pipeline(&self) -> &Pipeline {
        &self.request_pipeline
    }

    pub fn response_pipeline(&self) -> &Pipeline {
        &self.response_pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        let cases = vec![
            ("/proxy/", "/proxy/"),
            ("/proxy", "/proxy/"),
            ("proxy", "/proxy/"),
            ("/proxy//", "/proxy/"),
            ("/a/b", "/a/b/"),
            ("", "/"),
            ("///", "/"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_prefix(input), expected, "입력: '{}'", input);
        }
    }

    #[test]
    fn test_defaults() {
        let config = UnblockerConfig::new()
            .expand(&MiddlewareRegistry::standard())
            .unwrap();

        assert_eq!(config.prefix(), DEFAULT_PREFIX);
        assert_eq!(config.host(), None);
        assert!(config.standard_middleware());
        assert!(config.client_scripts());
        assert!(config.is_processable("text/html"));
        assert!(config.is_processable("text/css"));
        assert!(!config.is_processable("image/png"));
    }

    #[test]
    fn test_explicit_options_win() {
        let config = UnblockerConfig::new()
            .with_prefix("/browse")
            .with_host("proxy.example.org")
            .with_scheme("HTTPS")
            .with_client_scripts(false)
            .with_process_content_types(vec!["Text/Plain".to_string()])
            .expand(&MiddlewareRegistry::standard())
            .unwrap();

        assert_eq!(config.prefix(), "/browse/");
        assert_eq!(config.host(), Some("proxy.example.org"));
        assert_eq!(config.scheme(), Some("https"));
        assert!(!config.client_scripts());
        assert!(config.is_processable("text/plain"));
        assert!(!config.is_processable("text/html"));
    }

    #[test]
    fn test_disabling_standard_middleware_disables_client_scripts() {
        let config = UnblockerConfig::new()
            .with_standard_middleware(false)
            .with_client_scripts(true)
            .expand(&MiddlewareRegistry::standard())
            .unwrap();

        assert!(!config.client_scripts());
        assert!(config.request_pipeline().is_empty());
        assert_eq!(config.response_pipeline().names(), vec!["content-length"]);
    }
}
