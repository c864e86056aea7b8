//! Web Unblocker는 경로 접두사 안에 실제 대상 URL을 담아 임의의 사이트를
//! 하나의 오리진으로 중계하는 리버스 프록시입니다.
//!
//! # 주요 기능
//!
//! - `/proxy/http://example.com/` 형식의 경로 디코딩과 정규화 리다이렉트
//! - Referer 기반 대상 URL 복구
//! - WebSocket 업그레이드 중계
//! - 순서가 보장되는 요청/응답 미들웨어 파이프라인
//!
//! # 예제
//!
//! ```
//! use web_unblocker::config::UnblockerConfig;
//! use web_unblocker::middleware::MiddlewareRegistry;
//!
//! let config = UnblockerConfig::new()
//!     .with_prefix("browse")
//!     .expand(&MiddlewareRegistry::standard())
//!     .unwrap();
//!
//! // 접두사는 항상 `/`로 시작하고 `/` 하나로 끝납니다.
//! assert_eq!(config.prefix(), "/browse/");
//!
//! // content-length 재계산은 항상 마지막 응답 단계입니다.
//! assert_eq!(config.response_pipeline().names().last(), Some(&"content-length"));
//! ```
//!
//! # 호스트 애플리케이션 연결
//!
//! ```no_run
//! use std::sync::Arc;
//! use web_unblocker::config::UnblockerConfig;
//! use web_unblocker::middleware::MiddlewareRegistry;
//! use web_unblocker::router::Unblocker;
//! use web_unblocker::server::{LandingPage, ServerListener};
//! use web_unblocker::settings::ServerSettings;
//!
//! # async fn run() -> web_unblocker::server::Result<()> {
//! let config = UnblockerConfig::new().expand(&MiddlewareRegistry::standard())?;
//! let landing = Arc::new(LandingPage::new(config.prefix()));
//! let unblocker = Arc::new(Unblocker::with_default_transport(config));
//!
//! let listener = ServerListener::bind(&ServerSettings::default()).await?;
//! listener.run(unblocker, landing).await
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod context;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod recovery;
pub mod router;
pub mod server;
pub mod settings;
pub mod site;
pub mod websocket;

pub use config::{ExpandedConfig, UnblockerConfig};
pub use context::RequestContext;
pub use router::Unblocker;
