//! 내장 미들웨어 단계
//!
//! 헤더 수준의 단계만 실제로 동작합니다. 본문을 바꾸는 단계(charsets,
//! url-prefixer, client-scripts, cookies, 응답 decompress)는 자리만 차지하는
//! [`Passthrough`]이며 [`MiddlewareRegistry`](super::MiddlewareRegistry)로 교체할 수 있습니다.

mod content_length;
mod encoding;
mod host;
mod passthrough;
mod redirects;
mod referer;
mod robots;
mod security;

use std::sync::Arc;

pub use content_length::ContentLength;
pub use encoding::IdentityEncoding;
pub use host::HostRewrite;
pub use passthrough::Passthrough;
pub use redirects::RedirectRewrite;
pub use referer::RefererRewrite;
pub use robots::MetaRobots;
pub use security::HeaderStrip;

use super::registry::StageOptions;
use super::{Middleware, Stage};
use crate::codec::UrlCodec;

pub fn create(stage: Stage, options: &StageOptions) -> Arc<dyn Middleware> {
    match stage {
        Stage::Host => Arc::new(HostRewrite),
        Stage::Referer => Arc::new(RefererRewrite::new(UrlCodec::new(options.prefix.clone()))),
        Stage::DecompressRequest => Arc::new(IdentityEncoding),
        Stage::Hsts => Arc::new(HeaderStrip::hsts()),
        Stage::Hpkp => Arc::new(HeaderStrip::hpkp()),
        Stage::Csp => Arc::new(HeaderStrip::csp()),
        Stage::Redirects => Arc::new(RedirectRewrite::new(UrlCodec::new(options.prefix.clone()))),
        Stage::MetaRobots => Arc::new(MetaRobots::new(options.clone())),
        Stage::ContentLength => Arc::new(ContentLength),
        Stage::CookiesRequest
        | Stage::CookiesResponse
        | Stage::DecompressResponse
        | Stage::Charsets
        | Stage::UrlPrefixer
        | Stage::ClientScripts => Arc::new(Passthrough::new(stage)),
    }
}
