use async_trait::async_trait;
use bytes::Bytes;
use http::Response;
use http_body_util::Full;

use super::MiddlewareError;
use crate::context::RequestContext;

/// 미들웨어가 실행되는 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// 업스트림 요청 전
    Request,
    /// 업스트림 응답 후, 클라이언트 전송 전
    Response,
}

/// 미들웨어 실행 결과
#[derive(Debug)]
pub enum Flow {
    /// 다음 단계로 진행
    Continue,
    /// 응답이 이미 결정됨. 남은 단계는 실행하지 않습니다.
    Handled(Response<Full<Bytes>>),
}

/// 미들웨어 트레이트
///
/// 요청 컨텍스트를 수정하거나, 직접 응답을 만들어 단계를 끝낼 수 있습니다.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// 미들웨어의 고유 이름을 반환합니다.
    fn name(&self) -> &str;

    fn phase(&self) -> Phase;

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError>;
}
