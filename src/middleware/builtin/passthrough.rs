use async_trait::async_trait;

use crate::context::RequestContext;
use crate::middleware::{Flow, Middleware, MiddlewareError, Phase, Stage};

/// 아무것도 하지 않는 단계. 파이프라인에서 이름과 위치만 차지합니다.
#[derive(Debug, Clone, Copy)]
pub struct Passthrough {
    stage: Stage,
}

impl Passthrough {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl Middleware for Passthrough {
    fn name(&self) -> &str {
        self.stage.name()
    }

    fn phase(&self) -> Phase {
        self.stage.phase()
    }

    async fn handle(&self, _ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        Ok(Flow::Continue)
    }
}
