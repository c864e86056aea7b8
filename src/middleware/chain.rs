use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{Flow, Middleware, MiddlewareError, Phase};
use crate::context::RequestContext;

/// 한 단계의 미들웨어 목록. 조립 순서대로만 실행됩니다.
#[derive(Clone)]
pub struct Pipeline {
    phase: Phase,
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub(crate) fn new(phase: Phase, stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { phase, stages }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// 미들웨어를 순서대로 실행합니다. `Handled`를 돌려준 단계에서 멈춥니다.
    pub async fn run(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        for middleware in &self.stages {
            trace!(stage = middleware.name(), phase = ?self.phase, "미들웨어 실행");
            match middleware.handle(ctx).await? {
                Flow::Continue => continue,
                Flow::Handled(response) => {
                    debug!(
                        stage = middleware.name(),
                        phase = ?self.phase,
                        status = %response.status(),
                        "미들웨어가 응답을 처리함"
                    );
                    return Ok(Flow::Handled(response));
                }
            }
        }
        Ok(Flow::Continue)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("phase", &self.phase)
            .field("stages", &self.names())
            .finish()
    }
}
