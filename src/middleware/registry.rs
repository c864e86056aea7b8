use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::builtin;
use super::{Middleware, Stage};

/// 내장 단계 생성에 필요한 값
#[derive(Debug, Clone)]
pub struct StageOptions {
    pub prefix: String,
    pub process_content_types: Vec<String>,
}

impl StageOptions {
    pub fn is_processable(&self, content_type: &str) -> bool {
        self.process_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

pub type StageFactory = Arc<dyn Fn(&StageOptions) -> Arc<dyn Middleware> + Send + Sync>;

/// 내장 미들웨어 팩토리 목록
///
/// 등록하지 않은 단계는 [`builtin::create`]의 기본 구현을 씁니다.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    overrides: HashMap<Stage, StageFactory>,
}

impl MiddlewareRegistry {
    pub fn standard() -> Self {
        Self::default()
    }

    /// 단계의 구현을 교체합니다.
    pub fn register<F>(mut self, stage: Stage, factory: F) -> Self
    where
        F: Fn(&StageOptions) -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.overrides.insert(stage, Arc::new(factory));
        self
    }

    pub fn create(&self, stage: Stage, options: &StageOptions) -> Arc<dyn Middleware> {
        match self.overrides.get(&stage) {
            Some(factory) => factory(options),
            None => builtin::create(stage, options),
        }
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let overridden: Vec<_> = self.overrides.keys().map(Stage::name).collect();
        f.debug_struct("MiddlewareRegistry")
            .field("overrides", &overridden)
            .finish()
    }
}
