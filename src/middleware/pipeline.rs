//! 이름 붙은 삽입 지점을 가진 파이프라인 빌더
//!
//! 내장 단계는 [`Stage`]로 식별됩니다. 다른 단계를 기준으로 삽입하거나
//! (`insert_after`), 항상 마지막에 실행될 단계를 고정(`finish_with`)할 수 있습니다.

use std::sync::Arc;

use super::{Middleware, Phase, Pipeline};
use crate::config::ConfigError;

/// 내장 미들웨어 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Host,
    Referer,
    DecompressRequest,
    CookiesRequest,
    Hsts,
    Hpkp,
    Csp,
    Redirects,
    DecompressResponse,
    Charsets,
    UrlPrefixer,
    ClientScripts,
    CookiesResponse,
    MetaRobots,
    ContentLength,
}

impl Stage {
    /// 사용자 요청 미들웨어보다 먼저 실행되는 내장 요청 단계
    pub const STANDARD_REQUEST: [Stage; 4] = [
        Stage::Host,
        Stage::Referer,
        Stage::DecompressRequest,
        Stage::CookiesRequest,
    ];

    /// 사용자 응답 미들웨어보다 먼저 실행되는 내장 응답 단계.
    /// 헤더 정리가 본문 재작성보다 앞서야 합니다.
    pub const STANDARD_RESPONSE: [Stage; 9] = [
        Stage::Hsts,
        Stage::Hpkp,
        Stage::Csp,
        Stage::Redirects,
        Stage::DecompressResponse,
        Stage::Charsets,
        Stage::UrlPrefixer,
        Stage::CookiesResponse,
        Stage::MetaRobots,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Host => "host",
            Stage::Referer => "referer",
            Stage::DecompressRequest | Stage::DecompressResponse => "decompress",
            Stage::CookiesRequest | Stage::CookiesResponse => "cookies",
            Stage::Hsts => "hsts",
            Stage::Hpkp => "hpkp",
            Stage::Csp => "csp",
            Stage::Redirects => "redirects",
            Stage::Charsets => "charsets",
            Stage::UrlPrefixer => "url-prefixer",
            Stage::ClientScripts => "client-scripts",
            Stage::MetaRobots => "meta-robots",
            Stage::ContentLength => "content-length",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Stage::Host | Stage::Referer | Stage::DecompressRequest | Stage::CookiesRequest => {
                Phase::Request
            }
            _ => Phase::Response,
        }
    }
}

enum Slot {
    Builtin(Stage, Arc<dyn Middleware>),
    User(Arc<dyn Middleware>),
}

impl Slot {
    fn middleware(self) -> Arc<dyn Middleware> {
        match self {
            Slot::Builtin(_, middleware) | Slot::User(middleware) => middleware,
        }
    }

    fn is(&self, stage: Stage) -> bool {
        matches!(self, Slot::Builtin(s, _) if *s == stage)
    }
}

pub struct PipelineBuilder {
    phase: Phase,
    slots: Vec<Slot>,
    last: Option<Slot>,
}

impl PipelineBuilder {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            slots: Vec::new(),
            last: None,
        }
    }

    pub fn push_stage(
        &mut self,
        stage: Stage,
        middleware: Arc<dyn Middleware>,
    ) -> Result<(), ConfigError> {
        self.check_phase(middleware.as_ref())?;
        self.slots.push(Slot::Builtin(stage, middleware));
        Ok(())
    }

    pub fn push_user(&mut self, middleware: Arc<dyn Middleware>) -> Result<(), ConfigError> {
        self.check_phase(middleware.as_ref())?;
        self.slots.push(Slot::User(middleware));
        Ok(())
    }

    /// `anchor` 단계 바로 뒤에 삽입합니다.
    pub fn insert_after(
        &mut self,
        anchor: Stage,
        stage: Stage,
        middleware: Arc<dyn Middleware>,
    ) -> Result<(), ConfigError> {
        self.check_phase(middleware.as_ref())?;
        let position = self
            .slots
            .iter()
            .position(|slot| slot.is(anchor))
            .ok_or(ConfigError::MissingAnchor(anchor.name()))?;
        self.slots
            .insert(position + 1, Slot::Builtin(stage, middleware));
        Ok(())
    }

    /// 이후에 무엇이 추가되든 마지막에 실행될 단계를 지정합니다.
    pub fn finish_with(
        &mut self,
        stage: Stage,
        middleware: Arc<dyn Middleware>,
    ) -> Result<(), ConfigError> {
        self.check_phase(middleware.as_ref())?;
        self.last = Some(Slot::Builtin(stage, middleware));
        Ok(())
    }

    pub fn build(self) -> Pipeline {
        let stages = self
            .slots
            .into_iter()
            .chain(self.last)
            .map(Slot::middleware)
            .collect();
        Pipeline::new(self.phase, stages)
    }

    fn check_phase(&self, middleware: &dyn Middleware) -> Result<(), ConfigError> {
        if middleware.phase() != self.phase {
            return Err(ConfigError::PhaseMismatch {
                name: middleware.name().to_string(),
                expected: self.phase,
                actual: middleware.phase(),
            });
        }
        Ok(())
    }
}
