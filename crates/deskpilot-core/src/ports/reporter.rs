//! 실행 리포트 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::run::{RunSummary, TurnReport};

/// 실행 리포터 — 턴 완료 / 실행 종료 통지
///
/// 구현체: `TracingReporter`, `CompositeReporter`, `RunReportWriter`
///
/// 리포터 에러는 실행 결과에 영향을 주지 않는다 (호출자가 경고 로그만 남김).
#[async_trait]
pub trait RunReporter: Send + Sync {
    /// 턴 1개 완료
    async fn turn_completed(&self, report: &TurnReport) -> Result<(), CoreError>;

    /// 실행 종료
    async fn run_finished(&self, summary: &RunSummary) -> Result<(), CoreError>;
}
