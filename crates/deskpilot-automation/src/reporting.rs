//! 실행 리포터 구현.
//!
//! `TracingReporter`는 턴/요약을 구조화 로그로 남기고,
//! `CompositeReporter`는 여러 리포터에 같은 이벤트를 전달한다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use deskpilot_core::error::CoreError;
use deskpilot_core::models::run::{RunSummary, TurnReport};
use deskpilot_core::ports::reporter::RunReporter;

/// tracing 이벤트 리포터
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

#[async_trait]
impl RunReporter for TracingReporter {
    async fn turn_completed(&self, report: &TurnReport) -> Result<(), CoreError> {
        let failed = report
            .records
            .iter()
            .filter(|r| !r.outcome.is_success())
            .count();
        info!(
            turn = report.turn,
            screenshot_id = %report.screenshot_id,
            native = %format!("{}x{}", report.native.width, report.native.height),
            viewport = %format!("{}x{}", report.viewport.width, report.viewport.height),
            factor = report.factor,
            proposed = report.proposed.len(),
            executed = report.records.len(),
            failed,
            consent = ?report.consent,
            done = report.done,
            "턴 완료"
        );
        Ok(())
    }

    async fn run_finished(&self, summary: &RunSummary) -> Result<(), CoreError> {
        if summary.status.is_done() {
            info!(
                status = %summary.status,
                turns = summary.turns_used,
                actions = summary.actions_executed,
                failed = summary.actions_failed,
                elapsed_ms = summary.elapsed_ms(),
                "실행 종료"
            );
        } else {
            warn!(
                status = %summary.status,
                turns = summary.turns_used,
                actions = summary.actions_executed,
                failed = summary.actions_failed,
                elapsed_ms = summary.elapsed_ms(),
                "실행 중단"
            );
        }
        Ok(())
    }
}

/// 여러 리포터로 팬아웃
///
/// 하나가 실패해도 나머지는 계속 호출하고, 첫 에러를 반환한다.
#[derive(Default)]
pub struct CompositeReporter {
    reporters: Vec<Arc<dyn RunReporter>>,
}

impl CompositeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 리포터 추가
    pub fn with(mut self, reporter: Arc<dyn RunReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

#[async_trait]
impl RunReporter for CompositeReporter {
    async fn turn_completed(&self, report: &TurnReport) -> Result<(), CoreError> {
        let mut first_error = None;
        for reporter in &self.reporters {
            if let Err(e) = reporter.turn_completed(report).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn run_finished(&self, summary: &RunSummary) -> Result<(), CoreError> {
        let mut first_error = None;
        for reporter in &self.reporters {
            if let Err(e) = reporter.run_finished(summary).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deskpilot_core::models::run::{AbortReason, RunStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReporter {
        finished: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RunReporter for CountingReporter {
        async fn turn_completed(&self, _report: &TurnReport) -> Result<(), CoreError> {
            Ok(())
        }

        async fn run_finished(&self, _summary: &RunSummary) -> Result<(), CoreError> {
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoreError::Internal("디스크 가득 참".into()));
            }
            Ok(())
        }
    }

    fn summary() -> RunSummary {
        let now = Utc::now();
        RunSummary {
            task: "task".into(),
            status: RunStatus::Aborted(AbortReason::UserAbort),
            turns_used: 1,
            actions_executed: 0,
            actions_failed: 0,
            final_message: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[tokio::test]
    async fn composite_calls_every_reporter_even_after_failure() {
        let failing = Arc::new(CountingReporter {
            finished: AtomicUsize::new(0),
            fail: true,
        });
        let ok = Arc::new(CountingReporter {
            finished: AtomicUsize::new(0),
            fail: false,
        });
        let composite = CompositeReporter::new()
            .with(failing.clone())
            .with(Arc::new(TracingReporter))
            .with(ok.clone());
        assert_eq!(composite.len(), 3);

        let result = composite.run_finished(&summary()).await;
        assert!(matches!(result, Err(CoreError::Internal(_))));
        assert_eq!(failing.finished.load(Ordering::SeqCst), 1);
        assert_eq!(ok.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_composite_is_ok() {
        let composite = CompositeReporter::new();
        assert!(composite.is_empty());
        assert!(composite.run_finished(&summary()).await.is_ok());
    }
}
