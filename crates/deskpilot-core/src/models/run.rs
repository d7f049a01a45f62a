//! 실행 결과 모델 — 중단 사유, 최종 상태, 턴/실행 리포트.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::action::{ActionRecord, ProposedAction, ScreenBounds};

/// 초과된 예산 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    Turns,
    Actions,
}

/// 실행 중단 사유
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// 사용자가 동의하지 않음
    ConsentDenied,
    /// 디코딩 재시도 예산 소진
    DecodeRetryBudgetExceeded { attempts: u32 },
    /// 턴/액션 예산 초과
    BudgetExceeded { budget: BudgetKind, limit: u32 },
    /// 외부 중단 신호 (Ctrl+C 등)
    UserAbort,
    /// `stop_on_error` 정책에 의한 중단
    ExecutionFailed {
        turn: u32,
        action_index: usize,
        cause: String,
    },
    /// 화면 캡처 / 스케일 실패
    Resource { cause: String },
    /// 모델 전송 실패 (클라이언트 재시도 후)
    ModelUnavailable { cause: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::ConsentDenied => write!(f, "consent denied"),
            AbortReason::DecodeRetryBudgetExceeded { .. } => {
                write!(f, "decode retry budget exceeded")
            }
            AbortReason::BudgetExceeded { .. } => write!(f, "budget exceeded"),
            AbortReason::UserAbort => write!(f, "user abort"),
            AbortReason::ExecutionFailed { cause, .. } => write!(f, "execution failed: {cause}"),
            AbortReason::Resource { cause } => write!(f, "screen capture failed: {cause}"),
            AbortReason::ModelUnavailable { cause } => write!(f, "model unavailable: {cause}"),
        }
    }
}

/// 실행 최종 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "abort", rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Aborted(AbortReason),
}

impl RunStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, RunStatus::Done)
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            RunStatus::Done => None,
            RunStatus::Aborted(reason) => Some(reason),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Done => write!(f, "done"),
            RunStatus::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

/// 동의 게이트 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentDecision {
    /// 게이트 대상 아님
    #[default]
    NotRequired,
    /// autoplay로 자동 승인
    AutoApproved,
    /// 사용자 승인
    Approved,
    /// 사용자 거부 (또는 동의 포트 에러)
    Denied,
}

/// 턴 1개 리포트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    /// 턴 번호 (1부터)
    pub turn: u32,
    /// 스크린샷 ID
    pub screenshot_id: Uuid,
    /// 네이티브 화면 크기
    pub native: ScreenBounds,
    /// 모델이 본 뷰포트 크기
    pub viewport: ScreenBounds,
    /// 뷰포트 / 네이티브 배율
    pub factor: f64,
    /// 모델 메시지
    pub message: Option<String>,
    /// 제안된 액션
    pub proposed: Vec<ProposedAction>,
    /// 동의 게이트 결과
    pub consent: ConsentDecision,
    /// 실행 기록
    pub records: Vec<ActionRecord>,
    /// 모델 완료 신호
    pub done: bool,
}

/// 실행 1회 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// 작업 지시
    pub task: String,
    /// 최종 상태
    pub status: RunStatus,
    /// 사용한 턴 수
    pub turns_used: u32,
    /// 실행 시도한 액션 수
    pub actions_executed: u32,
    /// 실패한 액션 수
    pub actions_failed: u32,
    /// 마지막 모델 메시지
    pub final_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// 실행 시간 (밀리초)
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_reason_display() {
        assert_eq!(AbortReason::ConsentDenied.to_string(), "consent denied");
        assert_eq!(
            AbortReason::DecodeRetryBudgetExceeded { attempts: 3 }.to_string(),
            "decode retry budget exceeded"
        );
        assert_eq!(
            AbortReason::BudgetExceeded {
                budget: BudgetKind::Turns,
                limit: 2
            }
            .to_string(),
            "budget exceeded"
        );
        assert_eq!(AbortReason::UserAbort.to_string(), "user abort");
        assert_eq!(
            AbortReason::ExecutionFailed {
                turn: 1,
                action_index: 0,
                cause: "boom".into()
            }
            .to_string(),
            "execution failed: boom"
        );
        assert_eq!(
            AbortReason::Resource {
                cause: "no display".into()
            }
            .to_string(),
            "screen capture failed: no display"
        );
    }

    #[test]
    fn run_status_display() {
        assert_eq!(RunStatus::Done.to_string(), "done");
        assert_eq!(
            RunStatus::Aborted(AbortReason::ConsentDenied).to_string(),
            "aborted: consent denied"
        );
        assert!(RunStatus::Done.is_done());
        assert_eq!(
            RunStatus::Aborted(AbortReason::UserAbort).abort_reason(),
            Some(&AbortReason::UserAbort)
        );
    }

    #[test]
    fn run_status_serializes_with_reason() {
        let status = RunStatus::Aborted(AbortReason::BudgetExceeded {
            budget: BudgetKind::Actions,
            limit: 50,
        });
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["abort"]["reason"], "budget_exceeded");
        assert_eq!(json["abort"]["budget"], "actions");

        let back: RunStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, status);
    }
}
