//! 동의 게이트 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::action::ProposedAction;

/// 동의 요청 내용
#[derive(Debug, Clone)]
pub struct ConsentRequest {
    /// 턴 번호
    pub turn: u32,
    /// 모델 메시지
    pub message: Option<String>,
    /// 실행 대기 중인 액션 배치
    pub actions: Vec<ProposedAction>,
    /// 모델이 사용자 입력을 요구했는지
    pub requires_user_input: bool,
}

/// 동의 게이트 — 게이트 대상 배치 실행 전 사용자 승인
///
/// 구현체: `AutoApprove` (autoplay), `TerminalConsentPrompt` (stdin y/N)
///
/// `Err`는 호출자가 거부로 취급한다.
#[async_trait]
pub trait ConsentGate: Send + Sync {
    /// 승인 여부
    async fn approve(&self, request: &ConsentRequest) -> Result<bool, CoreError>;
}
