//! DESKPILOT 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 라이브러리 에러를 `CoreError`로 변환해서 반환한다.

use thiserror::Error;

use crate::models::action::NativeAction;

/// 코어 레이어 에러.
/// 직렬화, 설정, 캡처, 입력, 모델 응답 디코딩 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 — {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (5xx)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 스크린 캡처 / 해상도 조회 실패 — 이후 단계 진행 불가
    #[error("스크린 캡처 실패: {0}")]
    Capture(String),

    /// OS 입력 시뮬레이션 실패 (디스플레이 서버 없음 등)
    #[error("입력 시뮬레이션 실패: {0}")]
    Input(String),

    /// 모델 응답 디코딩 실패 (재시도 가능)
    #[error("모델 응답 디코딩 실패: {0}")]
    Decode(String),

    /// 좌표 매핑이 현재 스크린샷과 맞지 않음
    #[error("좌표 매핑 불일치: {0}")]
    StaleScale(String),

    /// 잘못된 인자
    #[error("잘못된 인자: {0}")]
    InvalidArguments(String),

    /// 외부 중단 신호로 취소됨
    #[error("중단 신호로 취소됨")]
    Cancelled,
}

impl CoreError {
    /// 같은 요청을 다시 보내면 성공할 수 있는 일시적 에러인지
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_) | CoreError::RateLimit { .. } | CoreError::ServiceUnavailable(_)
        )
    }
}

/// 액션 실행 실패 — 실패한 액션과 원인을 함께 보관한다.
///
/// 치명적이지 않음. 중단 여부는 오케스트레이터의 `stop_on_error` 정책이 결정한다.
#[derive(Debug, Error)]
#[error("액션 실행 실패 ({}): {cause}", .action.action.kind())]
pub struct ExecutionError {
    /// 실행하려던 액션 (네이티브 좌표)
    pub action: NativeAction,
    /// 실패 원인
    #[source]
    pub cause: CoreError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::{ProposedAction, ScreenBounds};

    #[test]
    fn transient_classification() {
        assert!(CoreError::Network("timeout".into()).is_transient());
        assert!(CoreError::RateLimit {
            retry_after_secs: 3
        }
        .is_transient());
        assert!(CoreError::ServiceUnavailable("503".into()).is_transient());
        assert!(!CoreError::Decode("bad json".into()).is_transient());
        assert!(!CoreError::Config("no key".into()).is_transient());
    }

    #[test]
    fn execution_error_names_action_kind() {
        let err = ExecutionError {
            action: NativeAction::new(
                ProposedAction::Type {
                    text: "hello".into(),
                },
                ScreenBounds::new(800, 600),
            ),
            cause: CoreError::Input("no display".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("type"));
        assert!(msg.contains("no display"));
    }
}
