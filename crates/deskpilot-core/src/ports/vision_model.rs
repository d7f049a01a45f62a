//! 비전 모델 포트.
//!
//! 스크린샷과 대화 히스토리를 호스팅 모델에 보내고 응답 텍스트를 받는다.
//! 응답 디코딩은 호출자(대화 루프)가 담당한다.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::conversation::HistoryMessage;
use crate::models::screen::EncodedFrame;

/// 모델 요청 1건
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// 과거 대화 (작업 지시 + 최근 턴)
    pub history: Vec<HistoryMessage>,
    /// 이번 턴 피드백 텍스트
    pub feedback: String,
    /// 이번 턴 스크린샷 (뷰포트 크기, base64 PNG)
    pub frame: EncodedFrame,
    /// 같은 프레임에 대한 몇 번째 시도인지 (1부터)
    pub attempt: u32,
}

/// 비전 모델 — 응답 텍스트 반환
///
/// 구현체: `RemoteVisionModel` (Anthropic / OpenAI / Azure OpenAI)
///
/// 일시적 전송 에러는 구현체가 자체 재시도한 뒤에도 실패하면 반환한다.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// 요청 전송 후 모델 응답 텍스트 반환
    async fn send(&self, request: &ModelRequest) -> Result<String, CoreError>;

    /// 모델 이름 (로그용)
    fn model_name(&self) -> &str;
}
