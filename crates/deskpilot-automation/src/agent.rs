//! 모델 대화 루프.
//!
//! 매 턴 대화 히스토리 + 현재 스크린샷을 비전 모델에 보내고 응답을 디코딩한다.
//! 디코딩 실패는 같은 프레임으로 재전송하며 `decode_retry_budget`회 시도 후 중단한다.
//!
//! 대화 상태(`ConversationState`)는 호출자가 소유하고 `&mut`로 빌려준다.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use deskpilot_core::error::CoreError;
use deskpilot_core::models::action::ScreenBounds;
use deskpilot_core::models::conversation::{ConversationState, Turn, TurnFeedback};
use deskpilot_core::models::response::ModelResponse;
use deskpilot_core::models::run::{AbortReason, ConsentDecision};
use deskpilot_core::models::screen::EncodedFrame;
use deskpilot_core::ports::vision_model::{ModelRequest, VisionModel};

/// 대화 루프 단계
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentPhase {
    /// 모델 응답 대기
    AwaitingResponse,
    /// 디코딩된 액션 배치 보유
    HasActions,
    /// 사용자 동의 대기
    ConsentPending,
    /// 액션 실행 중
    Executing,
    /// 작업 완료 (종료)
    Done,
    /// 중단 (종료)
    Aborted(AbortReason),
}

impl AgentPhase {
    /// 종료 단계인지
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentPhase::Done | AgentPhase::Aborted(_))
    }
}

/// `step` 실패
#[derive(Debug, Error)]
pub enum StepError {
    /// 모델 전송 실패 (클라이언트 재시도 후)
    #[error("모델 호출 실패: {0}")]
    Model(#[source] CoreError),

    /// 같은 프레임으로 재시도했지만 응답을 끝내 해석하지 못함
    #[error("응답 디코딩 재시도 예산 소진 ({attempts}회)")]
    DecodeBudgetExceeded { attempts: u32, last_error: String },
}

impl StepError {
    /// 실행 중단 사유로 변환
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            StepError::Model(cause) => AbortReason::ModelUnavailable {
                cause: cause.to_string(),
            },
            StepError::DecodeBudgetExceeded { attempts, .. } => {
                AbortReason::DecodeRetryBudgetExceeded {
                    attempts: *attempts,
                }
            }
        }
    }
}

/// `step` 결과
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// 추가된 턴 번호
    pub turn: u32,
    /// 디코딩된 응답
    pub response: ModelResponse,
    /// 응답을 얻기까지 시도 횟수
    pub attempts: u32,
}

/// 모델 대화 루프
pub struct ConversationLoop {
    model: Arc<dyn VisionModel>,
    decode_retry_budget: u32,
    history_turns: usize,
    phase: AgentPhase,
}

impl ConversationLoop {
    /// 새 대화 루프. `decode_retry_budget`은 최소 1회로 보정된다
    pub fn new(model: Arc<dyn VisionModel>, decode_retry_budget: u32, history_turns: usize) -> Self {
        Self {
            model,
            decode_retry_budget: decode_retry_budget.max(1),
            history_turns,
            phase: AgentPhase::AwaitingResponse,
        }
    }

    /// 현재 단계
    pub fn phase(&self) -> &AgentPhase {
        &self.phase
    }

    /// 모델 이름
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// 턴 1회: 히스토리 + 프레임 전송 → 응답 디코딩 → 상태에 턴 추가
    pub async fn step(
        &mut self,
        state: &mut ConversationState,
        frame: &EncodedFrame,
        feedback: TurnFeedback,
    ) -> Result<StepOutput, StepError> {
        self.phase = AgentPhase::AwaitingResponse;
        let turn = state.next_turn_index();

        let mut request = ModelRequest {
            history: state.render_history(self.history_turns),
            feedback: feedback.render(),
            frame: frame.clone(),
            attempt: 0,
        };

        let mut last_error = String::new();
        for attempt in 1..=self.decode_retry_budget {
            request.attempt = attempt;
            debug!(
                turn,
                attempt,
                model = self.model.model_name(),
                history = request.history.len(),
                "모델 요청 전송"
            );

            let decoded = match self.model.send(&request).await {
                Ok(text) => ModelResponse::decode(&text),
                Err(e @ CoreError::Decode(_)) => Err(e),
                Err(e) => {
                    warn!(turn, attempt, "모델 호출 실패: {e}");
                    let err = StepError::Model(e);
                    self.phase = AgentPhase::Aborted(err.abort_reason());
                    return Err(err);
                }
            };

            match decoded {
                Ok(response) => {
                    info!(
                        turn,
                        attempt,
                        actions = response.actions.len(),
                        done = response.done,
                        gated = response.is_gated(),
                        "모델 응답 수신"
                    );
                    state.push_turn(Turn {
                        index: turn,
                        screenshot_id: frame.source_id,
                        viewport: ScreenBounds::new(frame.width, frame.height),
                        feedback,
                        response: response.clone(),
                        consent: ConsentDecision::NotRequired,
                        records: Vec::new(),
                    });
                    self.phase = AgentPhase::HasActions;
                    return Ok(StepOutput {
                        turn,
                        response,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(
                        turn,
                        attempt,
                        budget = self.decode_retry_budget,
                        "응답 디코딩 실패, 같은 프레임으로 재시도: {e}"
                    );
                    last_error = e.to_string();
                }
            }
        }

        let err = StepError::DecodeBudgetExceeded {
            attempts: self.decode_retry_budget,
            last_error,
        };
        self.phase = AgentPhase::Aborted(err.abort_reason());
        Err(err)
    }

    /// 동의 대기 진입
    pub fn begin_consent(&mut self) {
        self.transition(AgentPhase::ConsentPending);
    }

    /// 실행 진입
    pub fn begin_execution(&mut self) {
        self.transition(AgentPhase::Executing);
    }

    /// 턴 종료 → 다음 응답 대기
    pub fn finish_turn(&mut self) {
        self.transition(AgentPhase::AwaitingResponse);
    }

    /// 작업 완료
    pub fn mark_done(&mut self) {
        self.transition(AgentPhase::Done);
    }

    /// 중단
    pub fn abort(&mut self, reason: AbortReason) {
        self.transition(AgentPhase::Aborted(reason));
    }

    // 종료 단계에서는 더 이상 전이하지 않는다
    fn transition(&mut self, next: AgentPhase) {
        if self.phase.is_terminal() {
            debug!(current = ?self.phase, next = ?next, "종료 단계 이후 전이 무시");
            return;
        }
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deskpilot_core::models::conversation::MessageRole;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// 준비된 응답을 순서대로 돌려주는 모델
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, CoreError>>>,
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, CoreError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ModelRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VisionModel for ScriptedModel {
        async fn send(&self, request: &ModelRequest) -> Result<String, CoreError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CoreError::Internal("응답 없음".into())))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn frame() -> EncodedFrame {
        EncodedFrame {
            source_id: Uuid::new_v4(),
            width: 1024,
            height: 683,
            media_type: "image/png".to_string(),
            data_base64: "iVBORw0KGgo=".to_string(),
        }
    }

    const CLICK: &str = r#"{"actions":[{"type":"click","x":512,"y":341}],"message":"클릭"}"#;

    #[tokio::test]
    async fn step_appends_turn_and_moves_to_has_actions() {
        let model = ScriptedModel::new(vec![Ok(CLICK.to_string())]);
        let mut agent = ConversationLoop::new(model.clone(), 3, 10);
        let mut state = ConversationState::new("메모장 열기");
        let frame = frame();

        let output = agent
            .step(&mut state, &frame, TurnFeedback::Start)
            .await
            .unwrap();

        assert_eq!(output.turn, 1);
        assert_eq!(output.attempts, 1);
        assert_eq!(output.response.actions.len(), 1);
        assert_eq!(agent.phase(), &AgentPhase::HasActions);

        assert_eq!(state.turns.len(), 1);
        assert_eq!(state.turns[0].screenshot_id, frame.source_id);
        assert_eq!(state.turns[0].viewport, ScreenBounds::new(1024, 683));

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].attempt, 1);
        assert_eq!(requests[0].history.len(), 1);
        assert_eq!(requests[0].history[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn second_step_replays_history() {
        let model = ScriptedModel::new(vec![Ok(CLICK.to_string()), Ok(r#"{"done":true}"#.into())]);
        let mut agent = ConversationLoop::new(model.clone(), 3, 10);
        let mut state = ConversationState::new("task");

        agent
            .step(&mut state, &frame(), TurnFeedback::Start)
            .await
            .unwrap();
        agent.finish_turn();
        let output = agent
            .step(&mut state, &frame(), TurnFeedback::Results(Vec::new()))
            .await
            .unwrap();

        assert_eq!(output.turn, 2);
        assert!(output.response.done);
        // task + (user, assistant) for turn 1
        assert_eq!(model.requests()[1].history.len(), 3);
    }

    #[tokio::test]
    async fn decode_failure_retries_same_frame() {
        let model = ScriptedModel::new(vec![
            Ok("죄송합니다, 도와드릴 수 없습니다".into()),
            Err(CoreError::Decode("빈 content".into())),
            Ok(CLICK.to_string()),
        ]);
        let mut agent = ConversationLoop::new(model.clone(), 3, 10);
        let mut state = ConversationState::new("task");
        let frame = frame();

        let output = agent
            .step(&mut state, &frame, TurnFeedback::Start)
            .await
            .unwrap();

        assert_eq!(output.attempts, 3);
        let requests = model.requests();
        let attempts: Vec<u32> = requests.iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert!(requests.iter().all(|r| r.frame.source_id == frame.source_id));
        // 실패한 시도는 상태에 남지 않는다
        assert_eq!(state.turns.len(), 1);
    }

    #[tokio::test]
    async fn decode_budget_exhausted_aborts() {
        let model = ScriptedModel::new(vec![
            Ok("not json".into()),
            Ok("{broken".into()),
            Ok(r#"{"actions":[{"type":"teleport"}]}"#.into()),
        ]);
        let mut agent = ConversationLoop::new(model.clone(), 3, 10);
        let mut state = ConversationState::new("task");

        let err = agent
            .step(&mut state, &frame(), TurnFeedback::Start)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::DecodeBudgetExceeded { attempts: 3, .. }));
        assert_eq!(
            agent.phase(),
            &AgentPhase::Aborted(AbortReason::DecodeRetryBudgetExceeded { attempts: 3 })
        );
        assert!(state.turns.is_empty());
        assert_eq!(model.requests().len(), 3);
    }

    #[tokio::test]
    async fn transport_error_is_not_retried() {
        let model = ScriptedModel::new(vec![Err(CoreError::ServiceUnavailable("503".into()))]);
        let mut agent = ConversationLoop::new(model.clone(), 3, 10);
        let mut state = ConversationState::new("task");

        let err = agent
            .step(&mut state, &frame(), TurnFeedback::Start)
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::Model(CoreError::ServiceUnavailable(_))));
        assert!(matches!(
            err.abort_reason(),
            AbortReason::ModelUnavailable { .. }
        ));
        assert_eq!(model.requests().len(), 1);
    }

    #[test]
    fn terminal_phase_is_sticky() {
        let model = ScriptedModel::new(Vec::new());
        let mut agent = ConversationLoop::new(model, 3, 10);

        agent.begin_consent();
        assert_eq!(agent.phase(), &AgentPhase::ConsentPending);
        agent.begin_execution();
        assert_eq!(agent.phase(), &AgentPhase::Executing);
        agent.abort(AbortReason::ConsentDenied);
        agent.finish_turn();
        agent.mark_done();
        assert_eq!(agent.phase(), &AgentPhase::Aborted(AbortReason::ConsentDenied));
        assert!(agent.phase().is_terminal());
    }
}
