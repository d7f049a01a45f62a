//! 실행 오케스트레이터.
//!
//! 캡처 → 스케일 → 인코딩 → 모델 → (동의) → 실행 → 리포트 루프를 순차로 돌린다.
//! 모든 종료 경로는 `RunSummary`로 끝나며 리포터에 전달된다.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use deskpilot_core::config::AgentConfig;
use deskpilot_core::error::CoreError;
use deskpilot_core::models::action::{ActionOutcome, ActionRecord};
use deskpilot_core::models::conversation::{ConversationState, TurnFeedback};
use deskpilot_core::models::response::ModelResponse;
use deskpilot_core::models::run::{
    AbortReason, BudgetKind, ConsentDecision, RunStatus, RunSummary, TurnReport,
};
use deskpilot_core::models::screen::{CoordinateMapping, Screenshot};
use deskpilot_core::ports::consent::{ConsentGate, ConsentRequest};
use deskpilot_core::ports::reporter::RunReporter;
use deskpilot_core::ports::screen_capture::ScreenCapturer;
use deskpilot_core::ports::vision_model::VisionModel;
use deskpilot_vision::encoder::encode_frame;
use deskpilot_vision::scaler::CoordinateScaler;

use crate::agent::ConversationLoop;
use crate::executor::{cancellable_sleep, ActionExecutor};

/// 모든 요청을 승인하는 동의 게이트 (autoplay)
pub struct AutoApprove;

#[async_trait]
impl ConsentGate for AutoApprove {
    async fn approve(&self, request: &ConsentRequest) -> Result<bool, CoreError> {
        debug!(
            turn = request.turn,
            actions = request.actions.len(),
            "autoplay: 동의 자동 승인"
        );
        Ok(true)
    }
}

/// 실행 1회 카운터
#[derive(Debug, Default)]
struct RunCounters {
    turns: u32,
    actions: u32,
    failed: u32,
}

/// 컴퓨터 사용 루프 오케스트레이터
pub struct Orchestrator {
    capturer: Arc<dyn ScreenCapturer>,
    scaler: CoordinateScaler,
    model: Arc<dyn VisionModel>,
    executor: ActionExecutor,
    consent: Arc<dyn ConsentGate>,
    reporter: Arc<dyn RunReporter>,
    config: AgentConfig,
    abort: Option<watch::Receiver<bool>>,
}

impl Orchestrator {
    /// 새 오케스트레이터 생성
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        scaler: CoordinateScaler,
        model: Arc<dyn VisionModel>,
        executor: ActionExecutor,
        consent: Arc<dyn ConsentGate>,
        reporter: Arc<dyn RunReporter>,
        config: AgentConfig,
    ) -> Self {
        Self {
            capturer,
            scaler,
            model,
            executor,
            consent,
            reporter,
            config,
            abort: None,
        }
    }

    /// 중단 신호 연결 (`true`가 되면 다음 확인 지점에서 중단)
    pub fn with_abort_signal(mut self, abort: watch::Receiver<bool>) -> Self {
        self.abort = Some(abort);
        self
    }

    /// 작업 1회 실행. 대화 상태는 실행마다 새로 만든다
    pub async fn run(&self, task: &str) -> RunSummary {
        let started_at = Utc::now();
        info!(
            task,
            model = self.model.model_name(),
            capturer = self.capturer.name(),
            platform = self.executor.platform(),
            max_turns = self.config.max_turns,
            max_actions = self.config.max_actions,
            autoplay = self.config.autoplay,
            "실행 시작"
        );

        let mut state = ConversationState::new(task);
        let mut agent = ConversationLoop::new(
            self.model.clone(),
            self.config.decode_retry_budget,
            self.config.history_turns,
        );
        let mut counters = RunCounters::default();

        let status = self.drive(&mut agent, &mut state, &mut counters).await;
        match &status {
            RunStatus::Done => agent.mark_done(),
            RunStatus::Aborted(reason) => agent.abort(reason.clone()),
        }

        let summary = RunSummary {
            task: task.to_string(),
            status,
            turns_used: counters.turns,
            actions_executed: counters.actions,
            actions_failed: counters.failed,
            final_message: state
                .turns
                .iter()
                .rev()
                .find_map(|turn| turn.response.message.clone()),
            started_at,
            finished_at: Utc::now(),
        };

        if let Err(e) = self.reporter.run_finished(&summary).await {
            warn!("실행 요약 리포트 실패: {e}");
        }
        summary
    }

    async fn drive(
        &self,
        agent: &mut ConversationLoop,
        state: &mut ConversationState,
        counters: &mut RunCounters,
    ) -> RunStatus {
        let mut feedback = TurnFeedback::Start;

        loop {
            if self.is_aborted() {
                info!(turn = counters.turns + 1, "중단 신호 수신");
                return RunStatus::Aborted(AbortReason::UserAbort);
            }
            if counters.turns >= self.config.max_turns {
                info!(limit = self.config.max_turns, "턴 예산 소진");
                return RunStatus::Aborted(AbortReason::BudgetExceeded {
                    budget: BudgetKind::Turns,
                    limit: self.config.max_turns,
                });
            }

            // 캡처 → 스케일 → 인코딩. 매핑은 이 스크린샷에서만 유효
            let screenshot = match self.capturer.capture().await {
                Ok(shot) => shot,
                Err(e) => return resource_abort("화면 캡처 실패", e),
            };
            let scaled = match self.scaler.scale(&screenshot) {
                Ok(scaled) => scaled,
                Err(e) => return resource_abort("스크린샷 스케일 실패", e),
            };
            let mapping = scaled.mapping;
            let frame = match encode_frame(&scaled) {
                Ok(frame) => frame,
                Err(e) => return resource_abort("프레임 인코딩 실패", e),
            };
            drop(scaled);

            let output = match agent.step(state, &frame, feedback).await {
                Ok(output) => output,
                Err(e) => {
                    error!(turn = state.next_turn_index(), "대화 루프 중단: {e}");
                    return RunStatus::Aborted(e.abort_reason());
                }
            };
            counters.turns += 1;
            let turn = output.turn;
            let response = output.response;

            if let Some(message) = &response.message {
                info!(turn, "모델 메시지: {message}");
            }

            let consent = self.gate(agent, turn, &response).await;
            state.record_consent(consent);
            if self.is_aborted() {
                self.report_turn(turn, &screenshot, &mapping, &response, consent, Vec::new())
                    .await;
                return RunStatus::Aborted(AbortReason::UserAbort);
            }

            if consent == ConsentDecision::Denied {
                self.report_turn(turn, &screenshot, &mapping, &response, consent, Vec::new())
                    .await;
                if !self.config.continue_on_consent_denial {
                    return RunStatus::Aborted(AbortReason::ConsentDenied);
                }
                info!(turn, "동의 거부, 다음 턴에 모델에 알림");
                agent.finish_turn();
                feedback = TurnFeedback::Declined;
                continue;
            }

            agent.begin_execution();
            let mut records = Vec::with_capacity(response.actions.len());
            let stopped = self
                .execute_batch(
                    turn,
                    &response,
                    &screenshot,
                    &mapping,
                    state,
                    counters,
                    &mut records,
                )
                .await;

            self.report_turn(turn, &screenshot, &mapping, &response, consent, records.clone())
                .await;

            if let Some(reason) = stopped {
                return RunStatus::Aborted(reason);
            }
            if response.done {
                info!(turn, "모델 완료 신호");
                return RunStatus::Done;
            }

            agent.finish_turn();
            feedback = TurnFeedback::Results(records);
        }
    }

    /// 동의 게이트 — 게이트 대상이 아니거나 autoplay면 묻지 않는다
    async fn gate(
        &self,
        agent: &mut ConversationLoop,
        turn: u32,
        response: &ModelResponse,
    ) -> ConsentDecision {
        if !response.is_gated() {
            return ConsentDecision::NotRequired;
        }
        if self.config.autoplay {
            debug!(turn, "autoplay: 동의 게이트 생략");
            return ConsentDecision::AutoApproved;
        }

        agent.begin_consent();
        let request = ConsentRequest {
            turn,
            message: response.message.clone(),
            actions: response.actions.clone(),
            requires_user_input: response.requires_user_input,
        };
        let answer = match &self.abort {
            Some(abort) => {
                let mut abort = abort.clone();
                tokio::select! {
                    answer = self.consent.approve(&request) => answer,
                    true = async { abort.wait_for(|aborted| *aborted).await.is_ok() } => {
                        info!(turn, "동의 대기 중 중단 신호 수신");
                        Ok(false)
                    }
                }
            }
            None => self.consent.approve(&request).await,
        };
        match answer {
            Ok(true) => {
                info!(turn, actions = request.actions.len(), "동의 승인");
                ConsentDecision::Approved
            }
            Ok(false) => {
                info!(turn, actions = request.actions.len(), "동의 거부");
                ConsentDecision::Denied
            }
            Err(e) => {
                warn!(turn, "동의 확인 실패, 거부로 처리: {e}");
                ConsentDecision::Denied
            }
        }
    }

    /// 배치 실행. 실행을 멈춰야 하면 중단 사유 반환
    #[allow(clippy::too_many_arguments)]
    async fn execute_batch(
        &self,
        turn: u32,
        response: &ModelResponse,
        screenshot: &Screenshot,
        mapping: &CoordinateMapping,
        state: &mut ConversationState,
        counters: &mut RunCounters,
        records: &mut Vec<ActionRecord>,
    ) -> Option<AbortReason> {
        for (index, proposed) in response.actions.iter().enumerate() {
            if self.is_aborted() {
                info!(turn, action = index, "중단 신호 수신, 남은 액션 건너뜀");
                return Some(AbortReason::UserAbort);
            }
            if counters.actions >= self.config.max_actions {
                info!(turn, action = index, limit = self.config.max_actions, "액션 예산 소진");
                return Some(AbortReason::BudgetExceeded {
                    budget: BudgetKind::Actions,
                    limit: self.config.max_actions,
                });
            }
            counters.actions += 1;

            let (executed, outcome) = match mapping.remap(proposed, screenshot) {
                Ok(native) => match self.executor.execute(&native).await {
                    Ok(done) => {
                        debug!(
                            turn,
                            action = index,
                            clamped = done.clamped,
                            elapsed_ms = done.elapsed_ms,
                            "액션 실행: {}",
                            done.native.summary()
                        );
                        (done.native, ActionOutcome::Succeeded)
                    }
                    Err(e) => (
                        native.clamped(),
                        ActionOutcome::Failed {
                            cause: e.to_string(),
                        },
                    ),
                },
                Err(e) => (
                    proposed.clone(),
                    ActionOutcome::Failed {
                        cause: e.to_string(),
                    },
                ),
            };

            let record = ActionRecord {
                turn,
                index,
                proposed: proposed.clone(),
                executed,
                outcome,
            };
            state.record_action(record.clone());
            records.push(record.clone());

            if let ActionOutcome::Failed { cause } = &record.outcome {
                counters.failed += 1;
                warn!(
                    turn,
                    action = index,
                    kind = proposed.kind(),
                    "액션 실행 실패: {cause}"
                );
                if self.config.stop_on_error {
                    return Some(AbortReason::ExecutionFailed {
                        turn,
                        action_index: index,
                        cause: cause.clone(),
                    });
                }
            }

            // 완료 배치의 마지막 액션 뒤에는 기다릴 다음 동작이 없다
            if response.done && index + 1 == response.actions.len() {
                break;
            }
            if cancellable_sleep(self.config.action_delay(), self.abort.as_ref()).await {
                info!(turn, action = index, "중단 신호 수신 (액션 간 대기 중)");
                return Some(AbortReason::UserAbort);
            }
        }
        None
    }

    async fn report_turn(
        &self,
        turn: u32,
        screenshot: &Screenshot,
        mapping: &CoordinateMapping,
        response: &ModelResponse,
        consent: ConsentDecision,
        records: Vec<ActionRecord>,
    ) {
        let report = TurnReport {
            turn,
            screenshot_id: screenshot.id,
            native: mapping.native_bounds(),
            viewport: mapping.viewport_bounds(),
            factor: mapping.factor,
            message: response.message.clone(),
            proposed: response.actions.clone(),
            consent,
            records,
            done: response.done,
        };
        if let Err(e) = self.reporter.turn_completed(&report).await {
            warn!(turn, "턴 리포트 실패: {e}");
        }
    }

    fn is_aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

fn resource_abort(context: &str, cause: CoreError) -> RunStatus {
    error!("{context}: {cause}");
    RunStatus::Aborted(AbortReason::Resource {
        cause: cause.to_string(),
    })
}
