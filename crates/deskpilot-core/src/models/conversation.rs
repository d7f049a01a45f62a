//! 대화 상태 모델.
//!
//! 실행 1회 동안 오케스트레이터가 소유하는 명시적 값이다. 턴은 추가만 되고
//! 삭제되지 않으며, 모델에 재전송할 때만 최근 N턴으로 잘라서 렌더링한다.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::action::{ActionOutcome, ActionRecord, ScreenBounds};
use crate::models::response::ModelResponse;
use crate::models::run::ConsentDecision;

/// 턴과 함께 모델에 전달하는 직전 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum TurnFeedback {
    /// 첫 턴
    Start,
    /// 직전 턴 액션 실행 결과
    Results(Vec<ActionRecord>),
    /// 사용자가 직전 배치를 거부함
    Declined,
}

impl TurnFeedback {
    /// 모델에 보낼 텍스트
    pub fn render(&self) -> String {
        match self {
            TurnFeedback::Start => {
                "Begin the task. The current screen is attached.".to_string()
            }
            TurnFeedback::Results(records) if records.is_empty() => {
                "No actions were executed. The current screen is attached.".to_string()
            }
            TurnFeedback::Results(records) => {
                let mut text = format!("Executed {} action(s):\n", records.len());
                for record in records {
                    let status = match &record.outcome {
                        ActionOutcome::Succeeded => "ok".to_string(),
                        ActionOutcome::Failed { cause } => {
                            format!("failed: {cause}")
                        }
                    };
                    text.push_str(&format!(
                        "- [{}] {}: {status}\n",
                        record.index,
                        record.proposed.summary()
                    ));
                }
                text.push_str("The current screen is attached.");
                text
            }
            TurnFeedback::Declined => "The user declined the proposed actions. \
                 Propose a different approach or finish the task. \
                 The current screen is attached."
                .to_string(),
        }
    }
}

/// 대화 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// 모델에 재전송하는 과거 메시지 (텍스트만, 과거 이미지는 보내지 않음)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: MessageRole,
    pub content: String,
}

/// 완료된 턴 1개
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// 턴 번호 (1부터)
    pub index: u32,
    /// 이 턴에 보낸 스크린샷 ID
    pub screenshot_id: Uuid,
    /// 모델이 본 뷰포트 크기
    pub viewport: ScreenBounds,
    /// 스크린샷과 함께 보낸 피드백
    pub feedback: TurnFeedback,
    /// 디코딩된 모델 응답
    pub response: ModelResponse,
    /// 동의 게이트 결과
    pub consent: ConsentDecision,
    /// 실행 기록
    pub records: Vec<ActionRecord>,
}

/// 실행 1회의 대화 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// 사용자 작업 지시
    pub task: String,
    /// 완료된 턴 (오래된 순)
    pub turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            turns: Vec::new(),
        }
    }

    /// 다음 턴 번호
    pub fn next_turn_index(&self) -> u32 {
        self.turns.len() as u32 + 1
    }

    /// 턴 추가
    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// 마지막 턴
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// 마지막 턴에 동의 결과 기록
    pub fn record_consent(&mut self, decision: ConsentDecision) {
        if let Some(turn) = self.turns.last_mut() {
            turn.consent = decision;
        }
    }

    /// 마지막 턴에 실행 기록 추가
    pub fn record_action(&mut self, record: ActionRecord) {
        if let Some(turn) = self.turns.last_mut() {
            turn.records.push(record);
        }
    }

    /// 모델에 재전송할 히스토리 렌더링
    ///
    /// 작업 지시는 항상 첫 메시지로 포함되고, 그 뒤로 최근 `max_turns`개 턴만
    /// (피드백 → 응답) 쌍으로 이어진다. 저장된 상태는 자르지 않는다.
    pub fn render_history(&self, max_turns: usize) -> Vec<HistoryMessage> {
        let mut messages = vec![HistoryMessage {
            role: MessageRole::User,
            content: format!("Task: {}", self.task),
        }];

        let skip = self.turns.len().saturating_sub(max_turns);
        for turn in self.turns.iter().skip(skip) {
            messages.push(HistoryMessage {
                role: MessageRole::User,
                content: format!(
                    "[turn {} · screenshot {}x{}]\n{}",
                    turn.index,
                    turn.viewport.width,
                    turn.viewport.height,
                    turn.feedback.render()
                ),
            });
            let reply = serde_json::to_string(&turn.response)
                .unwrap_or_else(|_| turn.response.message.clone().unwrap_or_default());
            messages.push(HistoryMessage {
                role: MessageRole::Assistant,
                content: reply,
            });
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::{MouseButton, ProposedAction};

    fn turn(index: u32) -> Turn {
        Turn {
            index,
            screenshot_id: Uuid::new_v4(),
            viewport: ScreenBounds::new(1024, 683),
            feedback: TurnFeedback::Start,
            response: ModelResponse {
                message: Some(format!("turn {index}")),
                ..Default::default()
            },
            consent: ConsentDecision::NotRequired,
            records: Vec::new(),
        }
    }

    #[test]
    fn history_window_keeps_task_and_recent_turns() {
        let mut state = ConversationState::new("메모장 열기");
        for i in 1..=5 {
            state.push_turn(turn(i));
        }

        let history = state.render_history(2);
        // task + 2 turns × (user, assistant)
        assert_eq!(history.len(), 5);
        assert!(history[0].content.contains("메모장 열기"));
        assert!(history[1].content.contains("turn 4"));
        assert!(history[4].content.contains("turn 5"));
        // 저장된 상태는 그대로
        assert_eq!(state.turns.len(), 5);
        assert_eq!(state.next_turn_index(), 6);
    }

    #[test]
    fn results_feedback_lists_outcomes() {
        let feedback = TurnFeedback::Results(vec![
            ActionRecord {
                turn: 1,
                index: 0,
                proposed: ProposedAction::Click {
                    x: 1,
                    y: 2,
                    button: MouseButton::Left,
                },
                executed: ProposedAction::Click {
                    x: 2,
                    y: 4,
                    button: MouseButton::Left,
                },
                outcome: ActionOutcome::Succeeded,
            },
            ActionRecord {
                turn: 1,
                index: 1,
                proposed: ProposedAction::KeyCombo {
                    keys: vec!["hyper".into()],
                },
                executed: ProposedAction::KeyCombo {
                    keys: vec!["hyper".into()],
                },
                outcome: ActionOutcome::Failed {
                    cause: "unknown key".into(),
                },
            },
        ]);
        let text = feedback.render();
        assert!(text.contains("Executed 2 action(s)"));
        assert!(text.contains("ok"));
        assert!(text.contains("failed: unknown key"));
    }

    #[test]
    fn records_attach_to_last_turn() {
        let mut state = ConversationState::new("task");
        state.record_consent(ConsentDecision::Approved);
        assert!(state.last_turn().is_none());

        state.push_turn(turn(1));
        state.record_consent(ConsentDecision::Denied);
        assert_eq!(state.turns[0].consent, ConsentDecision::Denied);
    }
}
