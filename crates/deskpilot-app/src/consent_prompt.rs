//! 터미널 동의 프롬프트.
//!
//! 게이트 대상 배치를 stderr에 보여주고 stdin에서 `y/N`을 읽는다.
//! 입력은 블로킹이므로 `spawn_blocking`에서 읽는다.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use tracing::debug;

use deskpilot_core::error::CoreError;
use deskpilot_core::ports::consent::{ConsentGate, ConsentRequest};

/// stdin y/N 동의 게이트
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsentPrompt;

impl TerminalConsentPrompt {
    pub fn new() -> Self {
        Self
    }
}

/// 사용자에게 보여줄 프롬프트 텍스트
pub fn render_prompt(request: &ConsentRequest) -> String {
    let mut text = format!("\n[turn {}] 다음 액션을 실행할까요?\n", request.turn);
    if let Some(message) = &request.message {
        text.push_str(&format!("  모델: {message}\n"));
    }
    if request.requires_user_input {
        text.push_str("  (모델이 사용자 입력을 요청했습니다)\n");
    }
    if request.actions.is_empty() {
        text.push_str("  (실행할 액션 없음)\n");
    }
    for (index, action) in request.actions.iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", index + 1, action.summary()));
    }
    text.push_str("승인하려면 y 입력 [y/N]: ");
    text
}

/// `y` / `yes`만 승인. 그 외(빈 입력 포함)는 거부
pub fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl ConsentGate for TerminalConsentPrompt {
    async fn approve(&self, request: &ConsentRequest) -> Result<bool, CoreError> {
        let prompt = render_prompt(request);

        let answer = tokio::task::spawn_blocking(move || -> Result<String, CoreError> {
            let mut stderr = std::io::stderr().lock();
            stderr.write_all(prompt.as_bytes())?;
            stderr.flush()?;

            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line)?;
            if read == 0 {
                return Err(CoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stdin이 닫혀 있어 동의를 받을 수 없습니다",
                )));
            }
            Ok(line)
        })
        .await
        .map_err(|e| CoreError::Internal(format!("동의 입력 태스크 실패: {e}")))??;

        let approved = parse_answer(&answer);
        debug!(turn = request.turn, approved, "동의 응답");
        Ok(approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_core::models::action::{MouseButton, ProposedAction};

    #[test]
    fn answers() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer(" YES "));
        assert!(!parse_answer("\n"));
        assert!(!parse_answer("n"));
        assert!(!parse_answer("yep"));
    }

    #[test]
    fn prompt_lists_actions_without_typed_text() {
        let request = ConsentRequest {
            turn: 3,
            message: Some("비밀번호 입력".into()),
            actions: vec![
                ProposedAction::Click {
                    x: 10,
                    y: 20,
                    button: MouseButton::Left,
                },
                ProposedAction::Type {
                    text: "hunter2".into(),
                },
            ],
            requires_user_input: false,
        };
        let prompt = render_prompt(&request);
        assert!(prompt.contains("[turn 3]"));
        assert!(prompt.contains("비밀번호 입력"));
        assert!(prompt.contains("1. click left"));
        assert!(prompt.contains("2. "));
        assert!(!prompt.contains("hunter2"));
        assert!(prompt.ends_with("[y/N]: "));
    }
}
