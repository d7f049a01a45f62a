//! 모델 응답 모델 및 디코딩.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::action::ProposedAction;

/// 비전 모델이 한 턴에 돌려주는 응답
///
/// 모든 필드는 JSON에서 생략 가능하다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelResponse {
    /// 제안 액션 배치 (뷰포트 좌표, 순서대로 실행)
    pub actions: Vec<ProposedAction>,
    /// 사용자에게 보여줄 메시지
    pub message: Option<String>,
    /// 작업 완료 신호
    pub done: bool,
    /// 실행 전 사용자 동의 필요
    pub requires_consent: bool,
    /// 사용자 입력 필요 (동의 게이트와 동일하게 취급)
    pub requires_user_input: bool,
}

impl ModelResponse {
    /// 모델 응답 텍스트에서 `ModelResponse` 추출
    ///
    /// 마크다운 코드 블록이나 앞뒤 설명문이 섞여 있어도 첫 `{`부터 마지막 `}`까지를 JSON으로 읽는다.
    pub fn decode(text: &str) -> Result<Self, CoreError> {
        let json_str = match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => {
                return Err(CoreError::Decode(format!(
                    "JSON 객체를 찾을 수 없음 (raw: {})",
                    preview(text)
                )))
            }
        };

        let response: ModelResponse = serde_json::from_str(json_str).map_err(|e| {
            CoreError::Decode(format!("ModelResponse 파싱 실패: {e} (raw: {})", preview(json_str)))
        })?;

        response.validate()?;
        Ok(response)
    }

    /// 값 범위 검증 — 역직렬화는 통과했지만 실행할 수 없는 액션 거부
    fn validate(&self) -> Result<(), CoreError> {
        for (index, action) in self.actions.iter().enumerate() {
            if let ProposedAction::Wait { seconds } = action {
                if !seconds.is_finite() || *seconds < 0.0 {
                    return Err(CoreError::Decode(format!(
                        "actions[{index}]: wait seconds 값이 유효하지 않음 ({seconds})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// 동의 게이트 대상인지 (`requires_consent || requires_user_input`)
    pub fn is_gated(&self) -> bool {
        self.requires_consent || self.requires_user_input
    }
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::MouseButton;

    #[test]
    fn decode_plain_json() {
        let text = r#"{"actions": [{"type": "click", "x": 5, "y": 6}], "done": false}"#;
        let response = ModelResponse::decode(text).unwrap();
        assert_eq!(
            response.actions,
            vec![ProposedAction::Click {
                x: 5,
                y: 6,
                button: MouseButton::Left
            }]
        );
        assert!(!response.is_gated());
    }

    #[test]
    fn decode_markdown_fenced() {
        let text = "계획:\n```json\n{\"message\": \"완료\", \"done\": true}\n```";
        let response = ModelResponse::decode(text).unwrap();
        assert!(response.done);
        assert!(response.actions.is_empty());
        assert_eq!(response.message.as_deref(), Some("완료"));
    }

    #[test]
    fn decode_empty_object_is_default() {
        let response = ModelResponse::decode("{}").unwrap();
        assert_eq!(response, ModelResponse::default());
    }

    #[test]
    fn user_input_is_gated() {
        let response = ModelResponse::decode(r#"{"requires_user_input": true}"#).unwrap();
        assert!(response.is_gated());
    }

    #[test]
    fn decode_failures() {
        assert!(matches!(
            ModelResponse::decode("not json at all"),
            Err(CoreError::Decode(_))
        ));
        assert!(matches!(
            ModelResponse::decode(r#"{"actions": [{"type": "fly"}]}"#),
            Err(CoreError::Decode(_))
        ));
        assert!(matches!(
            ModelResponse::decode(r#"{"actions": [{"type": "wait", "seconds": -1.0}]}"#),
            Err(CoreError::Decode(_))
        ));
        assert!(matches!(
            ModelResponse::decode("} backwards {"),
            Err(CoreError::Decode(_))
        ));
    }
}
