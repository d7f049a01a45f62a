//! # deskpilot-core
//!
//! DESKPILOT 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 도메인 데이터 구조체 (스크린샷, 액션, 대화 상태, 실행 결과)
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 애플리케이션 설정 구조체
//! - [`config_manager`] — 설정 파일 로드 (파일 + 환경변수 레이어)

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;

#[cfg(test)]
mod tests {
    use crate::models::action::{MouseButton, ProposedAction};
    use crate::models::response::ModelResponse;

    #[test]
    fn model_response_serde_roundtrip() {
        let response = ModelResponse {
            actions: vec![ProposedAction::Click {
                x: 10,
                y: 20,
                button: MouseButton::Right,
            }],
            message: Some("우클릭".to_string()),
            done: false,
            requires_consent: true,
            requires_user_input: false,
        };

        let json = serde_json::to_string(&response).unwrap();
        let deserialized: ModelResponse = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, response);
        assert!(deserialized.is_gated());
    }

    #[test]
    fn config_defaults() {
        let config = crate::config::AppConfig::default_config();
        assert_eq!(config.agent.max_turns, 30);
        assert_eq!(config.agent.max_actions, 50);
        assert_eq!(config.agent.decode_retry_budget, 3);
        assert!(config.agent.stop_on_error);
        assert!(!config.agent.autoplay);
        assert_eq!(config.vision.max_dimension, 1024);
    }
}
