//! # deskpilot-automation
//!
//! 컴퓨터 사용 루프의 실행 크레이트.
//! 입력 드라이버(enigo / NoOp), 네이티브 액션 실행기, 모델 대화 루프,
//! 캡처 → 스케일 → 모델 → 동의 → 실행 오케스트레이터를 담당한다.

pub mod agent;
pub mod executor;
pub mod input_driver;
pub mod keys;
pub mod orchestrator;
pub mod reporting;
