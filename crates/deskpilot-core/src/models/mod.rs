//! DESKPILOT 도메인 모델.
//!
//! 캡처 → 스케일 → 모델 호출 → 실행 루프에서 오가는 데이터 구조체를 정의한다.
//! 이미지 버퍼를 담는 타입을 제외한 모든 모델은 `serde` Serialize/Deserialize를 구현한다.

pub mod action;
pub mod conversation;
pub mod response;
pub mod run;
pub mod screen;
