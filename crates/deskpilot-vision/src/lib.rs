//! # deskpilot-vision
//!
//! 이미지 처리 크레이트.
//! 스크린 캡처, 뷰포트 스케일링(좌표 매핑 포함), 모델 전송용 PNG/base64 인코딩,
//! 스크린샷 파일 보관을 담당한다.

pub mod archive;
pub mod capture;
pub mod encoder;
pub mod scaler;
