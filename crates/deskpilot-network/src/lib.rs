//! # deskpilot-network
//!
//! 호스팅 비전 모델 어댑터.
//! 스크린샷 + 대화 히스토리를 제공자별 요청 형식으로 변환해 전송하고,
//! 응답 봉투에서 모델 텍스트를 꺼낸다. 일시적 실패(네트워크, 429, 5xx)는 재시도한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use deskpilot_network::vision_client::RemoteVisionModel;
//!
//! let model = RemoteVisionModel::new(&config.model)?;
//! let reply = model.send(&request).await?;
//! ```

pub mod vision_client;
