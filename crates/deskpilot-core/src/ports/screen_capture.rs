//! 스크린 캡처 포트.
//!
//! 구현: `deskpilot-vision` crate (xcap)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::screen::Screenshot;

/// 스크린 캡처기 — 전체 화면 스냅샷 + 네이티브 해상도
///
/// 호출할 때마다 새 ID의 `Screenshot`을 반환한다.
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    /// 전체 화면 캡처. 실패 시 `CoreError::Capture`
    async fn capture(&self) -> Result<Screenshot, CoreError>;

    /// 캡처기 이름 (로그용)
    fn name(&self) -> &str;
}
