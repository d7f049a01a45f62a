//! 스크린 캡처.
//!
//! xcap 기반 멀티모니터 캡처. xcap 호출은 블로킹이므로 `spawn_blocking`에서 실행한다.

use async_trait::async_trait;
use deskpilot_core::error::CoreError;
use deskpilot_core::models::screen::Screenshot;
use deskpilot_core::ports::screen_capture::ScreenCapturer;
use tracing::debug;
use xcap::Monitor;

/// 스크린 캡처기 — xcap 기반
#[derive(Debug, Clone, Default)]
pub struct XcapScreenCapturer {
    /// 캡처할 모니터 인덱스 (`None`이면 주 모니터)
    monitor_index: Option<usize>,
}

impl XcapScreenCapturer {
    /// 새 캡처기 생성
    pub fn new(monitor_index: Option<usize>) -> Self {
        Self { monitor_index }
    }

    /// 사용 가능한 모니터 수
    pub fn monitor_count() -> Result<usize, CoreError> {
        Monitor::all()
            .map(|m| m.len())
            .map_err(|e| CoreError::Capture(format!("모니터 목록 조회 실패: {e}")))
    }

    /// 동기 캡처 (블로킹)
    fn capture_blocking(monitor_index: Option<usize>) -> Result<Screenshot, CoreError> {
        let monitors = Monitor::all()
            .map_err(|e| CoreError::Capture(format!("모니터 목록 조회 실패: {e}")))?;

        let monitor = match monitor_index {
            Some(index) => monitors
                .into_iter()
                .nth(index)
                .ok_or_else(|| CoreError::Capture(format!("모니터 인덱스 {index} 없음")))?,
            None => {
                // 주 모니터가 없으면 첫 번째 모니터
                let primary = monitors
                    .iter()
                    .position(|m| m.is_primary().unwrap_or(false))
                    .unwrap_or(0);
                monitors
                    .into_iter()
                    .nth(primary)
                    .ok_or_else(|| CoreError::Capture("모니터를 찾을 수 없음".to_string()))?
            }
        };

        let image = monitor
            .capture_image()
            .map_err(|e| CoreError::Capture(format!("스크린 캡처 실패: {e}")))?;

        let (width, height) = (image.width(), image.height());
        debug!("스크린 캡처 완료: {}x{}", width, height);

        Screenshot::from_rgba(width, height, image.into_raw())
    }
}

#[async_trait]
impl ScreenCapturer for XcapScreenCapturer {
    async fn capture(&self) -> Result<Screenshot, CoreError> {
        let monitor_index = self.monitor_index;
        tokio::task::spawn_blocking(move || Self::capture_blocking(monitor_index))
            .await
            .map_err(|e| CoreError::Capture(format!("캡처 태스크 실패: {e}")))?
    }

    fn name(&self) -> &str {
        "xcap"
    }
}
