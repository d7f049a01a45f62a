//! 스크린샷 보관소.
//!
//! 캡처한 네이티브 해상도 스크린샷을 PNG 파일로 남긴다.
//! 구조: `<dir>/screenshot_YYYYMMDD_HHMMSS_NNNN.png` (NNNN = 실행 내 캡처 순번)

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use deskpilot_core::error::CoreError;
use deskpilot_core::models::screen::Screenshot;
use deskpilot_core::ports::screen_capture::ScreenCapturer;

use crate::encoder::encode_png;

/// 스크린샷 PNG 보관소
pub struct ScreenshotArchive {
    dir: PathBuf,
    /// 캡처 순번 (동일 초 내 파일명 중복 방지)
    counter: AtomicU32,
}

impl ScreenshotArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU32::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 스크린샷 1장 저장 후 경로 반환
    pub async fn save(&self, screenshot: &Screenshot) -> Result<PathBuf, CoreError> {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let png = encode_png(&screenshot.rgba, screenshot.width, screenshot.height)?;

        fs::create_dir_all(&self.dir).await?;
        let filename = format!(
            "screenshot_{}_{sequence:04}.png",
            screenshot.captured_at.format("%Y%m%d_%H%M%S")
        );
        let path = self.dir.join(filename);
        fs::write(&path, &png).await?;

        debug!(
            screenshot_id = %screenshot.id,
            bytes = png.len(),
            "스크린샷 저장: {}",
            path.display()
        );
        Ok(path)
    }
}

/// 캡처할 때마다 보관소에 저장하는 캡처기 래퍼
///
/// 저장 실패는 경고만 남기고 캡처 결과는 그대로 돌려준다.
pub struct ArchivingCapturer {
    inner: Arc<dyn ScreenCapturer>,
    archive: ScreenshotArchive,
}

impl ArchivingCapturer {
    pub fn new(inner: Arc<dyn ScreenCapturer>, archive: ScreenshotArchive) -> Self {
        Self { inner, archive }
    }
}

#[async_trait]
impl ScreenCapturer for ArchivingCapturer {
    async fn capture(&self) -> Result<Screenshot, CoreError> {
        let screenshot = self.inner.capture().await?;
        if let Err(e) = self.archive.save(&screenshot).await {
            warn!(
                dir = %self.archive.dir().display(),
                "스크린샷 저장 실패: {e}"
            );
        }
        Ok(screenshot)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
