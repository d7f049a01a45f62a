//! 좌표 스케일러.
//!
//! fast_image_resize 기반 고속 리사이즈 + 뷰포트 좌표 매핑 계산.
//! 매핑은 스크린샷마다 새로 계산하며 턴 사이에 캐시하지 않는다.

use deskpilot_core::error::CoreError;
use deskpilot_core::models::screen::{CoordinateMapping, ScaledImage, Screenshot};
use fast_image_resize::{images::Image as FirImage, PixelType, ResizeAlg, ResizeOptions, Resizer};
use tracing::debug;

/// 좌표 스케일러 — 긴 변을 `max_dimension`으로 축소
#[derive(Debug, Clone, Copy)]
pub struct CoordinateScaler {
    max_dimension: u32,
}

impl CoordinateScaler {
    /// 새 스케일러 생성. `max_dimension == 0`이면 설정 에러
    pub fn new(max_dimension: u32) -> Result<Self, CoreError> {
        if max_dimension == 0 {
            return Err(CoreError::Config(
                "max_dimension은 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(Self { max_dimension })
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// 스크린샷의 좌표 매핑 계산 (리사이즈 없음)
    pub fn mapping_for(&self, screenshot: &Screenshot) -> Result<CoordinateMapping, CoreError> {
        CoordinateMapping::compute(
            screenshot.id,
            screenshot.width,
            screenshot.height,
            self.max_dimension,
        )
    }

    /// 스크린샷을 뷰포트 크기로 축소
    ///
    /// 긴 변이 이미 `max_dimension` 이하면 픽셀을 그대로 복사한다 (확대하지 않음).
    pub fn scale(&self, screenshot: &Screenshot) -> Result<ScaledImage, CoreError> {
        let mapping = self.mapping_for(screenshot)?;
        let (width, height) = (mapping.viewport_width, mapping.viewport_height);

        let rgba = if width == screenshot.width && height == screenshot.height {
            screenshot.rgba.clone()
        } else {
            resize_rgba(
                &screenshot.rgba,
                screenshot.width,
                screenshot.height,
                width,
                height,
            )?
        };

        debug!(
            screenshot_id = %screenshot.id,
            factor = mapping.factor,
            "스케일 완료: {}x{} → {}x{}",
            screenshot.width,
            screenshot.height,
            width,
            height
        );

        Ok(ScaledImage {
            source_id: screenshot.id,
            width,
            height,
            rgba,
            mapping,
        })
    }

    /// 매핑이 스크린샷에 맞으면 그대로, 아니면 새로 계산
    pub fn refresh(
        &self,
        mapping: CoordinateMapping,
        screenshot: &Screenshot,
    ) -> Result<CoordinateMapping, CoreError> {
        if mapping.is_fresh_for(screenshot) {
            return Ok(mapping);
        }
        debug!(
            stale_source = %mapping.source_id,
            screenshot_id = %screenshot.id,
            "오래된 좌표 매핑 재계산"
        );
        self.mapping_for(screenshot)
    }
}

/// RGBA8 버퍼 고속 리사이즈 (Bilinear)
fn resize_rgba(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, CoreError> {
    if src_w == 0 || src_h == 0 {
        return Err(CoreError::Internal("소스 이미지 크기 0".to_string()));
    }
    if width == 0 || height == 0 {
        return Err(CoreError::Internal("목표 이미지 크기 0".to_string()));
    }

    let src_image = FirImage::from_vec_u8(src_w, src_h, src.to_vec(), PixelType::U8x4)
        .map_err(|e| CoreError::Internal(format!("소스 이미지 생성 실패: {e}")))?;

    let mut dst_image = FirImage::new(width, height, PixelType::U8x4);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
        fast_image_resize::FilterType::Bilinear,
    ));

    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Internal(format!("리사이즈 실패: {e}")))?;

    Ok(dst_image.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_core::models::action::{MouseButton, ProposedAction};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Screenshot {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Screenshot::from_rgba(width, height, rgba).unwrap()
    }

    #[test]
    fn zero_max_dimension_rejected() {
        assert!(matches!(
            CoordinateScaler::new(0),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn scales_landscape_to_viewport() {
        let scaler = CoordinateScaler::new(1024).unwrap();
        let screenshot = solid(2400, 1600, [10, 20, 30, 255]);

        let scaled = scaler.scale(&screenshot).unwrap();
        assert_eq!((scaled.width, scaled.height), (1024, 683));
        assert_eq!(scaled.rgba.len(), 1024 * 683 * 4);
        assert_eq!(scaled.source_id, screenshot.id);
        assert!((scaled.mapping.factor - 1024.0 / 2400.0).abs() < 1e-9);
        // 단색 이미지는 리사이즈 후에도 같은 색
        for (got, want) in scaled.rgba[..4].iter().zip([10u8, 20, 30, 255]) {
            assert!(got.abs_diff(want) <= 1, "{got} vs {want}");
        }

        let native = scaled
            .mapping
            .remap(
                &ProposedAction::Click {
                    x: 512,
                    y: 341,
                    button: MouseButton::Left,
                },
                &screenshot,
            )
            .unwrap();
        assert_eq!(
            native.action,
            ProposedAction::Click {
                x: 1200,
                y: 799,
                button: MouseButton::Left
            }
        );
    }

    #[test]
    fn never_upsizes() {
        let scaler = CoordinateScaler::new(1024).unwrap();
        let screenshot = solid(640, 480, [0, 0, 0, 255]);

        let scaled = scaler.scale(&screenshot).unwrap();
        assert_eq!((scaled.width, scaled.height), (640, 480));
        assert_eq!(scaled.mapping.factor, 1.0);
        assert_eq!(scaled.rgba, screenshot.rgba);
    }

    #[test]
    fn result_within_max_dimension() {
        let scaler = CoordinateScaler::new(700).unwrap();
        for (w, h) in [(1920, 1080), (1080, 1920), (3840, 2160), (701, 700), (5000, 3)] {
            let screenshot = solid(w, h, [1, 2, 3, 255]);
            let scaled = scaler.scale(&screenshot).unwrap();
            assert!(scaled.width.max(scaled.height) <= 700, "{w}x{h}");
            assert!(scaled.width >= 1 && scaled.height >= 1);
        }
    }

    #[test]
    fn scaling_same_screenshot_twice_is_identical() {
        let scaler = CoordinateScaler::new(1024).unwrap();
        for (w, h) in [(2400, 1600), (1366, 768), (640, 480)] {
            let screenshot = solid(w, h, [90, 60, 30, 255]);
            let first = scaler.scale(&screenshot).unwrap();
            let second = scaler.scale(&screenshot).unwrap();

            assert_eq!((first.width, first.height), (second.width, second.height));
            assert_eq!(first.mapping, second.mapping, "{w}x{h}");
            assert_eq!(first.mapping.source_id, screenshot.id);
            assert_eq!(first.source_id, second.source_id);
            assert_eq!(first.rgba, second.rgba);
        }
    }

    #[test]
    fn rescaling_output_is_noop() {
        let scaler = CoordinateScaler::new(1024).unwrap();
        let screenshot = solid(2560, 1440, [5, 5, 5, 255]);
        let once = scaler.scale(&screenshot).unwrap();

        let again = Screenshot::from_rgba(once.width, once.height, once.rgba.clone()).unwrap();
        let twice = scaler.scale(&again).unwrap();
        assert_eq!((twice.width, twice.height), (once.width, once.height));
        assert_eq!(twice.mapping.factor, 1.0);
    }

    #[test]
    fn refresh_recomputes_for_new_screenshot() {
        let scaler = CoordinateScaler::new(1024).unwrap();
        let first = solid(2048, 1024, [0, 0, 0, 255]);
        let second = solid(1600, 1200, [0, 0, 0, 255]);

        let mapping = scaler.mapping_for(&first).unwrap();
        assert_eq!(scaler.refresh(mapping, &first).unwrap(), mapping);

        let refreshed = scaler.refresh(mapping, &second).unwrap();
        assert_eq!(refreshed.source_id, second.id);
        assert_eq!(refreshed.native_width, 1600);
        assert!((refreshed.factor - 1024.0 / 1600.0).abs() < 1e-9);
    }
}
