//! PNG 인코더.
//!
//! 스케일된 RGBA 이미지를 PNG로 인코딩하고 base64 문자열로 감싼다.
//! 모델 요청의 이미지 블록 / data URI에 그대로 들어간다.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use deskpilot_core::error::CoreError;
use deskpilot_core::models::screen::{EncodedFrame, ScaledImage};
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

/// PNG MIME 타입
pub const PNG_MEDIA_TYPE: &str = "image/png";

/// RGBA 버퍼 PNG 인코딩
pub fn encode_png(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CoreError> {
    let image = RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or_else(|| {
        CoreError::Internal(format!(
            "RGBA 버퍼 길이 불일치: {} ({}x{})",
            rgba.len(),
            width,
            height
        ))
    })?;

    let mut output = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut output, ImageFormat::Png)
        .map_err(|e| CoreError::Internal(format!("PNG 인코딩 실패: {e}")))?;

    Ok(output.into_inner())
}

/// 스케일 이미지 → 모델 전송용 프레임
pub fn encode_frame(scaled: &ScaledImage) -> Result<EncodedFrame, CoreError> {
    let png = encode_png(&scaled.rgba, scaled.width, scaled.height)?;
    let data_base64 = B64.encode(&png);

    debug!(
        source_id = %scaled.source_id,
        png_bytes = png.len(),
        base64_len = data_base64.len(),
        "프레임 인코딩: {}x{}",
        scaled.width,
        scaled.height
    );

    Ok(EncodedFrame {
        source_id: scaled.source_id,
        width: scaled.width,
        height: scaled.height,
        media_type: PNG_MEDIA_TYPE.to_string(),
        data_base64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::CoordinateScaler;
    use deskpilot_core::models::screen::Screenshot;

    fn make_screenshot(w: u32, h: u32) -> Screenshot {
        let rgba = [128u8, 64, 200, 255]
            .iter()
            .copied()
            .cycle()
            .take((w * h * 4) as usize)
            .collect();
        Screenshot::from_rgba(w, h, rgba).unwrap()
    }

    #[test]
    fn encode_png_signature() {
        let shot = make_screenshot(20, 10);
        let png = encode_png(&shot.rgba, 20, 10).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn encode_png_length_mismatch() {
        assert!(encode_png(&[0; 7], 2, 2).is_err());
    }

    #[test]
    fn encode_frame_decodes_back_to_viewport_size() {
        let scaler = CoordinateScaler::new(50).unwrap();
        let scaled = scaler.scale(&make_screenshot(200, 100)).unwrap();
        let frame = encode_frame(&scaled).unwrap();

        assert_eq!(frame.media_type, "image/png");
        assert_eq!((frame.width, frame.height), (50, 25));
        assert!(frame.data_uri().starts_with("data:image/png;base64,"));

        let png = B64.decode(&frame.data_base64).unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 25));
    }
}
