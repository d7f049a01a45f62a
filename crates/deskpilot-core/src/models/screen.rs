//! 스크린샷 / 스케일 이미지 / 좌표 매핑 모델.
//!
//! 뷰포트 공간(모델이 본 축소 이미지)과 네이티브 공간(실제 화면 픽셀) 사이의
//! 변환 규칙을 한 곳에 모아둔다. 매핑은 스크린샷마다 새로 계산되며,
//! 다른 스크린샷에 적용하려 하면 `StaleScale` 에러가 난다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::action::{NativeAction, ProposedAction, ScreenBounds};

/// 캡처된 전체 화면 — 턴마다 새로 만들어지고 이후 변경되지 않는다
#[derive(Clone)]
pub struct Screenshot {
    /// 스크린샷 고유 ID
    pub id: Uuid,
    /// 네이티브 너비 (픽셀)
    pub width: u32,
    /// 네이티브 높이 (픽셀)
    pub height: u32,
    /// RGBA8 픽셀 버퍼 (`width * height * 4` 바이트)
    pub rgba: Vec<u8>,
    /// 캡처 시각
    pub captured_at: DateTime<Utc>,
}

impl Screenshot {
    /// RGBA 버퍼로 스크린샷 생성 — 크기와 버퍼 길이를 검증한다
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::Capture(format!(
                "화면 크기가 0입니다: {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(CoreError::Capture(format!(
                "RGBA 버퍼 길이 불일치: {} (예상 {expected})",
                rgba.len()
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            width,
            height,
            rgba,
            captured_at: Utc::now(),
        })
    }

    /// 네이티브 화면 크기
    pub fn bounds(&self) -> ScreenBounds {
        ScreenBounds::new(self.width, self.height)
    }
}

impl fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screenshot")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rgba_len", &self.rgba.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// 뷰포트 ↔ 네이티브 좌표 매핑
///
/// 두 축에 같은 배율을 쓰며 레터박스는 없다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateMapping {
    /// 뷰포트 / 네이티브 배율 (0 < factor <= 1)
    pub factor: f64,
    /// 원본 네이티브 너비
    pub native_width: u32,
    /// 원본 네이티브 높이
    pub native_height: u32,
    /// 스케일된 뷰포트 너비
    pub viewport_width: u32,
    /// 스케일된 뷰포트 높이
    pub viewport_height: u32,
    /// 매핑이 계산된 스크린샷 ID
    pub source_id: Uuid,
}

impl CoordinateMapping {
    /// 네이티브 크기와 최대 변 길이로 매핑 계산
    ///
    /// 긴 변은 정확히 `max_dimension`이 되고, 짧은 변은 정수 반올림 후 `[1, max_dimension]`으로 고정된다.
    /// 내림이 아니라 반올림이다: 2400x1600 → 1024x683.
    /// 긴 변이 이미 `max_dimension` 이하면 배율 1 (확대하지 않음).
    pub fn compute(
        source_id: Uuid,
        native_width: u32,
        native_height: u32,
        max_dimension: u32,
    ) -> Result<Self, CoreError> {
        if max_dimension == 0 {
            return Err(CoreError::Config(
                "max_dimension은 0보다 커야 합니다".to_string(),
            ));
        }
        if native_width == 0 || native_height == 0 {
            return Err(CoreError::Validation {
                field: "screenshot".to_string(),
                message: format!("크기가 0입니다: {native_width}x{native_height}"),
            });
        }

        let long = native_width.max(native_height);
        if long <= max_dimension {
            return Ok(Self {
                factor: 1.0,
                native_width,
                native_height,
                viewport_width: native_width,
                viewport_height: native_height,
                source_id,
            });
        }

        let scale_edge = |edge: u32| -> u32 {
            if edge == long {
                return max_dimension;
            }
            let long = u64::from(long);
            let scaled = (u64::from(edge) * u64::from(max_dimension) + long / 2) / long;
            (scaled as u32).clamp(1, max_dimension)
        };

        Ok(Self {
            factor: f64::from(max_dimension) / f64::from(long),
            native_width,
            native_height,
            viewport_width: scale_edge(native_width),
            viewport_height: scale_edge(native_height),
            source_id,
        })
    }

    /// 네이티브 화면 크기
    pub fn native_bounds(&self) -> ScreenBounds {
        ScreenBounds::new(self.native_width, self.native_height)
    }

    /// 뷰포트 크기
    pub fn viewport_bounds(&self) -> ScreenBounds {
        ScreenBounds::new(self.viewport_width, self.viewport_height)
    }

    /// 뷰포트 → 네이티브: `round(p / factor)`
    pub fn to_native(&self, x: i32, y: i32) -> (i32, i32) {
        (
            round_to_i32(f64::from(x) / self.factor),
            round_to_i32(f64::from(y) / self.factor),
        )
    }

    /// 네이티브 → 뷰포트: `round(p * factor)`
    pub fn to_viewport(&self, x: i32, y: i32) -> (i32, i32) {
        (
            round_to_i32(f64::from(x) * self.factor),
            round_to_i32(f64::from(y) * self.factor),
        )
    }

    /// 이 매핑이 주어진 스크린샷에서 계산된 것인지
    pub fn is_fresh_for(&self, screenshot: &Screenshot) -> bool {
        self.source_id == screenshot.id
            && self.native_width == screenshot.width
            && self.native_height == screenshot.height
            && self.factor.is_finite()
            && self.factor > 0.0
    }

    /// 제안 액션을 네이티브 액션으로 변환
    ///
    /// 매핑이 다른 스크린샷의 것이거나 배율이 유효하지 않으면 `StaleScale`.
    pub fn remap(
        &self,
        action: &ProposedAction,
        screenshot: &Screenshot,
    ) -> Result<NativeAction, CoreError> {
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(CoreError::StaleScale(format!(
                "유효하지 않은 배율: {}",
                self.factor
            )));
        }
        if self.source_id != screenshot.id {
            return Err(CoreError::StaleScale(format!(
                "매핑 source_id {} ≠ 스크린샷 {}",
                self.source_id, screenshot.id
            )));
        }
        if self.native_width != screenshot.width || self.native_height != screenshot.height {
            return Err(CoreError::StaleScale(format!(
                "매핑 크기 {}x{} ≠ 스크린샷 {}x{}",
                self.native_width, self.native_height, screenshot.width, screenshot.height
            )));
        }

        let native = action.map_points(|x, y| self.to_native(x, y));
        Ok(NativeAction::new(native, screenshot.bounds()))
    }
}

fn round_to_i32(value: f64) -> i32 {
    value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// 모델에 보낼 축소 이미지
#[derive(Clone)]
pub struct ScaledImage {
    /// 원본 스크린샷 ID
    pub source_id: Uuid,
    /// 뷰포트 너비
    pub width: u32,
    /// 뷰포트 높이
    pub height: u32,
    /// RGBA8 픽셀 버퍼
    pub rgba: Vec<u8>,
    /// 이 이미지의 좌표 매핑
    pub mapping: CoordinateMapping,
}

impl fmt::Debug for ScaledImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaledImage")
            .field("source_id", &self.source_id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rgba_len", &self.rgba.len())
            .field("mapping", &self.mapping)
            .finish()
    }
}

/// 모델 요청에 실리는 인코딩된 프레임 (base64 PNG)
#[derive(Clone, Serialize, Deserialize)]
pub struct EncodedFrame {
    /// 원본 스크린샷 ID
    pub source_id: Uuid,
    /// 뷰포트 너비
    pub width: u32,
    /// 뷰포트 높이
    pub height: u32,
    /// MIME 타입 (`image/png`)
    pub media_type: String,
    /// base64 인코딩 데이터
    pub data_base64: String,
}

impl EncodedFrame {
    /// `data:` URI 형식
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data_base64)
    }
}

impl fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedFrame")
            .field("source_id", &self.source_id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("media_type", &self.media_type)
            .field("data_len", &self.data_base64.len())
            .finish()
    }
}
