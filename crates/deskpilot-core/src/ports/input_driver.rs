//! 입력 드라이버 포트.
//!
//! 마우스/키보드 조작을 위한 크로스 플랫폼 인터페이스를 정의한다.
//! 좌표는 모두 네이티브 화면 픽셀이다.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::action::MouseButton;

/// 버튼 누름/놓음 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonDirection {
    Press,
    Release,
}

/// 입력 드라이버 — 마우스/키보드 시뮬레이션 인터페이스
///
/// 구현체: `EnigoInputDriver` (실제 입력), `NoOpInputDriver` (드라이런/테스트용)
#[async_trait]
pub trait InputDriver: Send + Sync {
    /// 마우스 이동
    async fn mouse_move(&self, x: i32, y: i32) -> Result<(), CoreError>;

    /// 마우스 클릭 (이동 후 클릭)
    async fn mouse_click(&self, button: MouseButton, x: i32, y: i32) -> Result<(), CoreError>;

    /// 더블 클릭 (이동 후 왼쪽 버튼 두 번)
    async fn mouse_double_click(&self, x: i32, y: i32) -> Result<(), CoreError>;

    /// 현재 위치에서 버튼 누름/놓음 (드래그용)
    async fn mouse_button(
        &self,
        button: MouseButton,
        direction: ButtonDirection,
    ) -> Result<(), CoreError>;

    /// 휠 스크롤 (노치 단위, 양수 dy = 아래, 양수 dx = 오른쪽)
    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), CoreError>;

    /// 텍스트 입력
    async fn type_text(&self, text: &str) -> Result<(), CoreError>;

    /// 키 누름
    async fn key_press(&self, key: &str) -> Result<(), CoreError>;

    /// 키 놓음
    async fn key_release(&self, key: &str) -> Result<(), CoreError>;

    /// 단축키 (복합 키) — 순서대로 누르고 역순으로 놓는다
    async fn hotkey(&self, keys: &[String]) -> Result<(), CoreError>;

    /// 플랫폼 이름 (예: "macos", "windows", "linux")
    fn platform(&self) -> &str;
}
