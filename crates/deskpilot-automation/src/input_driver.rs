//! 입력 드라이버 구현.
//!
//! `NoOpInputDriver` (드라이런/테스트용)와 `EnigoInputDriver` (실제 입력, `enigo` feature)를 제공한다.

use async_trait::async_trait;
use tracing::{debug, warn};

use deskpilot_core::error::CoreError;
use deskpilot_core::models::action::MouseButton;
use deskpilot_core::ports::input_driver::{ButtonDirection, InputDriver};

// ============================================================
// NoOpInputDriver — 드라이런/테스트용
// ============================================================

/// No-Op 입력 드라이버 — 모든 입력을 로깅만 하고 실행하지 않음
///
/// `--dry-run`, 테스트, 시뮬레이션 모드에서 사용.
pub struct NoOpInputDriver;

#[async_trait]
impl InputDriver for NoOpInputDriver {
    async fn mouse_move(&self, x: i32, y: i32) -> Result<(), CoreError> {
        debug!(x, y, "[NoOp] 마우스 이동");
        Ok(())
    }

    async fn mouse_click(&self, button: MouseButton, x: i32, y: i32) -> Result<(), CoreError> {
        debug!(button = button.as_str(), x, y, "[NoOp] 마우스 클릭");
        Ok(())
    }

    async fn mouse_double_click(&self, x: i32, y: i32) -> Result<(), CoreError> {
        debug!(x, y, "[NoOp] 더블 클릭");
        Ok(())
    }

    async fn mouse_button(
        &self,
        button: MouseButton,
        direction: ButtonDirection,
    ) -> Result<(), CoreError> {
        debug!(button = button.as_str(), ?direction, "[NoOp] 마우스 버튼");
        Ok(())
    }

    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), CoreError> {
        debug!(dx, dy, "[NoOp] 스크롤");
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), CoreError> {
        debug!(text_len = text.len(), "[NoOp] 텍스트 입력");
        Ok(())
    }

    async fn key_press(&self, key: &str) -> Result<(), CoreError> {
        debug!(key, "[NoOp] 키 누름");
        Ok(())
    }

    async fn key_release(&self, key: &str) -> Result<(), CoreError> {
        debug!(key, "[NoOp] 키 놓음");
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), CoreError> {
        debug!(?keys, "[NoOp] 단축키 실행");
        Ok(())
    }

    fn platform(&self) -> &str {
        "noop"
    }
}

// ============================================================
// EnigoInputDriver — 실제 마우스/키보드 입력
// ============================================================

/// 실제 마우스/키보드 입력 드라이버 (enigo 기반)
///
/// macOS: Accessibility 권한 필요
/// Windows: UIAccess 또는 관리자 권한 필요
/// Linux: X11 또는 Wayland + uinput 권한 필요
#[cfg(feature = "enigo")]
pub struct EnigoInputDriver {
    /// enigo 인스턴스 (Send지만 !Sync → tokio::sync::Mutex 사용)
    enigo: tokio::sync::Mutex<enigo::Enigo>,
}

#[cfg(feature = "enigo")]
impl EnigoInputDriver {
    /// 새 EnigoInputDriver 생성
    pub fn new() -> Result<Self, CoreError> {
        let settings = enigo::Settings::default();
        let enigo = enigo::Enigo::new(&settings)
            .map_err(|e| CoreError::Input(format!("입력 드라이버 초기화 실패: {e}")))?;
        Ok(Self {
            enigo: tokio::sync::Mutex::new(enigo),
        })
    }

    /// 문자열 → enigo 키 매핑
    fn parse_key(key: &str) -> Result<enigo::Key, CoreError> {
        use crate::keys::{parse_key_name, KeyName, NamedKey};

        let parsed = parse_key_name(key)
            .ok_or_else(|| CoreError::InvalidArguments(format!("알 수 없는 키: {key}")))?;

        Ok(match parsed {
            KeyName::Char(ch) => enigo::Key::Unicode(ch),
            KeyName::Named(named) => match named {
                NamedKey::Return => enigo::Key::Return,
                NamedKey::Tab => enigo::Key::Tab,
                NamedKey::Escape => enigo::Key::Escape,
                NamedKey::Backspace => enigo::Key::Backspace,
                NamedKey::Delete => enigo::Key::Delete,
                NamedKey::Space => enigo::Key::Space,
                NamedKey::Home => enigo::Key::Home,
                NamedKey::End => enigo::Key::End,
                NamedKey::PageUp => enigo::Key::PageUp,
                NamedKey::PageDown => enigo::Key::PageDown,
                NamedKey::UpArrow => enigo::Key::UpArrow,
                NamedKey::DownArrow => enigo::Key::DownArrow,
                NamedKey::LeftArrow => enigo::Key::LeftArrow,
                NamedKey::RightArrow => enigo::Key::RightArrow,
                NamedKey::Control => enigo::Key::Control,
                NamedKey::Shift => enigo::Key::Shift,
                NamedKey::Alt => enigo::Key::Alt,
                NamedKey::Meta => enigo::Key::Meta,
                NamedKey::CapsLock => enigo::Key::CapsLock,
                NamedKey::F1 => enigo::Key::F1,
                NamedKey::F2 => enigo::Key::F2,
                NamedKey::F3 => enigo::Key::F3,
                NamedKey::F4 => enigo::Key::F4,
                NamedKey::F5 => enigo::Key::F5,
                NamedKey::F6 => enigo::Key::F6,
                NamedKey::F7 => enigo::Key::F7,
                NamedKey::F8 => enigo::Key::F8,
                NamedKey::F9 => enigo::Key::F9,
                NamedKey::F10 => enigo::Key::F10,
                NamedKey::F11 => enigo::Key::F11,
                NamedKey::F12 => enigo::Key::F12,
            },
        })
    }

    fn enigo_button(button: MouseButton) -> enigo::Button {
        match button {
            MouseButton::Left => enigo::Button::Left,
            MouseButton::Right => enigo::Button::Right,
            MouseButton::Middle => enigo::Button::Middle,
        }
    }
}

#[cfg(feature = "enigo")]
#[async_trait]
impl InputDriver for EnigoInputDriver {
    async fn mouse_move(&self, x: i32, y: i32) -> Result<(), CoreError> {
        use enigo::Mouse;
        debug!(x, y, "[Enigo] 마우스 이동");
        let mut enigo = self.enigo.lock().await;
        enigo
            .move_mouse(x, y, enigo::Coordinate::Abs)
            .map_err(|e| CoreError::Input(format!("마우스 이동 실패: {e}")))?;
        Ok(())
    }

    async fn mouse_click(&self, button: MouseButton, x: i32, y: i32) -> Result<(), CoreError> {
        use enigo::Mouse;
        debug!(button = button.as_str(), x, y, "[Enigo] 마우스 클릭");
        let mut enigo = self.enigo.lock().await;
        enigo
            .move_mouse(x, y, enigo::Coordinate::Abs)
            .map_err(|e| CoreError::Input(format!("마우스 이동 실패: {e}")))?;
        enigo
            .button(Self::enigo_button(button), enigo::Direction::Click)
            .map_err(|e| CoreError::Input(format!("마우스 클릭 실패: {e}")))?;
        Ok(())
    }

    async fn mouse_double_click(&self, x: i32, y: i32) -> Result<(), CoreError> {
        use enigo::Mouse;
        debug!(x, y, "[Enigo] 더블 클릭");
        let mut enigo = self.enigo.lock().await;
        enigo
            .move_mouse(x, y, enigo::Coordinate::Abs)
            .map_err(|e| CoreError::Input(format!("마우스 이동 실패: {e}")))?;
        for _ in 0..2 {
            enigo
                .button(enigo::Button::Left, enigo::Direction::Click)
                .map_err(|e| CoreError::Input(format!("더블 클릭 실패: {e}")))?;
        }
        Ok(())
    }

    async fn mouse_button(
        &self,
        button: MouseButton,
        direction: ButtonDirection,
    ) -> Result<(), CoreError> {
        use enigo::Mouse;
        debug!(button = button.as_str(), ?direction, "[Enigo] 마우스 버튼");
        let direction = match direction {
            ButtonDirection::Press => enigo::Direction::Press,
            ButtonDirection::Release => enigo::Direction::Release,
        };
        let mut enigo = self.enigo.lock().await;
        enigo
            .button(Self::enigo_button(button), direction)
            .map_err(|e| CoreError::Input(format!("마우스 버튼 실패: {e}")))?;
        Ok(())
    }

    async fn scroll(&self, dx: i32, dy: i32) -> Result<(), CoreError> {
        use enigo::Mouse;
        debug!(dx, dy, "[Enigo] 스크롤");
        let mut enigo = self.enigo.lock().await;
        if dy != 0 {
            enigo
                .scroll(dy, enigo::Axis::Vertical)
                .map_err(|e| CoreError::Input(format!("세로 스크롤 실패: {e}")))?;
        }
        if dx != 0 {
            enigo
                .scroll(dx, enigo::Axis::Horizontal)
                .map_err(|e| CoreError::Input(format!("가로 스크롤 실패: {e}")))?;
        }
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), CoreError> {
        use enigo::Keyboard;
        debug!(text_len = text.len(), "[Enigo] 텍스트 입력");
        let mut enigo = self.enigo.lock().await;
        enigo
            .text(text)
            .map_err(|e| CoreError::Input(format!("텍스트 입력 실패: {e}")))?;
        Ok(())
    }

    async fn key_press(&self, key: &str) -> Result<(), CoreError> {
        use enigo::Keyboard;
        debug!(key, "[Enigo] 키 누름");
        let parsed = Self::parse_key(key)?;
        let mut enigo = self.enigo.lock().await;
        enigo
            .key(parsed, enigo::Direction::Press)
            .map_err(|e| CoreError::Input(format!("키 누름 실패: {e}")))?;
        Ok(())
    }

    async fn key_release(&self, key: &str) -> Result<(), CoreError> {
        use enigo::Keyboard;
        debug!(key, "[Enigo] 키 놓음");
        let parsed = Self::parse_key(key)?;
        let mut enigo = self.enigo.lock().await;
        enigo
            .key(parsed, enigo::Direction::Release)
            .map_err(|e| CoreError::Input(format!("키 놓음 실패: {e}")))?;
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), CoreError> {
        use enigo::Keyboard;
        debug!(?keys, "[Enigo] 단축키 실행");
        // 누르기 전에 전체 조합 해석
        let parsed = keys
            .iter()
            .map(|k| Self::parse_key(k))
            .collect::<Result<Vec<_>, _>>()?;

        let mut enigo = self.enigo.lock().await;
        press_chord(&parsed, |key, direction| {
            let (direction, label) = match direction {
                ButtonDirection::Press => (enigo::Direction::Press, "Press"),
                ButtonDirection::Release => (enigo::Direction::Release, "Release"),
            };
            enigo
                .key(key, direction)
                .map_err(|e| CoreError::Input(format!("단축키 {label} 실패: {e}")))
        })
    }

    fn platform(&self) -> &str {
        #[cfg(target_os = "macos")]
        {
            "macos"
        }
        #[cfg(target_os = "windows")]
        {
            "windows"
        }
        #[cfg(target_os = "linux")]
        {
            "linux"
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        {
            "unknown"
        }
    }
}

// ============================================================
// 조합 키
// ============================================================

/// 조합 키를 순서대로 누르고 역순으로 놓는다.
///
/// 누르다 실패하면 이미 누른 키만 역순으로 놓고 그 에러를 반환한다.
/// 놓기가 실패해도 나머지 키는 계속 놓는다. 반환 에러는 처음 발생한 것.
#[cfg_attr(not(feature = "enigo"), allow(dead_code))]
pub(crate) fn press_chord<K: Copy>(
    keys: &[K],
    mut send: impl FnMut(K, ButtonDirection) -> Result<(), CoreError>,
) -> Result<(), CoreError> {
    let mut pressed = 0;
    let mut first_error = None;

    for key in keys {
        match send(*key, ButtonDirection::Press) {
            Ok(()) => pressed += 1,
            Err(e) => {
                first_error = Some(e);
                break;
            }
        }
    }

    for key in keys[..pressed].iter().rev() {
        if let Err(e) = send(*key, ButtonDirection::Release) {
            warn!("조합 키 놓기 실패: {e}");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// 플랫폼별 입력 드라이버 생성 팩토리
///
/// `dry_run`이면 NoOp 드라이버, 아니면 enigo 드라이버를 반환한다.
/// `enigo` feature 없이 빌드된 경우 실제 입력을 낼 수 없으므로 에러를 반환한다.
pub fn create_input_driver(dry_run: bool) -> Result<Box<dyn InputDriver>, CoreError> {
    if dry_run {
        tracing::info!("드라이런 모드: NoOp 입력 드라이버 사용");
        return Ok(Box::new(NoOpInputDriver));
    }

    #[cfg(feature = "enigo")]
    {
        let driver = EnigoInputDriver::new()?;
        tracing::info!(platform = driver.platform(), "실제 입력 드라이버 (enigo) 초기화 완료");
        Ok(Box::new(driver))
    }

    #[cfg(not(feature = "enigo"))]
    {
        Err(CoreError::Config(
            "enigo feature 없이 빌드되어 실제 입력을 실행할 수 없습니다 (--dry-run 사용 또는 enigo feature로 빌드)"
                .to_string(),
        ))
    }
}

// ============================================================
// 테스트
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_driver_all_methods_ok() {
        let driver = NoOpInputDriver;
        assert!(driver.mouse_move(100, 200).await.is_ok());
        assert!(driver
            .mouse_click(MouseButton::Left, 100, 200)
            .await
            .is_ok());
        assert!(driver.mouse_double_click(10, 20).await.is_ok());
        assert!(driver
            .mouse_button(MouseButton::Left, ButtonDirection::Press)
            .await
            .is_ok());
        assert!(driver.scroll(0, -3).await.is_ok());
        assert!(driver.type_text("hello").await.is_ok());
        assert!(driver.key_press("Enter").await.is_ok());
        assert!(driver.key_release("Enter").await.is_ok());
        assert!(driver
            .hotkey(&["Ctrl".to_string(), "S".to_string()])
            .await
            .is_ok());
    }

    #[test]
    fn noop_driver_platform() {
        assert_eq!(NoOpInputDriver.platform(), "noop");
    }

    #[test]
    fn dry_run_factory_is_noop() {
        let driver = create_input_driver(true).unwrap();
        assert_eq!(driver.platform(), "noop");
    }

    #[cfg(not(feature = "enigo"))]
    #[test]
    fn real_driver_without_enigo_is_error() {
        assert!(matches!(
            create_input_driver(false),
            Err(CoreError::Config(_))
        ));
    }

    /// 키 이벤트를 기록하고 지정한 이벤트에서 실패하는 가짜 키보드
    struct FakeKeyboard {
        events: Vec<(char, ButtonDirection)>,
        fail_on: Vec<(char, ButtonDirection)>,
    }

    impl FakeKeyboard {
        fn failing_on(fail_on: &[(char, ButtonDirection)]) -> Self {
            Self {
                events: Vec::new(),
                fail_on: fail_on.to_vec(),
            }
        }

        fn send(&mut self, key: char, direction: ButtonDirection) -> Result<(), CoreError> {
            if self.fail_on.contains(&(key, direction)) {
                return Err(CoreError::Input(format!("{key} {direction:?} 실패")));
            }
            self.events.push((key, direction));
            Ok(())
        }
    }

    use deskpilot_core::ports::input_driver::ButtonDirection::{Press, Release};

    #[test]
    fn chord_presses_then_releases_in_reverse() {
        let mut keyboard = FakeKeyboard::failing_on(&[]);
        press_chord(&['c', 's', 'x'], |k, d| keyboard.send(k, d)).unwrap();
        assert_eq!(
            keyboard.events,
            vec![
                ('c', Press),
                ('s', Press),
                ('x', Press),
                ('x', Release),
                ('s', Release),
                ('c', Release),
            ]
        );
    }

    #[test]
    fn chord_press_failure_releases_held_keys() {
        let mut keyboard = FakeKeyboard::failing_on(&[('s', Press)]);
        let err = press_chord(&['c', 's', 'x'], |k, d| keyboard.send(k, d)).unwrap_err();

        assert!(err.to_string().contains("s Press"));
        // x는 눌리지 않았고, c는 놓였다
        assert_eq!(keyboard.events, vec![('c', Press), ('c', Release)]);
    }

    #[test]
    fn chord_release_failure_still_releases_rest() {
        let mut keyboard = FakeKeyboard::failing_on(&[('x', Release)]);
        let err = press_chord(&['c', 's', 'x'], |k, d| keyboard.send(k, d)).unwrap_err();

        assert!(err.to_string().contains("x Release"));
        assert_eq!(
            keyboard.events,
            vec![
                ('c', Press),
                ('s', Press),
                ('x', Press),
                ('s', Release),
                ('c', Release),
            ]
        );
    }

    #[cfg(feature = "enigo")]
    #[test]
    fn enigo_parse_key_special_keys() {
        assert!(matches!(
            EnigoInputDriver::parse_key("Enter"),
            Ok(enigo::Key::Return)
        ));
        assert!(matches!(
            EnigoInputDriver::parse_key("arrowdown"),
            Ok(enigo::Key::DownArrow)
        ));
        assert!(matches!(
            EnigoInputDriver::parse_key("Command"),
            Ok(enigo::Key::Meta)
        ));
        assert!(matches!(
            EnigoInputDriver::parse_key("a"),
            Ok(enigo::Key::Unicode('a'))
        ));
    }

    #[cfg(feature = "enigo")]
    #[test]
    fn enigo_parse_key_unknown() {
        assert!(matches!(
            EnigoInputDriver::parse_key("hyper"),
            Err(CoreError::InvalidArguments(_))
        ));
    }
}
