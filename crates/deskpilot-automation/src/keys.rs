//! 키 이름 해석.
//!
//! 모델이 보낸 키 이름(`"ctrl"`, `"ArrowUp"`, `"s"` 등)을 플랫폼 독립 키로 변환한다.
//! 실행기는 키를 누르기 전에 전체 조합을 검증하므로, 알 수 없는 키가 섞이면 아무 키도 눌리지 않는다.

/// 이름 있는 특수 키
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKey {
    Return,
    Tab,
    Escape,
    Backspace,
    Delete,
    Space,
    Home,
    End,
    PageUp,
    PageDown,
    UpArrow,
    DownArrow,
    LeftArrow,
    RightArrow,
    Control,
    Shift,
    Alt,
    Meta,
    CapsLock,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

/// 해석된 키
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    Named(NamedKey),
    /// 단일 문자 키
    Char(char),
}

/// 문자열 → 키 매핑. 알 수 없는 이름이면 `None`
pub fn parse_key_name(key: &str) -> Option<KeyName> {
    let key = key.trim();
    let lower = key.to_lowercase();
    let named = match lower.as_str() {
        "enter" | "return" => NamedKey::Return,
        "tab" => NamedKey::Tab,
        "escape" | "esc" => NamedKey::Escape,
        "backspace" => NamedKey::Backspace,
        "delete" | "del" => NamedKey::Delete,
        "space" => NamedKey::Space,
        "home" => NamedKey::Home,
        "end" => NamedKey::End,
        "pageup" | "page_up" => NamedKey::PageUp,
        "pagedown" | "page_down" => NamedKey::PageDown,
        "up" | "uparrow" | "arrowup" => NamedKey::UpArrow,
        "down" | "downarrow" | "arrowdown" => NamedKey::DownArrow,
        "left" | "leftarrow" | "arrowleft" => NamedKey::LeftArrow,
        "right" | "rightarrow" | "arrowright" => NamedKey::RightArrow,
        "ctrl" | "control" => NamedKey::Control,
        "shift" => NamedKey::Shift,
        "alt" | "option" => NamedKey::Alt,
        "meta" | "command" | "cmd" | "super" | "win" | "windows" => NamedKey::Meta,
        "capslock" => NamedKey::CapsLock,
        "f1" => NamedKey::F1,
        "f2" => NamedKey::F2,
        "f3" => NamedKey::F3,
        "f4" => NamedKey::F4,
        "f5" => NamedKey::F5,
        "f6" => NamedKey::F6,
        "f7" => NamedKey::F7,
        "f8" => NamedKey::F8,
        "f9" => NamedKey::F9,
        "f10" => NamedKey::F10,
        "f11" => NamedKey::F11,
        "f12" => NamedKey::F12,
        _ => {
            // 단일 문자 → 문자 키 (대소문자 보존)
            let mut chars = key.chars();
            return match (chars.next(), chars.next()) {
                (Some(ch), None) => Some(KeyName::Char(ch)),
                _ => None,
            };
        }
    };
    Some(KeyName::Named(named))
}

/// 조합에서 처음 발견된 알 수 없는 키 이름
pub fn first_unknown_key(keys: &[String]) -> Option<&str> {
    keys.iter()
        .map(String::as_str)
        .find(|key| parse_key_name(key).is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_keys() {
        assert_eq!(
            parse_key_name("Enter"),
            Some(KeyName::Named(NamedKey::Return))
        );
        assert_eq!(
            parse_key_name("ArrowUp"),
            Some(KeyName::Named(NamedKey::UpArrow))
        );
        assert_eq!(
            parse_key_name("Command"),
            Some(KeyName::Named(NamedKey::Meta))
        );
        assert_eq!(parse_key_name("F12"), Some(KeyName::Named(NamedKey::F12)));
    }

    #[test]
    fn single_characters() {
        assert_eq!(parse_key_name("a"), Some(KeyName::Char('a')));
        assert_eq!(parse_key_name("S"), Some(KeyName::Char('S')));
        assert_eq!(parse_key_name("+"), Some(KeyName::Char('+')));
    }

    #[test]
    fn surrounding_whitespace_ignored() {
        assert_eq!(parse_key_name(" a "), Some(KeyName::Char('a')));
        assert_eq!(
            parse_key_name(" ctrl "),
            Some(KeyName::Named(NamedKey::Control))
        );
        assert_eq!(parse_key_name("  "), None);
    }

    #[test]
    fn unknown_keys() {
        assert_eq!(parse_key_name("hyper"), None);
        assert_eq!(parse_key_name(""), None);
        assert_eq!(
            first_unknown_key(&["ctrl".to_string(), "hyper".to_string()]),
            Some("hyper")
        );
        assert_eq!(first_unknown_key(&["ctrl".to_string(), "s".to_string()]), None);
    }
}
