//! UI 액션 모델.
//!
//! 모델이 제안한 액션(뷰포트 좌표)과 실행용 네이티브 액션, 실행 기록을 정의한다.
//! 액션 종류는 닫힌 enum이며 실행기는 exhaustive match로 분기한다.

use serde::{Deserialize, Serialize};

/// 마우스 버튼 유형
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    #[serde(alias = "wheel")]
    Middle,
}

impl MouseButton {
    /// 로그/리포트용 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

/// 모델이 제안한 액션 — 좌표는 뷰포트 공간
///
/// JSON 표현: `{"type": "click", "x": 10, "y": 20, "button": "left"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedAction {
    /// 단일 클릭
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
    },
    /// 더블 클릭 (왼쪽 버튼)
    DoubleClick { x: i32, y: i32 },
    /// 텍스트 입력
    Type { text: String },
    /// 복합 키 — 순서대로 누르고 역순으로 놓는다
    #[serde(alias = "keypress")]
    KeyCombo { keys: Vec<String> },
    /// 휠 스크롤 (단위: 노치)
    Scroll {
        x: i32,
        y: i32,
        #[serde(default)]
        dx: i32,
        #[serde(default)]
        dy: i32,
    },
    /// 대기 (초)
    Wait {
        #[serde(default = "default_wait_seconds")]
        seconds: f64,
    },
    /// 드래그 — (x0,y0)에서 누르고 (x1,y1)에서 놓는다
    Drag { x0: i32, y0: i32, x1: i32, y1: i32 },
    /// 포인터 이동만
    Move { x: i32, y: i32 },
}

fn default_wait_seconds() -> f64 {
    1.0
}

impl ProposedAction {
    /// 액션 종류 이름 (JSON `type` 값과 동일)
    pub fn kind(&self) -> &'static str {
        match self {
            ProposedAction::Click { .. } => "click",
            ProposedAction::DoubleClick { .. } => "double_click",
            ProposedAction::Type { .. } => "type",
            ProposedAction::KeyCombo { .. } => "key_combo",
            ProposedAction::Scroll { .. } => "scroll",
            ProposedAction::Wait { .. } => "wait",
            ProposedAction::Drag { .. } => "drag",
            ProposedAction::Move { .. } => "move",
        }
    }

    /// 모든 좌표에 같은 변환을 적용한 새 액션 반환
    pub fn map_points<F>(&self, f: F) -> ProposedAction
    where
        F: Fn(i32, i32) -> (i32, i32),
    {
        match self {
            ProposedAction::Click { x, y, button } => {
                let (x, y) = f(*x, *y);
                ProposedAction::Click {
                    x,
                    y,
                    button: *button,
                }
            }
            ProposedAction::DoubleClick { x, y } => {
                let (x, y) = f(*x, *y);
                ProposedAction::DoubleClick { x, y }
            }
            ProposedAction::Scroll { x, y, dx, dy } => {
                let (x, y) = f(*x, *y);
                ProposedAction::Scroll {
                    x,
                    y,
                    dx: *dx,
                    dy: *dy,
                }
            }
            ProposedAction::Drag { x0, y0, x1, y1 } => {
                let (x0, y0) = f(*x0, *y0);
                let (x1, y1) = f(*x1, *y1);
                ProposedAction::Drag { x0, y0, x1, y1 }
            }
            ProposedAction::Move { x, y } => {
                let (x, y) = f(*x, *y);
                ProposedAction::Move { x, y }
            }
            ProposedAction::Type { .. }
            | ProposedAction::KeyCombo { .. }
            | ProposedAction::Wait { .. } => self.clone(),
        }
    }

    /// 액션이 참조하는 좌표 목록
    pub fn points(&self) -> Vec<(i32, i32)> {
        match self {
            ProposedAction::Click { x, y, .. }
            | ProposedAction::DoubleClick { x, y }
            | ProposedAction::Scroll { x, y, .. }
            | ProposedAction::Move { x, y } => vec![(*x, *y)],
            ProposedAction::Drag { x0, y0, x1, y1 } => vec![(*x0, *y0), (*x1, *y1)],
            ProposedAction::Type { .. }
            | ProposedAction::KeyCombo { .. }
            | ProposedAction::Wait { .. } => Vec::new(),
        }
    }

    /// 로그용 한 줄 요약 (입력 텍스트는 길이만 노출)
    pub fn summary(&self) -> String {
        match self {
            ProposedAction::Click { x, y, button } => {
                format!("click {} ({x}, {y})", button.as_str())
            }
            ProposedAction::DoubleClick { x, y } => format!("double_click ({x}, {y})"),
            ProposedAction::Type { text } => format!("type {} chars", text.chars().count()),
            ProposedAction::KeyCombo { keys } => format!("key_combo {}", keys.join("+")),
            ProposedAction::Scroll { x, y, dx, dy } => {
                format!("scroll ({x}, {y}) by ({dx}, {dy})")
            }
            ProposedAction::Wait { seconds } => format!("wait {seconds:.2}s"),
            ProposedAction::Drag { x0, y0, x1, y1 } => {
                format!("drag ({x0}, {y0}) -> ({x1}, {y1})")
            }
            ProposedAction::Move { x, y } => format!("move ({x}, {y})"),
        }
    }
}

/// 화면 크기 (픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenBounds {
    pub width: u32,
    pub height: u32,
}

impl ScreenBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 가장 가까운 유효 픽셀로 고정 — `[0, w-1] × [0, h-1]`
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        let max_x = self.width.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_y = self.height.saturating_sub(1).min(i32::MAX as u32) as i32;
        (x.clamp(0, max_x), y.clamp(0, max_y))
    }

    /// 좌표가 화면 안에 있는지
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.clamp(x, y) == (x, y)
    }
}

/// 네이티브 좌표로 변환된 액션 + 변환 기준 화면 크기
///
/// `CoordinateMapping::remap`으로만 만들어지며, 실행기는 이 타입만 받는다.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeAction {
    /// 네이티브 좌표 액션 (클램프 전)
    pub action: ProposedAction,
    /// 변환 기준 네이티브 화면 크기
    pub bounds: ScreenBounds,
}

impl NativeAction {
    pub fn new(action: ProposedAction, bounds: ScreenBounds) -> Self {
        Self { action, bounds }
    }

    /// 화면 밖 좌표를 클램프한 실행용 액션
    pub fn clamped(&self) -> ProposedAction {
        self.action.map_points(|x, y| self.bounds.clamp(x, y))
    }

    /// 클램프가 필요한 좌표가 있는지
    pub fn needs_clamp(&self) -> bool {
        self.action
            .points()
            .iter()
            .any(|&(x, y)| !self.bounds.contains(x, y))
    }
}

/// 실행 완료된 액션 (실행기 반환값)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    /// 실제 전송된 네이티브 액션 (클램프 후)
    pub native: ProposedAction,
    /// 클램프 적용 여부
    pub clamped: bool,
    /// 실행 시간 (밀리초)
    pub elapsed_ms: u64,
}

/// 액션 실행 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Succeeded,
    Failed { cause: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded)
    }
}

/// 턴 안에서 실행된 액션 1건의 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// 턴 번호 (1부터)
    pub turn: u32,
    /// 배치 내 인덱스 (0부터)
    pub index: usize,
    /// 모델이 제안한 액션 (뷰포트 좌표)
    pub proposed: ProposedAction,
    /// 실제 실행된 액션 (네이티브 좌표, 클램프 후)
    pub executed: ProposedAction,
    /// 실행 결과
    pub outcome: ActionOutcome,
}
