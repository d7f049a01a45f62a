//! 액션 실행기.
//!
//! 네이티브 좌표 액션을 `InputDriver` 포트로 실행한다. 화면 밖 좌표는 거부하지 않고
//! 가장 가까운 유효 픽셀로 클램프하며, 드라이버 실패는 `ExecutionError`로 감싸 반환한다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use deskpilot_core::error::{CoreError, ExecutionError};
use deskpilot_core::models::action::{ExecutedAction, MouseButton, NativeAction, ProposedAction};
use deskpilot_core::ports::input_driver::{ButtonDirection, InputDriver};

use crate::keys::first_unknown_key;

/// 중단 신호와 경쟁하는 sleep
///
/// 중단 신호로 일찍 끝나면 `true`. 신호 송신자가 사라지면 끝까지 잔다.
pub async fn cancellable_sleep(duration: Duration, abort: Option<&watch::Receiver<bool>>) -> bool {
    let Some(abort) = abort else {
        tokio::time::sleep(duration).await;
        return false;
    };

    let mut abort = abort.clone();
    if *abort.borrow() {
        return true;
    }

    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    tokio::select! {
        _ = &mut sleep => false,
        signalled = async { abort.wait_for(|aborted| *aborted).await.is_ok() } => {
            if !signalled {
                sleep.await;
            }
            signalled
        }
    }
}

/// 액션 실행기
pub struct ActionExecutor {
    /// 입력 드라이버
    driver: Arc<dyn InputDriver>,
    /// `wait` 최대 대기
    max_wait: Duration,
    /// 중단 신호 (`wait` 조기 종료용)
    abort: Option<watch::Receiver<bool>>,
}

impl ActionExecutor {
    /// 새 실행기 생성
    pub fn new(driver: Arc<dyn InputDriver>, max_wait: Duration) -> Self {
        Self {
            driver,
            max_wait,
            abort: None,
        }
    }

    /// 중단 신호 연결
    pub fn with_abort_signal(mut self, abort: watch::Receiver<bool>) -> Self {
        self.abort = Some(abort);
        self
    }

    /// 드라이버 플랫폼 이름
    pub fn platform(&self) -> &str {
        self.driver.platform()
    }

    /// 네이티브 액션 1건 실행
    pub async fn execute(&self, native: &NativeAction) -> Result<ExecutedAction, ExecutionError> {
        let started = Instant::now();
        let clamped = native.needs_clamp();
        let action = native.clamped();

        if clamped {
            debug!(
                requested = %native.action.summary(),
                executed = %action.summary(),
                bounds = %format!("{}x{}", native.bounds.width, native.bounds.height),
                "화면 밖 좌표 클램프"
            );
        }

        self.dispatch(&action)
            .await
            .map_err(|cause| ExecutionError {
                action: native.clone(),
                cause,
            })?;

        Ok(ExecutedAction {
            native: action,
            clamped,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn dispatch(&self, action: &ProposedAction) -> Result<(), CoreError> {
        match action {
            ProposedAction::Click { x, y, button } => {
                self.driver.mouse_click(*button, *x, *y).await
            }
            ProposedAction::DoubleClick { x, y } => self.driver.mouse_double_click(*x, *y).await,
            ProposedAction::Type { text } => {
                if text.is_empty() {
                    return Ok(());
                }
                self.driver.type_text(text).await
            }
            ProposedAction::KeyCombo { keys } => {
                if keys.is_empty() {
                    debug!("빈 키 조합, 건너뜀");
                    return Ok(());
                }
                if let Some(unknown) = first_unknown_key(keys) {
                    return Err(CoreError::InvalidArguments(format!("알 수 없는 키: {unknown}")));
                }
                self.driver.hotkey(keys).await
            }
            ProposedAction::Scroll { x, y, dx, dy } => {
                self.driver.mouse_move(*x, *y).await?;
                self.driver.scroll(*dx, *dy).await
            }
            ProposedAction::Wait { seconds } => {
                self.wait(*seconds).await;
                Ok(())
            }
            ProposedAction::Drag { x0, y0, x1, y1 } => self.drag((*x0, *y0), (*x1, *y1)).await,
            ProposedAction::Move { x, y } => self.driver.mouse_move(*x, *y).await,
        }
    }

    async fn wait(&self, seconds: f64) {
        let requested = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(self.max_wait);
        let duration = requested.min(self.max_wait);
        if duration < requested {
            debug!(
                requested_secs = seconds,
                capped_secs = duration.as_secs_f64(),
                "wait 상한 적용"
            );
        }
        if cancellable_sleep(duration, self.abort.as_ref()).await {
            debug!("중단 신호로 wait 조기 종료");
        }
    }

    async fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<(), CoreError> {
        self.driver.mouse_move(from.0, from.1).await?;
        self.driver
            .mouse_button(MouseButton::Left, ButtonDirection::Press)
            .await?;

        let moved = self.driver.mouse_move(to.0, to.1).await;
        // 이동이 실패해도 버튼은 놓는다
        let released = self
            .driver
            .mouse_button(MouseButton::Left, ButtonDirection::Release)
            .await;

        if let Err(e) = &released {
            warn!("드래그 버튼 해제 실패: {e}");
        }
        moved?;
        released
    }
}
