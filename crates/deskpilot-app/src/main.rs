//! # deskpilot-app
//!
//! DESKPILOT 바이너리 진입점.
//! CLI 파싱, 설정 로드, 어댑터 와이어링, 라이프사이클 관리, 종료 코드 결정.

mod consent_prompt;
mod lifecycle;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use deskpilot_automation::executor::ActionExecutor;
use deskpilot_automation::input_driver::create_input_driver;
use deskpilot_automation::orchestrator::{AutoApprove, Orchestrator};
use deskpilot_automation::reporting::{CompositeReporter, TracingReporter};
use deskpilot_core::config::{AppConfig, ProviderType};
use deskpilot_core::config_manager::{apply_process_env_fallbacks, ConfigManager};
use deskpilot_core::models::run::{AbortReason, RunStatus};
use deskpilot_core::ports::consent::ConsentGate;
use deskpilot_core::ports::screen_capture::ScreenCapturer;
use deskpilot_network::vision_client::RemoteVisionModel;
use deskpilot_vision::archive::{ArchivingCapturer, ScreenshotArchive};
use deskpilot_vision::capture::XcapScreenCapturer;
use deskpilot_vision::scaler::CoordinateScaler;

use crate::consent_prompt::TerminalConsentPrompt;
use crate::lifecycle::LifecycleManager;
use crate::report::RunReportWriter;

/// 사용자 중단 종료 코드 (128 + SIGINT)
const EXIT_USER_ABORT: u8 = 130;

/// DESKPILOT 컴퓨터 사용 에이전트
///
/// 화면을 캡처해 비전 모델에 보내고, 모델이 제안한 마우스/키보드 액션을 실행한다.
#[derive(Parser, Debug)]
#[command(name = "deskpilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 수행할 작업 지시
    #[arg(long, short = 'i')]
    instructions: String,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// 동의 게이트 자동 승인
    #[arg(long)]
    autoplay: bool,

    /// 최대 턴 수
    #[arg(long)]
    max_turns: Option<u32>,

    /// 실행 전체 최대 액션 수
    #[arg(long)]
    max_actions: Option<u32>,

    /// 액션 사이 대기 (초)
    #[arg(long)]
    delay: Option<f64>,

    /// 모델에 보낼 이미지의 최대 변 길이 (픽셀)
    #[arg(long)]
    max_dimension: Option<u32>,

    /// 모델 제공자 (openai, anthropic, azure)
    #[arg(long)]
    provider: Option<String>,

    /// 모델 이름 (azure는 배포 이름)
    #[arg(long)]
    model: Option<String>,

    /// 실행 리포트 출력 디렉토리
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// 매 턴 캡처한 스크린샷을 PNG로 저장
    #[arg(long)]
    save_screenshots: bool,

    /// 스크린샷 저장 디렉토리 (지정하면 저장도 켠다)
    #[arg(long)]
    screenshot_dir: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 입력 시뮬레이션 없이 실행 (모델 호출은 수행)
    #[arg(long)]
    dry_run: bool,
}

/// CLI 값으로 설정 덮어쓰기
fn apply_overrides(config: &mut AppConfig, args: &Args) -> Result<()> {
    if args.autoplay {
        config.agent.autoplay = true;
    }
    if let Some(max_turns) = args.max_turns {
        config.agent.max_turns = max_turns;
    }
    if let Some(max_actions) = args.max_actions {
        config.agent.max_actions = max_actions;
    }
    if let Some(delay) = args.delay {
        if !delay.is_finite() || delay < 0.0 {
            bail!("--delay 값이 유효하지 않습니다: {delay}");
        }
        config.agent.action_delay_ms = (delay * 1000.0).round() as u64;
    }
    if let Some(max_dimension) = args.max_dimension {
        config.vision.max_dimension = max_dimension;
    }
    if let Some(provider) = &args.provider {
        let provider: ProviderType = provider.parse()?;
        if provider != config.model.provider_type {
            // 다른 제공자의 키는 쓸 수 없으므로 환경변수에서 다시 찾는다
            config.model.provider_type = provider;
            config.model.api_key.clear();
            apply_process_env_fallbacks(config);
        }
    }
    if let Some(model) = &args.model {
        config.model.model = model.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.report.output_dir = output_dir.clone();
    }
    if args.save_screenshots {
        config.report.save_screenshots = true;
    }
    if let Some(screenshot_dir) = &args.screenshot_dir {
        config.report.screenshot_dir = screenshot_dir.clone();
        config.report.save_screenshots = true;
    }
    Ok(())
}

/// 최종 상태 → 프로세스 종료 코드
fn exit_code(status: &RunStatus) -> u8 {
    match status {
        RunStatus::Done => 0,
        RunStatus::Aborted(AbortReason::UserAbort) => EXIT_USER_ABORT,
        RunStatus::Aborted(_) => 1,
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path)?,
        None => match ConfigManager::new() {
            Ok(manager) => manager,
            Err(e) => {
                warn!("설정 로드 실패, 기본 설정 사용: {e}");
                let mut config = AppConfig::default_config();
                apply_process_env_fallbacks(&mut config);
                return Ok(config);
            }
        },
    };
    info!("설정 파일: {}", manager.config_path().display());
    Ok(manager.into_config())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // RUST_LOG가 있으면 우선
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = load_config(&args)?;
    apply_overrides(&mut config, &args)?;
    config.validate().context("설정 검증 실패")?;

    info!(
        provider = config.model.provider_type.as_str(),
        model = %config.model.model,
        max_dimension = config.vision.max_dimension,
        dry_run = args.dry_run,
        "DESKPILOT 시작"
    );

    // ── 어댑터 ──
    let capturer: Arc<dyn ScreenCapturer> =
        Arc::new(XcapScreenCapturer::new(config.vision.monitor_index));
    let capturer: Arc<dyn ScreenCapturer> = if config.report.save_screenshots {
        info!(dir = %config.report.screenshot_dir.display(), "스크린샷 저장 활성화");
        Arc::new(ArchivingCapturer::new(
            capturer,
            ScreenshotArchive::new(&config.report.screenshot_dir),
        ))
    } else {
        capturer
    };
    let scaler = CoordinateScaler::new(config.vision.max_dimension)?;
    let model = Arc::new(RemoteVisionModel::new(&config.model)?);
    let driver = create_input_driver(args.dry_run)
        .map_err(|e| anyhow!("입력 드라이버 초기화 실패: {e}"))?;
    let executor = ActionExecutor::new(Arc::from(driver), config.executor.max_wait());

    let consent: Arc<dyn ConsentGate> = if config.agent.autoplay {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalConsentPrompt::new())
    };

    let report_writer = config
        .report
        .writes_files()
        .then(|| Arc::new(RunReportWriter::from_config(&config.report)));
    let mut reporter = CompositeReporter::new().with(Arc::new(TracingReporter));
    if let Some(writer) = &report_writer {
        reporter = reporter.with(writer.clone());
    }

    // ── 라이프사이클 ──
    let lifecycle = Arc::new(LifecycleManager::new());
    let abort_rx = lifecycle.subscribe();
    let signal_task = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move { lifecycle.wait_for_signal().await })
    };

    let orchestrator = Orchestrator::new(
        capturer,
        scaler,
        model,
        executor.with_abort_signal(abort_rx.clone()),
        consent,
        Arc::new(reporter),
        config.agent.clone(),
    )
    .with_abort_signal(abort_rx);

    let summary = orchestrator.run(&args.instructions).await;
    signal_task.abort();

    if let Some(message) = &summary.final_message {
        println!("{message}");
    }
    println!("{}", summary.status);
    if let Some(writer) = &report_writer {
        for path in writer.written_paths().await {
            info!("리포트: {}", path.display());
        }
    }

    let code = exit_code(&summary.status);
    if lifecycle.is_shutdown() {
        // 동의 프롬프트의 stdin 읽기가 남아 있으면 런타임 종료가 막히므로 바로 종료
        info!("중단 신호로 실행 종료");
        std::process::exit(i32::from(code));
    }
    Ok(ExitCode::from(code))
}
