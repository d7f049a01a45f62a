//! 실행 리포트 작성기.
//!
//! 턴 리포트를 모아두었다가 실행이 끝나면 `<output_dir>`에 기록한다.
//! - `run-<timestamp>.json`: 요약 + 전체 턴
//! - `run-<timestamp>.txt`: 사람이 읽는 요약
//! - `run-<timestamp>.csv`: 턴당 한 행

use std::fmt::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use deskpilot_core::config::ReportConfig;
use deskpilot_core::error::CoreError;
use deskpilot_core::models::action::ActionOutcome;
use deskpilot_core::models::run::{ConsentDecision, RunSummary, TurnReport};
use deskpilot_core::ports::reporter::RunReporter;

const RULE: &str = "============================================================";
const THIN_RULE: &str = "----------------------------------------";

const CSV_HEADER: [&str; 13] = [
    "turn",
    "screenshot_id",
    "native_width",
    "native_height",
    "viewport_width",
    "viewport_height",
    "factor",
    "consent",
    "proposed",
    "executed",
    "failed",
    "done",
    "message",
];

#[derive(Serialize)]
struct RunReportFile<'a> {
    summary: &'a RunSummary,
    turns: &'a [TurnReport],
}

/// 파일 리포터 (JSON / 텍스트 / CSV)
pub struct RunReportWriter {
    output_dir: PathBuf,
    json: bool,
    text: bool,
    csv: bool,
    turns: Mutex<Vec<TurnReport>>,
    written: Mutex<Vec<PathBuf>>,
}

impl RunReportWriter {
    /// 리포트 설정에 켜진 형식만 기록
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            json: config.write_json,
            text: config.write_text,
            csv: config.write_csv,
            turns: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
        }
    }

    /// 마지막 실행에서 기록한 파일 경로
    pub async fn written_paths(&self) -> Vec<PathBuf> {
        self.written.lock().await.clone()
    }

    fn file_stem(summary: &RunSummary) -> String {
        format!("run-{}", summary.started_at.format("%Y%m%d-%H%M%S%.3f"))
    }

    async fn write(&self, file_name: String, body: &[u8]) -> Result<PathBuf, CoreError> {
        let path = self.output_dir.join(file_name);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

#[async_trait]
impl RunReporter for RunReportWriter {
    async fn turn_completed(&self, report: &TurnReport) -> Result<(), CoreError> {
        self.turns.lock().await.push(report.clone());
        Ok(())
    }

    async fn run_finished(&self, summary: &RunSummary) -> Result<(), CoreError> {
        let turns = std::mem::take(&mut *self.turns.lock().await);
        let stem = Self::file_stem(summary);
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let mut written = Vec::new();
        if self.json {
            let body = serde_json::to_vec_pretty(&RunReportFile {
                summary,
                turns: &turns,
            })?;
            written.push(self.write(format!("{stem}.json"), &body).await?);
        }
        if self.text {
            let body = render_text(summary, &turns);
            written.push(self.write(format!("{stem}.txt"), body.as_bytes()).await?);
        }
        if self.csv {
            let body = render_csv(&turns);
            written.push(self.write(format!("{stem}.csv"), body.as_bytes()).await?);
        }

        info!(
            dir = %self.output_dir.display(),
            files = written.len(),
            turns = turns.len(),
            "실행 리포트 저장"
        );
        *self.written.lock().await = written;
        Ok(())
    }
}

fn consent_label(consent: ConsentDecision) -> &'static str {
    match consent {
        ConsentDecision::NotRequired => "not_required",
        ConsentDecision::AutoApproved => "auto_approved",
        ConsentDecision::Approved => "approved",
        ConsentDecision::Denied => "denied",
    }
}

fn failed_count(turn: &TurnReport) -> usize {
    turn.records
        .iter()
        .filter(|record| !record.outcome.is_success())
        .count()
}

/// 사람이 읽는 텍스트 리포트
fn render_text(summary: &RunSummary, turns: &[TurnReport]) -> String {
    let mut out = String::new();
    // String에 대한 write!는 실패하지 않는다
    let _ = writeln!(out, "{RULE}\nDESKPILOT Run Report\n{RULE}\n");

    let _ = writeln!(out, "RUN:");
    let _ = writeln!(out, "  Task: {}", summary.task);
    let _ = writeln!(out, "  Started: {}", summary.started_at.to_rfc3339());
    let _ = writeln!(out, "  Finished: {}", summary.finished_at.to_rfc3339());
    let _ = writeln!(
        out,
        "  Duration: {:.1} seconds\n",
        summary.elapsed_ms() as f64 / 1000.0
    );

    let _ = writeln!(out, "SUMMARY:");
    let result = if summary.status.is_done() {
        "SUCCESS"
    } else {
        "FAILED"
    };
    let _ = writeln!(out, "  Result: {result}");
    let _ = writeln!(out, "  Status: {}", summary.status);
    let _ = writeln!(out, "  Turns: {}", summary.turns_used);
    let _ = writeln!(
        out,
        "  Actions: {} executed, {} failed",
        summary.actions_executed, summary.actions_failed
    );
    if let Some(message) = &summary.final_message {
        let _ = writeln!(out, "  Final message: {message}");
    }
    out.push('\n');

    if !turns.is_empty() {
        let _ = writeln!(out, "TURN DETAILS:\n{THIN_RULE}");
        for turn in turns {
            let ok = turn.consent != ConsentDecision::Denied && failed_count(turn) == 0;
            let _ = writeln!(out, "Turn {} {}", turn.turn, if ok { "✓" } else { "✗" });
            let _ = writeln!(
                out,
                "  Screen: {}x{} -> {}x{} (factor {:.4})",
                turn.native.width,
                turn.native.height,
                turn.viewport.width,
                turn.viewport.height,
                turn.factor
            );
            let _ = writeln!(out, "  Consent: {}", consent_label(turn.consent));
            if let Some(message) = &turn.message {
                let _ = writeln!(out, "  Message: {message}");
            }
            let _ = writeln!(
                out,
                "  Actions: {} proposed, {} executed, {} failed",
                turn.proposed.len(),
                turn.records.len(),
                failed_count(turn)
            );
            for record in &turn.records {
                let outcome = match &record.outcome {
                    ActionOutcome::Succeeded => "ok".to_string(),
                    ActionOutcome::Failed { cause } => format!("failed: {cause}"),
                };
                let _ = writeln!(
                    out,
                    "    {}. {} -> {outcome}",
                    record.index + 1,
                    record.executed.summary()
                );
            }
            if turn.done {
                let _ = writeln!(out, "  Done: yes");
            }
            out.push('\n');
        }
    }

    let _ = write!(out, "{RULE}\nEnd of Report\n{RULE}\n");
    out
}

/// 쉼표, 쌍따옴표, 줄바꿈이 있으면 쌍따옴표로 감싼다
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// 턴당 한 행 CSV 리포트
fn render_csv(turns: &[TurnReport]) -> String {
    let mut csv = CSV_HEADER.join(",") + "\n";
    for turn in turns {
        let row = [
            turn.turn.to_string(),
            turn.screenshot_id.to_string(),
            turn.native.width.to_string(),
            turn.native.height.to_string(),
            turn.viewport.width.to_string(),
            turn.viewport.height.to_string(),
            format!("{:.6}", turn.factor),
            consent_label(turn.consent).to_string(),
            turn.proposed.len().to_string(),
            turn.records.len().to_string(),
            failed_count(turn).to_string(),
            turn.done.to_string(),
            csv_field(turn.message.as_deref().unwrap_or_default()),
        ];
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}
