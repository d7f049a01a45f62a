//! 애플리케이션 설정 구조체.
//!
//! 루프 예산, 스케일, 실행기, 모델 연결, 리포트 설정을 정의한다.
//! `config` crate를 통해 파일/환경변수에서 로드 (`config_manager` 참조).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 대화 루프 / 오케스트레이터 설정
    #[serde(default)]
    pub agent: AgentConfig,
    /// 캡처 / 스케일 설정
    #[serde(default)]
    pub vision: VisionConfig,
    /// 액션 실행기 설정
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// 호스팅 비전 모델 설정
    #[serde(default)]
    pub model: ModelConfig,
    /// 실행 리포트 설정
    #[serde(default)]
    pub report: ReportConfig,
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self::default()
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.vision.max_dimension == 0 {
            return Err(invalid("vision.max_dimension", "0보다 커야 합니다"));
        }
        if self.agent.max_turns == 0 {
            return Err(invalid("agent.max_turns", "0보다 커야 합니다"));
        }
        if self.agent.decode_retry_budget == 0 {
            return Err(invalid("agent.decode_retry_budget", "0보다 커야 합니다"));
        }
        if self.model.model.trim().is_empty() {
            return Err(invalid("model.model", "모델 이름이 비어 있습니다"));
        }
        if self.model.provider_type == ProviderType::Azure
            && self.model.endpoint.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            return Err(invalid(
                "model.endpoint",
                "azure 제공자는 엔드포인트가 필요합니다 (AZURE_OPENAI_ENDPOINT)",
            ));
        }
        if self.model.api_key.trim().is_empty() {
            return Err(invalid(
                "model.api_key",
                "API 키 미설정 (설정 파일 또는 환경변수로 지정하세요)",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

// ============================================================
// 대화 루프 설정
// ============================================================

/// 대화 루프 / 오케스트레이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 최대 턴 수
    pub max_turns: u32,
    /// 실행 전체 최대 액션 수
    pub max_actions: u32,
    /// 같은 프레임에 대한 최대 디코딩 시도 횟수
    pub decode_retry_budget: u32,
    /// 동의 게이트 자동 승인
    pub autoplay: bool,
    /// 액션 실패 시 실행 중단
    pub stop_on_error: bool,
    /// 액션 사이 대기 (밀리초)
    pub action_delay_ms: u64,
    /// 동의 거부 후 계속 진행 (거부 사실을 모델에 전달)
    pub continue_on_consent_denial: bool,
    /// 모델에 재전송할 최근 턴 수
    pub history_turns: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 30,
            max_actions: 50,
            decode_retry_budget: 3,
            autoplay: false,
            stop_on_error: true,
            action_delay_ms: 2000,
            continue_on_consent_denial: false,
            history_turns: 10,
        }
    }
}

impl AgentConfig {
    /// 액션 사이 대기 시간
    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }
}

// ============================================================
// 비전 설정
// ============================================================

/// 캡처 / 스케일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// 모델에 보낼 이미지의 최대 변 길이 (픽셀)
    pub max_dimension: u32,
    /// 캡처할 모니터 인덱스 (없으면 주 모니터)
    pub monitor_index: Option<usize>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            monitor_index: None,
        }
    }
}

// ============================================================
// 실행기 설정
// ============================================================

/// 액션 실행기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// `wait` 액션 최대 대기 (초)
    pub max_wait_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_wait_secs: 60 }
    }
}

impl ExecutorConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

// ============================================================
// 모델 설정
// ============================================================

/// 비전 모델 제공자 타입 — 요청/응답 형식 및 인증 헤더 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI Chat Completions — `Authorization: Bearer` 헤더
    #[default]
    OpenAi,
    /// Anthropic Messages — `x-api-key` 헤더 + `/v1/messages`
    Anthropic,
    /// Azure OpenAI — `api-key` 헤더 + `api-version` 쿼리
    Azure,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Azure => "azure",
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAi),
            "anthropic" | "claude" => Ok(ProviderType::Anthropic),
            "azure" | "azure-openai" => Ok(ProviderType::Azure),
            other => Err(CoreError::InvalidArguments(format!(
                "알 수 없는 제공자: {other} (openai | anthropic | azure)"
            ))),
        }
    }
}

/// 호스팅 비전 모델 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// 제공자 타입
    pub provider_type: ProviderType,
    /// 엔드포인트 — openai/anthropic은 전체 URL(없으면 공식 URL), azure는 리소스 URL
    pub endpoint: Option<String>,
    /// API 키
    pub api_key: String,
    /// 모델 (azure는 배포) 이름
    pub model: String,
    /// Azure API 버전
    pub api_version: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 일시적 실패 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간격 (밀리초, 서버 retry-after가 있으면 그 값 사용)
    pub retry_delay_ms: u64,
    /// 응답 최대 토큰
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::OpenAi,
            endpoint: None,
            api_key: String::new(),
            model: "computer-use-preview".to_string(),
            api_version: "2025-03-01-preview".to_string(),
            timeout_secs: 60,
            max_retries: 3,
            retry_delay_ms: 1000,
            max_tokens: 1024,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ============================================================
// 리포트 설정
// ============================================================

/// 실행 리포트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 리포트 출력 디렉토리
    pub output_dir: PathBuf,
    /// JSON 리포트 파일 작성 여부
    pub write_json: bool,
    /// 사람이 읽는 텍스트 리포트 작성 여부
    pub write_text: bool,
    /// 턴별 CSV 리포트 작성 여부
    pub write_csv: bool,
    /// 캡처한 스크린샷을 PNG로 저장할지 여부
    pub save_screenshots: bool,
    /// 스크린샷 저장 디렉토리
    pub screenshot_dir: PathBuf,
}

impl ReportConfig {
    /// 파일 리포트를 하나라도 쓰는지
    pub fn writes_files(&self) -> bool {
        self.write_json || self.write_text || self.write_csv
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("logs"),
            write_json: true,
            write_text: true,
            write_csv: true,
            save_screenshots: false,
            screenshot_dir: PathBuf::from("logs/screenshots"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        let mut config = AppConfig::default_config();
        config.model.api_key = "sk-test".to_string();
        config
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{"agent": {"max_turns": 5}, "model": {"provider_type": "anthropic"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.agent.max_turns, 5);
        assert_eq!(config.agent.max_actions, 50);
        assert_eq!(config.agent.history_turns, 10);
        assert_eq!(config.model.provider_type, ProviderType::Anthropic);
        assert_eq!(config.model.model, "computer-use-preview");
        assert_eq!(config.executor.max_wait_secs, 60);
        assert_eq!(config.report.output_dir, PathBuf::from("logs"));
    }

    #[test]
    fn report_defaults_and_overrides() {
        let defaults = ReportConfig::default();
        assert!(defaults.write_json && defaults.write_text && defaults.write_csv);
        assert!(!defaults.save_screenshots);
        assert_eq!(defaults.screenshot_dir, PathBuf::from("logs/screenshots"));

        let json = r#"{"report": {"write_json": false, "write_text": false, "write_csv": false, "save_screenshots": true, "screenshot_dir": "/tmp/shots"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!(!config.report.writes_files());
        assert!(config.report.save_screenshots);
        assert_eq!(config.report.screenshot_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.report.output_dir, PathBuf::from("logs"));
    }

    #[test]
    fn validate_accepts_defaults_with_key() {
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = configured();
        config.vision.max_dimension = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::Validation { ref field, .. }) if field == "vision.max_dimension"
        ));

        let mut config = configured();
        config.agent.decode_retry_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_api_key() {
        let config = AppConfig::default_config();
        assert!(matches!(
            config.validate(),
            Err(CoreError::Validation { ref field, .. }) if field == "model.api_key"
        ));
    }

    #[test]
    fn validate_azure_requires_endpoint() {
        let mut config = configured();
        config.model.provider_type = ProviderType::Azure;
        assert!(config.validate().is_err());
        config.model.endpoint = Some("https://example.openai.azure.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("OpenAI".parse::<ProviderType>().unwrap(), ProviderType::OpenAi);
        assert_eq!(
            "claude".parse::<ProviderType>().unwrap(),
            ProviderType::Anthropic
        );
        assert!("gemini".parse::<ProviderType>().is_err());
    }
}
