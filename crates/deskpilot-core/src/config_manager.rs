//! 설정 파일 관리.
//!
//! 기본값 ← JSON 설정 파일 ← `DESKPILOT__SECTION__FIELD` 환경변수 순으로 레이어를 쌓는다.
//! API 키/엔드포인트가 비어 있으면 제공자 표준 환경변수에서 채운다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info};

use crate::config::{AppConfig, ProviderType};
use crate::error::CoreError;

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 앱 디렉토리 이름
const APP_DIR_NAME: &str = "deskpilot";

/// 환경변수 접두사 (`DESKPILOT__AGENT__MAX_TURNS=5`)
const ENV_PREFIX: &str = "DESKPILOT";

/// 환경변수 구분자
const ENV_SEPARATOR: &str = "__";

/// 설정 관리자
///
/// 설정 파일 + 환경변수 레이어를 합쳐 `AppConfig`를 만든다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 로드된 설정
    config: AppConfig,
    /// 설정 파일 경로 (존재하지 않을 수 있음)
    config_path: PathBuf,
}

impl ConfigManager {
    /// 플랫폼 기본 경로에서 로드 — 파일이 없으면 기본값 + 환경변수만 사용
    pub fn new() -> Result<Self, CoreError> {
        let config_path = Self::config_dir()?.join(CONFIG_FILE_NAME);
        Self::load(config_path, false, None)
    }

    /// 지정된 경로에서 로드 — 파일이 반드시 있어야 한다
    pub fn with_path(config_path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        Self::load(config_path.into(), true, None)
    }

    fn load(
        config_path: PathBuf,
        required: bool,
        env_source: Option<HashMap<String, String>>,
    ) -> Result<Self, CoreError> {
        if required && !config_path.exists() {
            return Err(CoreError::Config(format!(
                "설정 파일을 찾을 수 없습니다: {}",
                config_path.display()
            )));
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env_source.clone());

        let layered = Config::builder()
            .add_source(
                File::from(config_path.clone())
                    .format(FileFormat::Json)
                    .required(required),
            )
            .add_source(environment)
            .build()
            .map_err(|e| {
                CoreError::Config(format!(
                    "설정 로드 실패: {}: {}",
                    config_path.display(),
                    e
                ))
            })?;

        let mut config: AppConfig = layered.try_deserialize().map_err(|e| {
            CoreError::Config(format!(
                "설정 파싱 실패: {}: {}",
                config_path.display(),
                e
            ))
        })?;

        match env_source {
            Some(vars) => apply_env_fallbacks(&mut config, |key| vars.get(key).cloned()),
            None => apply_process_env_fallbacks(&mut config),
        }

        if config_path.exists() {
            info!("설정 파일 로드: {}", config_path.display());
        } else {
            debug!("설정 파일 없음, 기본값 사용: {}", config_path.display());
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// 현재 설정 반환 (복제본)
    pub fn get(&self) -> AppConfig {
        self.config.clone()
    }

    /// 설정 반환 (소유권 이전)
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// 설정 파일 경로 반환
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 플랫폼별 설정 디렉토리 경로
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        #[cfg(target_os = "macos")]
        {
            // macOS: ~/Library/Application Support/deskpilot/
            let home = std::env::var("HOME")
                .map_err(|_| CoreError::Config("HOME 환경 변수를 찾을 수 없습니다".to_string()))?;
            Ok(PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME))
        }

        #[cfg(target_os = "windows")]
        {
            // Windows: %APPDATA%\deskpilot\
            let appdata = std::env::var("APPDATA").map_err(|_| {
                CoreError::Config("APPDATA 환경 변수를 찾을 수 없습니다".to_string())
            })?;
            Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
        }

        #[cfg(target_os = "linux")]
        {
            // Linux: ~/.config/deskpilot/
            let home = std::env::var("HOME")
                .map_err(|_| CoreError::Config("HOME 환경 변수를 찾을 수 없습니다".to_string()))?;
            Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        {
            tracing::warn!("지원되지 않는 플랫폼, 현재 디렉토리 사용");
            Ok(PathBuf::from(".").join(APP_DIR_NAME))
        }
    }
}

/// 프로세스 환경변수로 빈 API 키 / 엔드포인트 채움
///
/// 로드 이후 제공자가 바뀐 경우(CLI 오버라이드 등) 다시 호출한다.
pub fn apply_process_env_fallbacks(config: &mut AppConfig) {
    apply_env_fallbacks(config, |key| std::env::var(key).ok());
}

/// 비어 있는 API 키 / 엔드포인트를 제공자 표준 환경변수로 채움
fn apply_env_fallbacks<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let model = &mut config.model;

    if model.api_key.trim().is_empty() {
        let key_var = match model.provider_type {
            ProviderType::OpenAi => "OPENAI_API_KEY",
            ProviderType::Anthropic => "ANTHROPIC_API_KEY",
            ProviderType::Azure => "AZURE_OPENAI_API_KEY",
        };
        if let Some(key) = lookup(key_var).filter(|k| !k.trim().is_empty()) {
            debug!(var = key_var, "환경변수에서 API 키 사용");
            model.api_key = key;
        }
    }

    if model.provider_type == ProviderType::Azure && model.endpoint.is_none() {
        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT").filter(|e| !e.trim().is_empty()) {
            debug!("환경변수에서 Azure 엔드포인트 사용");
            model.endpoint = Some(endpoint);
        }
    }
}
