//! 호스팅 비전 모델 클라이언트.
//!
//! 스크린샷(base64 PNG)과 대화 히스토리를 외부 비전 모델 API에 보내고
//! 응답 텍스트를 반환한다. 응답 텍스트의 `ModelResponse` 디코딩은 대화 루프가 한다.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use deskpilot_core::config::{ModelConfig, ProviderType};
use deskpilot_core::error::CoreError;
use deskpilot_core::models::conversation::{HistoryMessage, MessageRole};
use deskpilot_core::ports::vision_model::{ModelRequest, VisionModel};

/// OpenAI 기본 엔드포인트
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Anthropic 기본 엔드포인트
const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API 버전 헤더 값
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// 재시도 가능한 에러인지 판별
fn is_retryable(error: &CoreError) -> bool {
    error.is_transient()
}

// ============================================================
// RemoteVisionModel — 호스팅 비전 모델 클라이언트
// ============================================================

/// 호스팅 비전 모델 클라이언트 — `VisionModel` 포트 구현
///
/// 지원 API:
/// - Anthropic: `POST /v1/messages` (`x-api-key`, base64 이미지 블록)
/// - OpenAI: `POST /v1/chat/completions` (Bearer, `image_url` data URI)
/// - Azure OpenAI: `POST {endpoint}/openai/deployments/{model}/chat/completions?api-version=…` (`api-key`)
#[derive(Debug)]
pub struct RemoteVisionModel {
    /// HTTP 클라이언트
    http_client: reqwest::Client,
    /// 최종 요청 URL
    url: String,
    /// API 키 (메모리에만 유지)
    api_key: String,
    /// 모델 (Azure는 배포) 이름
    model: String,
    /// 제공자 타입 — 요청/응답 형식 결정
    provider_type: ProviderType,
    /// 응답 최대 토큰
    max_tokens: u32,
    /// 일시적 실패 재시도 횟수
    max_retries: u32,
    /// 재시도 간격
    retry_delay: Duration,
}

impl RemoteVisionModel {
    /// 새 RemoteVisionModel 생성
    pub fn new(config: &ModelConfig) -> Result<Self, CoreError> {
        if config.api_key.trim().is_empty() {
            return Err(CoreError::Config(
                "비전 모델 API 키 미설정. 설정 파일 또는 환경변수로 지정하세요.".into(),
            ));
        }

        let url = Self::resolve_url(config)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        debug!(
            provider = config.provider_type.as_str(),
            url = %url,
            model = %config.model,
            timeout = config.timeout_secs,
            "RemoteVisionModel 초기화"
        );

        Ok(Self {
            http_client,
            url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            provider_type: config.provider_type,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        })
    }

    /// 제공자별 요청 URL
    fn resolve_url(config: &ModelConfig) -> Result<String, CoreError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());

        match config.provider_type {
            ProviderType::OpenAi => Ok(endpoint.unwrap_or(OPENAI_DEFAULT_URL).to_string()),
            ProviderType::Anthropic => Ok(endpoint.unwrap_or(ANTHROPIC_DEFAULT_URL).to_string()),
            ProviderType::Azure => {
                let base = endpoint.ok_or_else(|| {
                    CoreError::Config("Azure OpenAI 엔드포인트 미설정".to_string())
                })?;
                Ok(format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    base.trim_end_matches('/'),
                    config.model,
                    config.api_version
                ))
            }
        }
    }

    /// 시스템 프롬프트 (컴퓨터 사용 에이전트 역할)
    fn system_prompt() -> &'static str {
        r#"You are a computer-use agent operating a desktop through screenshots.
Each user turn contains the latest screenshot and the result of the previous actions.
Coordinates are pixels in the attached screenshot, origin at the top-left corner.

Respond with a single JSON object only:
{
  "actions": [
    {"type": "click", "x": 0, "y": 0, "button": "left | right | middle"},
    {"type": "double_click", "x": 0, "y": 0},
    {"type": "type", "text": "..."},
    {"type": "key_combo", "keys": ["ctrl", "s"]},
    {"type": "scroll", "x": 0, "y": 0, "dx": 0, "dy": 3},
    {"type": "wait", "seconds": 1.0},
    {"type": "drag", "x0": 0, "y0": 0, "x1": 10, "y1": 10},
    {"type": "move", "x": 0, "y": 0}
  ],
  "message": "short note for the user",
  "done": false,
  "requires_consent": false,
  "requires_user_input": false
}

Set "done" to true when the task is complete.
Set "requires_consent" to true before irreversible or sensitive actions.
Set "requires_user_input" to true when you need information from the user."#
    }

    /// 이번 턴 사용자 텍스트 (피드백 + 좌표계 안내)
    fn build_turn_text(request: &ModelRequest) -> String {
        let mut text = request.feedback.clone();
        text.push_str(&format!(
            "\nScreenshot size: {}x{} pixels.",
            request.frame.width, request.frame.height
        ));
        if request.attempt > 1 {
            text.push_str(
                "\nYour previous reply could not be parsed. Reply with one JSON object only.",
            );
        }
        text
    }

    /// 연속된 같은 역할 메시지 병합 (역할 교대 요구 API 대응)
    fn merge_history(history: &[HistoryMessage]) -> Vec<(MessageRole, String)> {
        let mut merged: Vec<(MessageRole, String)> = Vec::new();
        for message in history {
            match merged.last_mut() {
                Some((role, content)) if *role == message.role => {
                    content.push_str("\n\n");
                    content.push_str(&message.content);
                }
                _ => merged.push((message.role, message.content.clone())),
            }
        }
        merged
    }

    fn role_name(role: MessageRole) -> &'static str {
        match role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Anthropic Messages 요청 본문
    fn build_anthropic_body(&self, request: &ModelRequest) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        let mut history = Self::merge_history(&request.history);

        // 마지막이 user면 이번 턴 블록에 텍스트를 합친다
        let carried = match history.last() {
            Some((MessageRole::User, _)) => history.pop().map(|(_, content)| content),
            _ => None,
        };

        for (role, content) in history {
            messages.push(json!({
                "role": Self::role_name(role),
                "content": content
            }));
        }

        let mut turn_text = Self::build_turn_text(request);
        if let Some(prefix) = carried {
            turn_text = format!("{prefix}\n\n{turn_text}");
        }

        messages.push(json!({
            "role": "user",
            "content": [
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": request.frame.media_type,
                        "data": request.frame.data_base64
                    }
                },
                {
                    "type": "text",
                    "text": turn_text
                }
            ]
        }));

        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": Self::system_prompt(),
            "messages": messages
        })
    }

    /// OpenAI / Azure Chat Completions 요청 본문
    fn build_openai_body(&self, request: &ModelRequest) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": Self::system_prompt()
        })];

        for (role, content) in Self::merge_history(&request.history) {
            messages.push(json!({
                "role": Self::role_name(role),
                "content": content
            }));
        }

        messages.push(json!({
            "role": "user",
            "content": [
                {
                    "type": "text",
                    "text": Self::build_turn_text(request)
                },
                {
                    "type": "image_url",
                    "image_url": { "url": request.frame.data_uri() }
                }
            ]
        }));

        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages
        })
    }

    /// Anthropic 응답 봉투에서 텍스트 추출
    fn parse_anthropic_envelope(body: &str) -> Result<String, CoreError> {
        let response: Value = serde_json::from_str(body)
            .map_err(|e| CoreError::Decode(format!("응답 봉투 JSON 파싱 실패: {}", e)))?;

        // content[] 중 text 블록을 이어 붙인다
        let text: String = response
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(CoreError::Decode(
                "Anthropic 응답에서 텍스트를 찾을 수 없음".to_string(),
            ));
        }
        Ok(text)
    }

    /// OpenAI 응답 봉투에서 텍스트 추출
    fn parse_openai_envelope(body: &str) -> Result<String, CoreError> {
        let response: Value = serde_json::from_str(body)
            .map_err(|e| CoreError::Decode(format!("응답 봉투 JSON 파싱 실패: {}", e)))?;

        // choices[0].message.content
        response
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CoreError::Decode("OpenAI 응답에서 텍스트를 찾을 수 없음".to_string()))
    }

    /// 요청 1회 전송 + 상태 코드별 에러 매핑
    async fn send_once(&self, body: &Value) -> Result<String, CoreError> {
        let mut builder = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(body);

        builder = match self.provider_type {
            ProviderType::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ProviderType::OpenAi => {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            }
            ProviderType::Azure => builder.header("api-key", &self.api_key),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("비전 모델 API 호출 실패: {}", e)))?;

        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let text = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("비전 모델 API 응답 읽기 실패: {}", e)))?;

        if status.is_success() {
            return Ok(text);
        }

        warn!(status = %status, "비전 모델 API 오류 응답");
        let preview: String = text.chars().take(200).collect();
        match status.as_u16() {
            429 => Err(CoreError::RateLimit { retry_after_secs }),
            500..=599 => Err(CoreError::ServiceUnavailable(format!("{status}: {preview}"))),
            401 | 403 => Err(CoreError::Config(format!("API 인증 실패 ({status}): {preview}"))),
            _ => Err(CoreError::Internal(format!(
                "비전 모델 API 오류 ({status}): {preview}"
            ))),
        }
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// 고정 간격 재시도. 429에 `retry-after`가 있으면 그 값을 따른다.
    async fn execute_with_retry(&self, body: &Value) -> Result<String, CoreError> {
        let mut attempt = 0;
        loop {
            match self.send_once(body).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if !is_retryable(&e) || attempt >= self.max_retries {
                        return Err(e);
                    }

                    let delay = match &e {
                        CoreError::RateLimit { retry_after_secs } if *retry_after_secs > 0 => {
                            Duration::from_secs(*retry_after_secs)
                        }
                        _ => self.retry_delay,
                    };

                    attempt += 1;
                    warn!(
                        "요청 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                        attempt,
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl VisionModel for RemoteVisionModel {
    async fn send(&self, request: &ModelRequest) -> Result<String, CoreError> {
        let body = match self.provider_type {
            ProviderType::Anthropic => self.build_anthropic_body(request),
            ProviderType::OpenAi | ProviderType::Azure => self.build_openai_body(request),
        };

        debug!(
            provider = self.provider_type.as_str(),
            model = %self.model,
            history = request.history.len(),
            attempt = request.attempt,
            viewport = %format!("{}x{}", request.frame.width, request.frame.height),
            "비전 모델 API 호출"
        );

        let envelope = self.execute_with_retry(&body).await?;

        let text = match self.provider_type {
            ProviderType::Anthropic => Self::parse_anthropic_envelope(&envelope)?,
            ProviderType::OpenAi | ProviderType::Azure => Self::parse_openai_envelope(&envelope)?,
        };

        debug!(chars = text.len(), "비전 모델 응답 수신");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================
// 테스트
// ============================================================
