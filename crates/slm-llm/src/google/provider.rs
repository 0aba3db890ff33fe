//! Gemini implementation of [`GenerationSource`] and [`DistillationSource`].
//!
//! - Streaming: `POST {base}/models/{chat_model}:streamGenerateContent?alt=sse`
//! - One-shot:  `POST {base}/models/{distill_model}:generateContent`
//!
//! Authentication is an API key in the `x-goog-api-key` header.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error_parsing::{parse_api_error, parse_retry_after_secs};
use crate::fallback::with_fallback;
use crate::google::types::{
    GeminiContent, GeminiPart, GeminiStreamChunk, GenerateContentRequest, GenerationConfig,
    GoogleConfig, SystemInstruction, SystemPart,
};
use crate::provider::{
    DistillationSource, FragmentStream, GenerationSource, ProviderError, ProviderResult,
    RawFragmentStream,
};
use crate::request::GenerationRequest;
use crate::sse::{parse_sse_data, parse_sse_lines};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider.
pub struct GoogleProvider {
    config: GoogleConfig,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a provider with its own HTTP client.
    #[must_use]
    pub fn new(config: GoogleConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: GoogleConfig, client: reqwest::Client) -> Self {
        info!(
            chat_model = %config.chat_model,
            distill_model = %config.distill_model,
            has_api_key = config.api_key.is_some(),
            "Google provider initialized"
        );
        Self { config, client }
    }

    /// Provider configuration.
    #[must_use]
    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    fn api_url(&self, model: &str, action: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if action == "streamGenerateContent" {
            format!("{base}/models/{model}:{action}?alt=sse")
        } else {
            format!("{base}/models/{model}:{action}")
        }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::Auth {
                message: "no Gemini API key configured (set SLM_API_KEY or GEMINI_API_KEY)".into(),
            })?;

        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(key).map_err(|e| ProviderError::Auth {
                message: format!("invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    fn build_generation_config(&self) -> Option<GenerationConfig> {
        let cfg = GenerationConfig {
            max_output_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
        };
        (!cfg.is_empty()).then_some(cfg)
    }

    fn build_stream_body(&self, request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: request.contents.iter().map(GeminiContent::from).collect(),
            system_instruction: Some(SystemInstruction {
                parts: vec![SystemPart {
                    text: request.system_instruction.clone(),
                }],
            }),
            generation_config: self.build_generation_config(),
        }
    }

    fn build_distill_body(prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart::Text {
                    text: prompt.to_string(),
                    thought: None,
                }],
            }],
            system_instruction: None,
            generation_config: None,
        }
    }

    /// POST `body` and map non-2xx responses to [`ProviderError`].
    async fn post(
        &self,
        url: &str,
        body: &GenerateContentRequest,
    ) -> ProviderResult<reqwest::Response> {
        let headers = self.build_headers()?;
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after_secs);
        let body_text = response.text().await.unwrap_or_default();
        let info = parse_api_error(&body_text, status.as_u16());
        error!(
            status = status.as_u16(),
            code = info.code.as_deref().unwrap_or("unknown"),
            retryable = info.retryable,
            "Google API error"
        );
        Err(info.into_provider_error(status.as_u16(), retry_after))
    }

    /// Open the SSE stream. Fragments stop as soon as `cancel` fires.
    #[instrument(skip_all, fields(model = %self.config.chat_model))]
    async fn stream_internal(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> ProviderResult<RawFragmentStream> {
        debug!(turns = request.turn_count(), "starting Gemini stream");
        let body = self.build_stream_body(request);
        let url = self.api_url(&self.config.chat_model, "streamGenerateContent");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            r = self.post(&url, &body) => r?,
        };

        let lines = parse_sse_lines(response.bytes_stream());
        let fragments = async_stream::stream! {
            let mut lines = std::pin::pin!(lines);
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("Gemini stream cancelled");
                        break;
                    }
                    next = lines.next() => next,
                };
                let data = match next {
                    None => break,
                    Some(Ok(data)) => data,
                    Some(Err(e)) => {
                        yield Err(e);
                        break;
                    }
                };
                let Some(chunk) = parse_sse_data::<GeminiStreamChunk>(&data, "google") else {
                    continue;
                };
                if let Some(err) = chunk.error {
                    yield Err(err.into_provider_error());
                    break;
                }
                if let Some(reason) = chunk.finish_reason() {
                    if reason != "STOP" {
                        warn!(finish_reason = reason, "Gemini stream finished early");
                    }
                }
                let text = chunk.text();
                if text.is_empty() {
                    continue;
                }
                if cancel.is_cancelled() {
                    break;
                }
                yield Ok(text);
            }
        };
        Ok(Box::pin(fragments))
    }
}

#[async_trait]
impl GenerationSource for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn stream(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> FragmentStream {
        with_fallback("google", self.stream_internal(request, cancel).await)
    }
}

#[async_trait]
impl DistillationSource for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    #[instrument(skip_all, fields(model = %self.config.distill_model))]
    async fn distill(&self, prompt: &str) -> ProviderResult<String> {
        let url = self.api_url(&self.config.distill_model, "generateContent");
        let body = Self::build_distill_body(prompt);
        let response = self.post(&url, &body).await?;
        let chunk: GeminiStreamChunk = response.json().await?;
        if let Some(err) = chunk.error {
            return Err(err.into_provider_error());
        }
        Ok(chunk.text())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
