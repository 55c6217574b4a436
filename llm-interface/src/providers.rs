use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use signalpost_core::{CompletionParams, CoreError, GenerationError, GenerationProvider};
use std::time::Duration;
use tracing::{debug, error};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_AFTER: u64 = 60;

fn build_http_client() -> Result<Client, CoreError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

fn retry_after_secs(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Maps a non-success HTTP status onto the generation error taxonomy.
pub fn map_status(provider: &str, model: &str, status: StatusCode, retry_after: u64) -> GenerationError {
    match status.as_u16() {
        401 | 403 => GenerationError::InvalidApiKey {
            provider: provider.to_string(),
        },
        404 => GenerationError::ModelNotAvailable {
            model: model.to_string(),
        },
        429 => GenerationError::RateLimitExceeded {
            provider: provider.to_string(),
            retry_after,
        },
        // Hosted inference answers 503 while a cold model is loading.
        503 => GenerationError::ModelNotAvailable {
            model: model.to_string(),
        },
        500..=599 => GenerationError::ServiceUnavailable {
            provider: provider.to_string(),
        },
        _ => GenerationError::InvalidResponseFormat {
            provider: provider.to_string(),
        },
    }
}

fn map_transport_error(provider: &str, e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        GenerationError::RequestTimeout {
            provider: provider.to_string(),
        }
        .into()
    } else {
        CoreError::Network(e)
    }
}

/// Primary provider: hosted text-generation inference endpoint.
#[derive(Debug)]
pub struct InferenceApiProvider {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct InferenceOutput {
    generated_text: String,
}

impl InferenceApiProvider {
    pub const NAME: &'static str = "inference-api";

    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Result<Self, CoreError> {
        Ok(Self {
            http_client: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }
}

pub fn parse_inference_response(body: &str) -> Result<String, GenerationError> {
    let invalid = || GenerationError::InvalidResponseFormat {
        provider: InferenceApiProvider::NAME.to_string(),
    };
    let outputs: Vec<InferenceOutput> = serde_json::from_str(body).map_err(|_| invalid())?;
    let text = outputs
        .into_iter()
        .next()
        .map(|output| output.generated_text)
        .ok_or_else(invalid)?;
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyCompletion {
            provider: InferenceApiProvider::NAME.to_string(),
        });
    }
    Ok(text)
}

#[async_trait]
impl GenerationProvider for InferenceApiProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<String, CoreError> {
        let payload = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                max_new_tokens: params.max_new_tokens,
                temperature: params.temperature,
                return_full_text: false,
            },
            options: InferenceOptions {
                wait_for_model: false,
            },
        };

        let mut request = self.http_client.post(self.endpoint()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("Requesting completion from {} ({})", Self::NAME, self.model);
        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(Self::NAME, e))?;

        if !response.status().is_success() {
            let status = response.status();
            error!("{} returned status {}", Self::NAME, status);
            let retry_after = retry_after_secs(&response);
            return Err(map_status(Self::NAME, &self.model, status, retry_after).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(Self::NAME, e))?;
        Ok(parse_inference_response(&body)?)
    }
}

/// Secondary provider: OpenAI-compatible chat completions.
#[derive(Debug)]
pub struct OpenAiProvider {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str =
    "You are a concise social media assistant. Respond with the post text only.";

impl OpenAiProvider {
    pub const NAME: &'static str = "openai";

    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Result<Self, CoreError> {
        Ok(Self {
            http_client: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }
}

pub fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|_| GenerationError::InvalidResponseFormat {
            provider: OpenAiProvider::NAME.to_string(),
        })?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| GenerationError::EmptyCompletion {
            provider: OpenAiProvider::NAME.to_string(),
        })
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn complete(&self, prompt: &str, params: &CompletionParams) -> Result<String, CoreError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GenerationError::InvalidApiKey {
                provider: Self::NAME.to_string(),
            })?;

        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: params.max_new_tokens,
            temperature: params.temperature,
        };

        debug!("Requesting completion from {} ({})", Self::NAME, self.model);
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_transport_error(Self::NAME, e))?;

        if !response.status().is_success() {
            let status = response.status();
            error!("{} returned status {}", Self::NAME, status);
            let retry_after = retry_after_secs(&response);
            return Err(map_status(Self::NAME, &self.model, status, retry_after).into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(Self::NAME, e))?;
        Ok(parse_chat_response(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inference_response() {
        let body = r#"[{"generated_text": "Bitcoin looks strong"}]"#;
        assert_eq!(parse_inference_response(body).unwrap(), "Bitcoin looks strong");

        assert!(matches!(
            parse_inference_response("[]"),
            Err(GenerationError::InvalidResponseFormat { .. })
        ));
        assert!(matches!(
            parse_inference_response(r#"[{"generated_text": "  "}]"#),
            Err(GenerationError::EmptyCompletion { .. })
        ));
        assert!(matches!(
            parse_inference_response(r#"{"error": "loading"}"#),
            Err(GenerationError::InvalidResponseFormat { .. })
        ));
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": " gm "}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "gm");

        let empty = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        assert!(matches!(
            parse_chat_response(empty),
            Err(GenerationError::EmptyCompletion { .. })
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status("p", "m", StatusCode::UNAUTHORIZED, 60),
            GenerationError::InvalidApiKey { .. }
        ));
        assert!(matches!(
            map_status("p", "m", StatusCode::TOO_MANY_REQUESTS, 12),
            GenerationError::RateLimitExceeded { retry_after: 12, .. }
        ));
        assert!(matches!(
            map_status("p", "m", StatusCode::SERVICE_UNAVAILABLE, 60),
            GenerationError::ModelNotAvailable { .. }
        ));
        assert!(matches!(
            map_status("p", "m", StatusCode::BAD_GATEWAY, 60),
            GenerationError::ServiceUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_openai_without_key_fails_fast() {
        let provider =
            OpenAiProvider::new("http://127.0.0.1:9".to_string(), "m".to_string(), None).unwrap();
        let result = provider
            .complete("hello", &CompletionParams::for_length(280))
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Generation(GenerationError::InvalidApiKey { .. }))
        ));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let provider = InferenceApiProvider::new(
            "https://inference.example.com/".to_string(),
            "gpt2".to_string(),
            None,
        )
        .unwrap();
        assert_eq!(provider.endpoint(), "https://inference.example.com/models/gpt2");
    }
}
