//! OpenAI completion client implementation.
//!
//! This module implements the EvaluationClient trait for the OpenAI
//! completions API: one composed prompt in, trimmed completion text out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::eval::client::{EvalError, EvaluationClient, EvaluationRequest};

/// OpenAI completions API URL
const OPENAI_API_URL: &str = "https://api.openai.com/v1/completions";

/// Default model to use
const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";

/// Default bound on completion length
const DEFAULT_MAX_TOKENS: u32 = 150;

/// Configuration for the OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }
}

impl OpenAiConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// OpenAI API client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    ///
    /// Reads OPENAI_API_KEY from environment
    pub fn new(config: OpenAiConfig) -> Result<Self, EvalError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| EvalError::MissingApiKey {
            env_var: "OPENAI_API_KEY".to_string(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self, EvalError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EvalError::Network)?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Build the request body for the completions API
    fn build_request(&self, request: &EvaluationRequest) -> Value {
        json!({
            "model": self.config.model,
            "prompt": request.compose(),
            "max_tokens": self.config.max_tokens,
        })
    }

    /// Extract the trimmed completion text from the API response
    fn parse_response(&self, body: Value) -> Result<String, EvalError> {
        let text = body["choices"][0]["text"]
            .as_str()
            .ok_or_else(|| EvalError::InvalidResponse("response has no choices[0].text".to_string()))?;

        Ok(text.trim().to_string())
    }

    /// Send a request to the completions API
    async fn send_request(&self, body: Value) -> Result<Value, EvalError> {
        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        // Handle rate limiting
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(EvalError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        // Handle other errors
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EvalError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| EvalError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl EvaluationClient for OpenAiClient {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvalError> {
        let body = self.build_request(request);
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}
