// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI recommendations for todo items.
//!
//! [`RecommendationEngine::get_recommendations`] never fails: provider
//! errors, timeouts, malformed output and panics are retried with backoff
//! and finally degrade to a single placeholder entry.

use crate::config::Config;
use crate::models::Recommendation;
use crate::services::TokenManager;
use crate::validation::KEYWORD_PHRASE_MAX_LENGTH;
use anyhow::Context;
use async_trait::async_trait;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Token scope for Azure OpenAI / AI Foundry.
pub const AOAI_SCOPE: &str = "https://cognitiveservices.azure.com/.default";
const AOAI_API_VERSION: &str = "2024-02-15-preview";

pub const INVALID_INPUT: &str = "Invalid input provided";
pub const UNABLE_TO_GENERATE: &str =
    "Sorry, unable to generate recommendations at this time. Please try again later.";
pub const NO_RECOMMENDATIONS: &str = "No recommendations available";
pub const INVALID_FORMAT: &str = "Invalid response format";
pub const NO_VALID_RECOMMENDATIONS: &str = "No valid recommendations found";
pub const UNABLE_TO_PARSE: &str = "Sorry, unable to parse recommendations at this time";

/// Characters of raw provider output included in parse-failure logs.
const RAW_LOG_EXCERPT: usize = 500;

const SYSTEM_PROMPT: &str = "You are an administrative assistant who recommends websites \
that help people complete their tasks. If you have no recommendations, return an empty \
JSON array. Respond only with a JSON array of objects of the form \
[{\"title\": \"...\", \"link\": \"...\"}].";

// ─────────────────────────────────────────────────────────────────────────────
// Provider seam
// ─────────────────────────────────────────────────────────────────────────────

/// A system + user message pair for a chat completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
}

/// Provider failures. Consumed by the engine, never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("credential unavailable: {0}")]
    Credential(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Text of the first choice, or `Ok(None)` when the response carries none.
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>, ProviderError>;
}

/// Azure OpenAI chat completions with Entra ID bearer auth.
pub struct AzureOpenAiProvider {
    http: reqwest::Client,
    url: String,
    tokens: Arc<TokenManager>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl AzureOpenAiProvider {
    pub fn new(
        endpoint: &str,
        deployment: &str,
        tokens: Arc<TokenManager>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building Azure OpenAI HTTP client")?;

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            urlencoding::encode(deployment),
            AOAI_API_VERSION
        );

        Ok(Self { http, url, tokens })
    }
}

#[async_trait]
impl ChatProvider for AzureOpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>, ProviderError> {
        // Refreshes only when the held token is inside its safety margin
        let token = self
            .tokens
            .current_token()
            .await
            .map_err(|e| ProviderError::Credential(e.to_string()))?;

        let body = CompletionRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: 0.14,
            max_tokens: 800,
            top_p: 0.17,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status,
                body: body.chars().take(200).collect(),
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Attempt count and timing for provider calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep before attempt `n + 1` is `base_delay * n`.
    pub base_delay: Duration,
    /// Bound on a single provider call.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.recommendation_max_attempts.max(1),
            base_delay: config.recommendation_retry_delay,
            call_timeout: config.recommendation_timeout,
        }
    }
}

/// Why an attempt should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryReason {
    Provider,
    Parse,
    Panic,
}

impl RetryReason {
    /// Placeholder returned once attempts are exhausted.
    fn exhausted_title(self) -> &'static str {
        match self {
            RetryReason::Provider | RetryReason::Panic => UNABLE_TO_GENERATE,
            RetryReason::Parse => UNABLE_TO_PARSE,
        }
    }
}

enum AttemptOutcome {
    Done(Vec<Recommendation>),
    Retry(RetryReason),
}

/// Retrying front end to a [`ChatProvider`].
pub struct RecommendationEngine {
    provider: Arc<dyn ChatProvider>,
    policy: RetryPolicy,
}

impl RecommendationEngine {
    pub fn new(provider: Arc<dyn ChatProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Recommendations for a keyword phrase, excluding `previous_links`.
    ///
    /// Always returns a usable list; failures become a placeholder entry.
    pub async fn get_recommendations(
        &self,
        keyword_phrase: &str,
        previous_links: Option<&[String]>,
    ) -> Vec<Recommendation> {
        let trimmed = keyword_phrase.trim();
        if trimmed.is_empty() {
            tracing::warn!("Invalid keyword phrase for recommendations");
            return vec![Recommendation::placeholder(INVALID_INPUT)];
        }
        let keyword: String = trimmed.chars().take(KEYWORD_PHRASE_MAX_LENGTH).collect();

        let request = build_request(&keyword, previous_links);
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let outcome = AssertUnwindSafe(self.attempt(&request, attempt, max_attempts))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!(attempt, max_attempts, "Recommendation attempt panicked");
                    AttemptOutcome::Retry(RetryReason::Panic)
                });

            match outcome {
                AttemptOutcome::Done(recommendations) => return recommendations,
                AttemptOutcome::Retry(reason) if attempt < max_attempts => {
                    let delay = self.policy.base_delay * attempt;
                    tracing::debug!(
                        attempt,
                        ?reason,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying recommendation request"
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::Retry(reason) => {
                    tracing::warn!(?reason, max_attempts, "Recommendation retries exhausted");
                    return vec![Recommendation::placeholder(reason.exhausted_title())];
                }
            }
        }

        vec![Recommendation::placeholder(UNABLE_TO_GENERATE)]
    }

    async fn attempt(&self, request: &ChatRequest, attempt: u32, max_attempts: u32) -> AttemptOutcome {
        let response =
            tokio::time::timeout(self.policy.call_timeout, self.provider.complete(request)).await;

        let text = match response {
            Err(_) => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    timeout_secs = self.policy.call_timeout.as_secs(),
                    "Recommendation provider timed out"
                );
                return AttemptOutcome::Retry(RetryReason::Provider);
            }
            Ok(Err(e)) => {
                tracing::warn!(attempt, max_attempts, error = %e, "Recommendation provider call failed");
                return AttemptOutcome::Retry(RetryReason::Provider);
            }
            Ok(Ok(Some(text))) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                tracing::info!("Recommendation provider returned no content");
                return AttemptOutcome::Done(vec![Recommendation::placeholder(NO_RECOMMENDATIONS)]);
            }
        };

        match parse_recommendations(&text) {
            Ok(recommendations) => AttemptOutcome::Done(recommendations),
            Err(e) => {
                let raw: String = text.chars().take(RAW_LOG_EXCERPT).collect();
                tracing::warn!(attempt, error = %e, raw = %raw, "Recommendation JSON decode error");
                AttemptOutcome::Retry(RetryReason::Parse)
            }
        }
    }
}

fn build_request(keyword: &str, previous_links: Option<&[String]>) -> ChatRequest {
    let mut user = format!(
        "Please return 5 recommendations based on the input string: '{}' as valid JSON, \
         each with a title and a hyperlink to the supporting website. RETURN ONLY JSON AND NOTHING ELSE",
        keyword
    );

    if let Some(links) = previous_links.filter(|links| !links.is_empty()) {
        user.push_str(". EXCLUDE the following links from your recommendations: ");
        user.push_str(&links.join(", "));
    }

    ChatRequest {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Parse provider text into recommendations.
///
/// Only a JSON syntax error is an `Err`; well-formed but unusable output
/// degrades to a placeholder entry.
pub fn parse_recommendations(raw: &str) -> Result<Vec<Recommendation>, serde_json::Error> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned)?;

    let Value::Array(entries) = value else {
        tracing::warn!("Recommendation response is not a JSON array");
        return Ok(vec![Recommendation::placeholder(INVALID_FORMAT)]);
    };

    let recommendations: Vec<Recommendation> = entries
        .iter()
        .filter_map(|entry| {
            let object = entry.as_object()?;
            let title = object.get("title")?;
            let link = object.get("link")?;
            Some(Recommendation::new(&value_text(title), &value_text(link)))
        })
        .collect();

    if recommendations.is_empty() {
        return Ok(vec![Recommendation::placeholder(NO_VALID_RECOMMENDATIONS)]);
    }
    Ok(recommendations)
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        // Null renders empty rather than as the text "None"
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
