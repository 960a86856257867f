use super::{parse_structured_response, ExtractedParameters, ParameterSource, MISSING_SENTINEL};
use crate::errors::{AgentError, AgentResult};
use crate::feeds::retry::{with_retry, RetryPolicy};
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;

/// Parameter extractor backed by an OpenAI-compatible chat-completions API.
#[derive(Clone)]
pub struct LlmExtractor {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// Response (trimmed):
// { "choices": [ { "message": { "role": "assistant", "content": "{...}" } } ] }

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(serde::Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(serde::Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl LlmExtractor {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            retry,
        }
    }

    async fn complete(&self, prompt: &str) -> AgentResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::UpstreamApi {
                status: status.as_u16(),
                body,
            });
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::MalformedResponse(format!("chat completion: {e}")))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AgentError::MalformedResponse("empty chat completion".into()))
    }
}

impl ParameterSource for LlmExtractor {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract(&self, query: &str, today: NaiveDate) -> AgentResult<ExtractedParameters> {
        let prompt = build_prompt(query, today);
        let content = with_retry(&self.retry, "language service call", || self.complete(&prompt)).await?;

        tracing::debug!(model = %self.model, reply = %content.trim(), "language service replied");
        parse_structured_response(&content)
    }
}

/// Fixed instruction template. The example date is illustrative only.
pub fn build_prompt(query: &str, today: NaiveDate) -> String {
    format!(
        r#"You extract parameters for a Monte Carlo price-target simulation.

Read the user's question and return a JSON object with exactly these fields:
- "symbol": (string) the exchange ticker of the asset, e.g. PETR4 or VALE3
- "strike": (number) the price level the user wants to know whether it will be reached
- "date": (string, format YYYY-MM-DD) the date by which the price may be reached

Rules:
- If any of the three fields cannot be determined, answer only with: {MISSING_SENTINEL}
- Today is {today}. Turn expressions such as "next month", "next year" or "end of the year" into a real date
- Do not invent data
- Use a dot as the decimal separator
- Return only the JSON

Example:
Question: "What is the chance that ITUB4 hits 32 by August 20, 2025?"
Answer:
{{
  "symbol": "ITUB4",
  "strike": 32,
  "date": "2025-08-20"
}}

Question: "{query}"
"#,
        today = today.format("%Y-%m-%d"),
        query = query.trim(),
    )
}
