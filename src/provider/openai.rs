use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{collect_stream, decode_sse, ApiErrorBody, Delivery, ModelGateway, ModelResult};
use crate::errors::GenError;
use crate::wire::Instruction;

/// OpenAI-compatible `/chat/completions` client (OpenRouter, OpenAI, or any
/// server speaking the same protocol).
pub struct ChatCompletions {
    api_base: String,
    model: String,
    api_key: String,
    client: Client,
    /// OpenRouter wants attribution headers on every call.
    attribution: Option<(String, String)>,
}

impl ChatCompletions {
    pub fn new(
        api_base: String,
        model: String,
        api_key: String,
        timeout_secs: u64,
        openrouter: bool,
        site_url: String,
        site_title: String,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?;
        Ok(Self {
            api_base,
            model,
            api_key,
            client,
            attribution: openrouter.then_some((site_url, site_title)),
        })
    }

    fn body(&self, ins: &Instruction, delivery: Delivery) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &ins.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": ins.user }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": delivery == Delivery::Streaming,
        });
        if delivery == Delivery::Streaming {
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    fn request(&self, body: &Value) -> RequestBuilder {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let mut req = self.client.post(url).bearer_auth(&self.api_key).json(body);
        if let Some((site_url, site_title)) = &self.attribution {
            req = req.header("HTTP-Referer", site_url).header("X-Title", site_title);
        }
        req
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

/// Read a non-streaming completion body. An `error` object or a reply with
/// no choices is a transport failure even under a 2xx status.
fn read_completion(text: &str) -> Result<ModelResult, GenError> {
    let parsed: ChatResponse = serde_json::from_str(text)
        .map_err(|e| GenError::transport(None, format!("unreadable completion: {e}\nRaw: {text}")))?;
    if let Some(err) = parsed.error {
        return Err(err.into_error());
    }
    let Some(choice) = parsed.choices.into_iter().next() else {
        return Err(GenError::transport(None, format!("completion had no choices\nRaw: {text}")));
    };
    Ok(ModelResult { text: choice.message.content.unwrap_or_default(), usage: None })
}

#[async_trait]
impl ModelGateway for ChatCompletions {
    async fn send(&self, ins: &Instruction, delivery: Delivery) -> Result<ModelResult, GenError> {
        let body = self.body(ins, delivery);
        tracing::debug!(model = %self.model, ?delivery, "POST chat/completions");

        let resp = self.request(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GenError::transport(
                Some(status.as_u16()),
                format!("model API error ({}): {}", status, text),
            ));
        }

        match delivery {
            Delivery::Buffered => {
                let text = resp.text().await?;
                read_completion(&text)
            }
            Delivery::Streaming => {
                let chunks = decode_sse(resp.bytes_stream().map_err(GenError::from));
                let result = collect_stream(chunks).await?;
                if let Some(usage) = &result.usage {
                    tracing::info!(
                        prompt = ?usage.prompt_tokens,
                        completion = ?usage.completion_tokens,
                        total = ?usage.total_tokens,
                        "token usage"
                    );
                }
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(openrouter: bool) -> ChatCompletions {
        ChatCompletions::new(
            "https://openrouter.ai/api/v1/".into(),
            "m".into(),
            "k".into(),
            5,
            openrouter,
            "http://localhost:3000".into(),
            "Mockups".into(),
        )
        .unwrap()
    }

    #[test]
    fn streaming_body_asks_for_usage() {
        let ins = Instruction { system: Some("sys".into()), user: "hi".into() };
        let body = client(true).body(&ins, Delivery::Streaming);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn edit_body_has_only_user_message() {
        let ins = Instruction { system: None, user: "edit".into() };
        let body = client(false).body(&ins, Delivery::Buffered);
        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn request_targets_completions_with_attribution() {
        let req = client(true).request(&json!({})).build().unwrap();
        assert_eq!(req.url().as_str(), "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(req.headers()["X-Title"], "Mockups");
        assert!(client(false).request(&json!({})).build().unwrap().headers().get("X-Title").is_none());
    }

    #[test]
    fn completion_text_from_first_choice() {
        let res = read_completion(r#"{"choices":[{"message":{"content":"<div/>"}},{"message":{"content":"x"}}]}"#).unwrap();
        assert_eq!(res.text, "<div/>");
    }

    #[test]
    fn error_body_under_success_status_is_rate_limited() {
        let err = read_completion(r#"{"error":{"code":429,"message":"Rate limit exceeded"}}"#).unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(crate::policy::classify_failure(&err), crate::policy::FailureClass::RateLimited);
    }

    #[test]
    fn empty_choices_are_not_an_empty_reply() {
        let err = read_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, GenError::Transport { status: None, .. }));
        assert_eq!(crate::policy::classify_failure(&err), crate::policy::FailureClass::Fatal);
    }
}
