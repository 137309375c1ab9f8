//! Response client for the OpenAI-compatible `/responses` endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::post_json;
use crate::error::{ApiFailure, ResponseError};
use crate::models::{Config, ResponseResult, TextItem, TokenUsage};

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    created_at: Option<f64>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesBody {
    /// First non-empty `output_text` of an assistant message.
    fn assistant_text(&self) -> Option<String> {
        self.output
            .iter()
            .filter(|item| item.kind.as_deref() == Some("message"))
            .filter(|item| item.role.as_deref() == Some("assistant"))
            .find_map(|item| {
                item.content
                    .iter()
                    .find(|part| part.kind.as_deref() == Some("output_text"))
                    .and_then(|part| part.text.as_deref())
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(ToString::to_string)
            })
    }
}

/// Client for generating a text response per prompt.
#[derive(Debug, Clone)]
pub struct ResponseClient {
    client: Client,
    base_url: String,
    model: String,
}

impl ResponseClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            model: config.models.response.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request a generated response for one prompt.
    pub async fn respond(&self, item: &TextItem) -> Result<ResponseResult, ResponseError> {
        let url = format!("{}/responses", self.base_url);
        let request = ResponsesRequest {
            model: &self.model,
            input: &item.text,
        };
        let error = |cause| ResponseError {
            index: item.index,
            cause,
        };

        let body: ResponsesBody = post_json(&self.client, &url, &request)
            .await
            .map_err(error)?;

        let text = body.assistant_text().ok_or_else(|| {
            error(ApiFailure::InvalidResponse(
                "no assistant output_text in response".to_string(),
            ))
        })?;

        Ok(ResponseResult {
            item: item.clone(),
            text,
            model: body.model.unwrap_or_else(|| self.model.clone()),
            response_id: body.id,
            created_at: body.created_at.map(|secs| secs as i64),
            usage: body.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::build_http_client;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> ResponseClient {
        let mut config = Config::default();
        config.api.base_url = base_url.to_string();
        ResponseClient::new(build_http_client(&config.api).unwrap(), &config)
    }

    fn reply(text: &str) -> Value {
        json!({
            "id": "resp_123",
            "object": "response",
            "created_at": 1_700_000_000,
            "model": "deepseek/deepseek-r1-0528-qwen3-8b",
            "output": [
                { "type": "reasoning", "content": [] },
                {
                    "type": "message",
                    "role": "assistant",
                    "content": [{ "type": "output_text", "text": text }]
                }
            ],
            "usage": { "input_tokens": 4, "output_tokens": 6, "total_tokens": 10 }
        })
    }

    #[tokio::test]
    async fn test_extracts_assistant_text_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("  Hi there!  ")))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .respond(&TextItem::new(2, "hello"))
            .await
            .unwrap();

        assert_eq!(result.text, "Hi there!");
        assert_eq!(result.item.index, 2);
        assert_eq!(result.response_id.as_deref(), Some("resp_123"));
        assert_eq!(result.created_at, Some(1_700_000_000));
        assert_eq!(result.usage.map(|u| u.total_tokens), Some(10));
        assert_eq!(result.model, "deepseek/deepseek-r1-0528-qwen3-8b");
    }

    #[tokio::test]
    async fn test_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("ok")))
            .mount(&server)
            .await;

        client(&server.uri())
            .respond(&TextItem::new(0, "what is rust?"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["input"], "what is rust?");
        assert_eq!(body["model"], "deepseek/deepseek-r1-0528-qwen3-8b");
    }

    #[tokio::test]
    async fn test_falls_back_to_configured_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": [{
                    "type": "message",
                    "role": "assistant",
                    "content": [{ "type": "output_text", "text": "yes" }]
                }]
            })))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let result = client.respond(&TextItem::new(0, "q")).await.unwrap();
        assert_eq!(result.model, client.model());
        assert!(result.usage.is_none());
    }

    #[tokio::test]
    async fn test_missing_message_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": [{ "type": "reasoning", "content": [] }]
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .respond(&TextItem::new(5, "q"))
            .await
            .unwrap_err();
        assert_eq!(err.index, 5);
        assert!(matches!(err.cause, ApiFailure::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_output_not_a_list_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "output": "text" })))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .respond(&TextItem::new(0, "q"))
            .await
            .unwrap_err();
        assert!(matches!(err.cause, ApiFailure::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "model not loaded" }
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .respond(&TextItem::new(0, "q"))
            .await
            .unwrap_err();
        match err.cause {
            ApiFailure::ServerError { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("model not loaded"));
            }
            other => panic!("unexpected cause: {other:?}"),
        }
    }
}
