//! Embedding client for the OpenAI-compatible `/embeddings` endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::post_json;
use crate::error::{ApiFailure, EmbeddingError};
use crate::models::{Config, TextItem};

/// Request body for the /embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from the /embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Client for generating embeddings in batches.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl EmbeddingClient {
    /// Create a client on top of a shared HTTP client.
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            model: config.models.embedding.clone(),
            batch_size: config.processing.batch_size.max(1),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Split items into the consecutive chunks sent as one request each.
    pub fn chunks<'a>(&self, items: &'a [TextItem]) -> std::slice::Chunks<'a, TextItem> {
        items.chunks(self.batch_size)
    }

    /// Embed every text, one request per chunk, stopping at the first failure.
    ///
    /// Vectors come back in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for (n, chunk) in texts.chunks(self.batch_size).enumerate() {
            let embeddings = self.embed_chunk(chunk, n * self.batch_size).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    /// Embed one chunk with a single request. `start_index` is the position of
    /// the chunk's first text in the whole input, used for error reporting.
    pub async fn embed_chunk(
        &self,
        texts: &[String],
        start_index: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbeddingResponse = post_json(&self.client, &url, &request)
            .await
            .map_err(|cause| EmbeddingError { start_index, cause })?;

        order_vectors(response.data, texts.len())
            .map_err(|cause| EmbeddingError { start_index, cause })
    }
}

/// Put vectors in request order and check there is exactly one per text.
fn order_vectors(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>, ApiFailure> {
    if data.len() != expected {
        return Err(ApiFailure::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }

    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != Some(i)) {
            return Err(ApiFailure::InvalidResponse(
                "embedding indices do not match the request".to_string(),
            ));
        }
    }

    if let Some(position) = data.iter().position(|d| d.embedding.is_empty()) {
        return Err(ApiFailure::InvalidResponse(format!(
            "empty embedding vector at position {position}"
        )));
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiConfig;
    use crate::services::build_http_client;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Answers each request with one vector per input, `[len(text), position]`.
    struct EchoEmbeddings;

    impl Respond for EchoEmbeddings {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            let data: Vec<Value> = body["input"]
                .as_array()
                .unwrap()
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    let len = text.as_str().unwrap().len() as f32;
                    json!({ "object": "embedding", "index": i, "embedding": [len, i as f32] })
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({ "object": "list", "data": data }))
        }
    }

    fn config(base_url: &str, batch_size: usize) -> Config {
        let mut config = Config::default();
        config.api.base_url = base_url.to_string();
        config.processing.batch_size = batch_size;
        config
    }

    fn client(base_url: &str, batch_size: usize) -> EmbeddingClient {
        let config = config(base_url, batch_size);
        EmbeddingClient::new(build_http_client(&config.api).unwrap(), &config)
    }

    /// Base URL of a local port with no listener.
    fn unreachable_uri() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}/v1")
    }

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    async fn request_sizes(server: &MockServer) -> Vec<usize> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                body["input"].as_array().unwrap().len()
            })
            .collect()
    }

    #[test]
    fn test_base_url_trimming() {
        let client = client("http://localhost:5000/v1/", 4);
        assert_eq!(client.base_url, "http://localhost:5000/v1");
    }

    #[tokio::test]
    async fn test_one_vector_per_text_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(EchoEmbeddings)
            .mount(&server)
            .await;

        let client = client(&server.uri(), 16);
        let vectors = client.embed(&texts(&["a", "bbb", "cc"])).await.unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![3.0, 1.0], vec![2.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_request_carries_model_and_texts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(EchoEmbeddings)
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri(), 16);
        client.embed(&texts(&["hello", "world"])).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["model"], "text-embedding-3-small");
        assert_eq!(body["input"], json!(["hello", "world"]));
    }

    #[tokio::test]
    async fn test_batches_bound_request_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(EchoEmbeddings)
            .expect(3)
            .mount(&server)
            .await;

        let client = client(&server.uri(), 2);
        let vectors = client
            .embed(&texts(&["a", "b", "c", "d", "e"]))
            .await
            .unwrap();

        assert_eq!(vectors.len(), 5);
        assert_eq!(request_sizes(&server).await, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_batching_is_transparent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(EchoEmbeddings)
            .mount(&server)
            .await;

        let input = texts(&["alpha", "be", "gamma", "d", "epsilon", "zeta", "et"]);
        let whole = client(&server.uri(), input.len())
            .embed(&input)
            .await
            .unwrap();

        for batch_size in 1..input.len() {
            let mut chunked = Vec::new();
            let client = client(&server.uri(), batch_size);
            for (n, chunk) in input.chunks(batch_size).enumerate() {
                chunked.extend(client.embed_chunk(chunk, n * batch_size).await.unwrap());
            }
            let lengths: Vec<f32> = chunked.iter().map(|v| v[0]).collect();
            let expected: Vec<f32> = whole.iter().map(|v| v[0]).collect();
            assert_eq!(lengths, expected, "batch size {batch_size}");
        }
    }

    #[tokio::test]
    async fn test_out_of_order_data_is_sorted_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.4, 0.5] },
                    { "index": 0, "embedding": [0.1, 0.2] }
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server.uri(), 16);
        let vectors = client.embed(&texts(&["x", "y"])).await.unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.4, 0.5]]);
    }

    #[tokio::test]
    async fn test_bearer_token_sent_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(EchoEmbeddings)
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config(&server.uri(), 16);
        config.api.api_key = Some("sk-test".to_string());
        let client = EmbeddingClient::new(build_http_client(&config.api).unwrap(), &config);

        client.embed(&texts(&["secret"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_auth_header_without_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(EchoEmbeddings)
            .mount(&server)
            .await;

        let client = client(&server.uri(), 16);
        client.embed(&texts(&["open"])).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_server_error_carries_start_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let client = client(&server.uri(), 2);
        let err = client
            .embed_chunk(&texts(&["c", "d"]), 2)
            .await
            .unwrap_err();

        assert_eq!(err.start_index, 2);
        match err.cause {
            ApiFailure::ServerError { status, ref body } => {
                assert_eq!(status, 500);
                assert!(body.contains("model crashed"));
            }
            ref other => panic!("unexpected cause: {other:?}"),
        }
        assert!(!crate::error::ConnectionLevel::is_connection_level(&err));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "index": 0, "embedding": [0.1] }]
            })))
            .mount(&server)
            .await;

        let client = client(&server.uri(), 16);
        let err = client.embed(&texts(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err.cause, ApiFailure::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let client = client(&server.uri(), 16);
        let err = client.embed(&texts(&["a"])).await.unwrap_err();
        assert!(matches!(err.cause, ApiFailure::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_level() {
        let client = client(&unreachable_uri(), 16);
        let err = client.embed(&texts(&["a"])).await.unwrap_err();
        assert!(crate::error::ConnectionLevel::is_connection_level(&err));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(EchoEmbeddings)
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server.uri(), 4);
        assert!(client.embed(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_chunks_follow_batch_size() {
        let client = client("http://localhost:5000/v1", 2);
        let items: Vec<TextItem> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, t)| TextItem::new(i, *t))
            .collect();
        let sizes: Vec<usize> = client.chunks(&items).map(<[TextItem]>::len).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_api_config_default_timeout() {
        assert_eq!(ApiConfig::default().timeout_secs, 900);
    }
}
