use std::time::Duration;

use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use url::Url;

use crate::engine::{InferenceEngine, TokenStream};
use crate::error::{Error, Result};
use crate::observability::{
    ENGINE_LOAD_ERRORS, ENGINE_LOADS, ENGINE_REQUEST_ERRORS, ENGINE_REQUESTS,
};
use crate::sse::process_sse;
use crate::types::{CompletionChunk, CompletionRequest, HealthStatus, ModelSpec, ServerProps};

/// Where a locally started llama.cpp server listens by default.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080/";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sampling parameters sent with every completion request.
///
/// `None` leaves the choice to the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingOptions {
    /// Maximum number of tokens to predict.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Top-k sampling limit.
    pub top_k: Option<u32>,
    /// Nucleus sampling threshold.
    pub top_p: Option<f32>,
    /// Strings that end generation.
    pub stop: Vec<String>,
}

/// An inference engine backed by a llama.cpp-compatible completion server.
///
/// The server owns the quantized weights and does tokenization, sampling and
/// generation.  This type attaches to it once with [`LlamaServer::load`] and
/// then submits prompts over loopback HTTP.
#[derive(Debug, Clone)]
pub struct LlamaServer {
    client: ReqwestClient,
    base_url: Url,
    model: ModelSpec,
    sampling: SamplingOptions,
    context_size: Option<u32>,
}

impl LlamaServer {
    /// Attach to the server at `base_url` and verify it serves `model`.
    ///
    /// Fails with [`Error::ModelLoad`] when the server is unreachable, still
    /// loading, or reports a different weights file.
    pub async fn load(base_url: &str, model: ModelSpec, sampling: SamplingOptions) -> Result<Self> {
        ENGINE_LOADS.click();
        let result = Self::attach(base_url, model, sampling).await;
        if let Err(err) = &result {
            ENGINE_LOAD_ERRORS.click();
            tracing::warn!(error = %err, "failed to load model");
        }
        result
    }

    async fn attach(base_url: &str, model: ModelSpec, sampling: SamplingOptions) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let client = ReqwestClient::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        let mut server = Self {
            client,
            base_url,
            model,
            sampling,
            context_size: None,
        };
        server.check_health().await?;
        server.check_model().await?;
        tracing::info!(
            model = %server.model,
            server = %server.base_url,
            context_size = ?server.context_size,
            "model ready"
        );
        Ok(server)
    }

    /// Returns the server's base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the sampling options sent with each request.
    pub fn sampling(&self) -> &SamplingOptions {
        &self.sampling
    }

    /// Returns the context window the server reported, if any.
    pub fn context_size(&self) -> Option<u32> {
        self.context_size
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn load_error(&self, message: impl Into<String>) -> Error {
        Error::model_load(message, Some(self.model.to_string()))
    }

    async fn check_health(&self) -> Result<()> {
        let url = self.endpoint("health")?;
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            self.load_error(format!("completion server unreachable at {url}: {e}"))
        })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(self.load_error(format!(
                "completion server is not ready ({status}): {}",
                error_message(&body)
            )));
        }
        let health = serde_json::from_str::<HealthStatus>(&body).unwrap_or_default();
        if !health.is_ok() {
            return Err(self.load_error(format!(
                "completion server is not ready: {}",
                health.status
            )));
        }
        Ok(())
    }

    async fn check_model(&mut self) -> Result<()> {
        let url = self.endpoint("props")?;
        let props = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                response.json::<ServerProps>().await.unwrap_or_default()
            }
            Ok(response) => {
                tracing::debug!(status = %response.status(), "server does not report props");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(error = %e, "server does not report props");
                return Ok(());
            }
        };
        self.context_size = props.n_ctx;
        match props.model_path {
            Some(path) if !self.model.matches_path(&path) => Err(self.load_error(format!(
                "server has {path} loaded, expected {}",
                self.model.file
            ))),
            _ => Ok(()),
        }
    }

    fn request_for(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest::streaming(prompt)
            .with_n_predict(self.sampling.max_tokens)
            .with_temperature(self.sampling.temperature)
            .with_top_k(self.sampling.top_k)
            .with_top_p(self.sampling.top_p)
            .with_stop(self.sampling.stop.clone())
    }

    /// Process error responses and convert them to our Error type.
    async fn process_error_response(&self, response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };
        let message = error_message(&body);
        match status_code {
            408 => Error::timeout(message, None),
            503 => self.load_error(message),
            _ => Error::api(status_code, message),
        }
    }
}

#[async_trait::async_trait]
impl InferenceEngine for LlamaServer {
    fn model(&self) -> &ModelSpec {
        &self.model
    }

    async fn stream_complete(&self, prompt: &str) -> Result<TokenStream> {
        let url = self.endpoint("completion")?;
        let request = self.request_for(prompt);
        ENGINE_REQUESTS.click();
        tracing::debug!(prompt_bytes = prompt.len(), "submitting completion");

        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ENGINE_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(format!("Request timed out: {e}"), None)
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            ENGINE_REQUEST_ERRORS.click();
            return Err(self.process_error_response(response).await);
        }

        Ok(tokens(process_sse(response.bytes_stream())))
    }
}

/// Turn a stream of completion chunks into a stream of text tokens.
///
/// Empty chunks are skipped.  The token stream ends after the chunk flagged
/// `stop`; a chunk stream that ends without one yields a streaming error.
pub fn tokens<S>(chunks: S) -> TokenStream
where
    S: Stream<Item = Result<CompletionChunk>> + Send + 'static,
{
    Box::pin(stream::unfold(
        Some(Box::pin(chunks)),
        |state| async move {
            let mut chunks = state?;
            loop {
                match chunks.next().await {
                    Some(Ok(chunk)) => {
                        if !chunk.content.is_empty() {
                            let next = if chunk.stop { None } else { Some(chunks) };
                            return Some((Ok(chunk.content), next));
                        }
                        if chunk.stop {
                            return None;
                        }
                    }
                    Some(Err(e)) => return Some((Err(e), None)),
                    None => {
                        return Some((
                            Err(Error::streaming(
                                "stream ended before the server signalled completion",
                                None,
                            )),
                            None,
                        ));
                    }
                }
            }
        },
    ))
}

fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Pull a message out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorDetail {
        Object { message: String },
        Text(String),
    }

    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            error: Some(ErrorDetail::Object { message } | ErrorDetail::Text(message)),
        }) => message,
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mockito::Matcher;
    use serde_json::json;

    async fn ready_server(props: &str) -> (mockito::ServerGuard, Vec<mockito::Mock>) {
        let mut server = mockito::Server::new_async().await;
        let health = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;
        let props = server
            .mock("GET", "/props")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(props)
            .create_async()
            .await;
        (server, vec![health, props])
    }

    async fn collect(mut stream: TokenStream) -> Vec<Result<String>> {
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = normalize_base_url("http://127.0.0.1:8080").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/");
        let url = normalize_base_url("http://localhost:9000/llama").unwrap();
        assert_eq!(url.join("completion").unwrap().as_str(), "http://localhost:9000/llama/completion");
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"code":400,"message":"bad prompt"}}"#),
            "bad prompt"
        );
        assert_eq!(error_message(r#"{"error":"Loading model"}"#), "Loading model");
        assert_eq!(error_message("plain text\n"), "plain text");
    }

    #[tokio::test]
    async fn load_accepts_matching_model() {
        let (server, _mocks) =
            ready_server(r#"{"model_path":"/models/orca-mini-3b.q4_0.gguf","n_ctx":2048}"#).await;
        let engine = LlamaServer::load(&server.url(), ModelSpec::default(), SamplingOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.model(), &ModelSpec::default());
        assert_eq!(engine.context_size(), Some(2048));
    }

    #[tokio::test]
    async fn load_rejects_other_model() {
        let (server, _mocks) = ready_server(r#"{"model_path":"/models/llama-2-7b.Q4_K_M.gguf"}"#).await;
        let err = LlamaServer::load(&server.url(), ModelSpec::default(), SamplingOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_model_load());
        assert!(err.to_string().contains("llama-2-7b.Q4_K_M.gguf"));
    }

    #[tokio::test]
    async fn load_tolerates_missing_props() {
        let mut server = mockito::Server::new_async().await;
        let _health = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;
        let _props = server
            .mock("GET", "/props")
            .with_status(404)
            .create_async()
            .await;
        let engine = LlamaServer::load(&server.url(), ModelSpec::default(), SamplingOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.context_size(), None);
    }

    #[tokio::test]
    async fn load_fails_while_model_loading() {
        let mut server = mockito::Server::new_async().await;
        let _health = server
            .mock("GET", "/health")
            .with_status(503)
            .with_body(r#"{"error":{"code":503,"message":"Loading model","type":"unavailable_error"}}"#)
            .create_async()
            .await;
        let err = LlamaServer::load(&server.url(), ModelSpec::default(), SamplingOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_model_load());
        assert!(err.to_string().contains("Loading model"));
    }

    #[tokio::test]
    async fn load_fails_when_unreachable() {
        let err = LlamaServer::load(
            "http://127.0.0.1:1/",
            ModelSpec::default(),
            SamplingOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(err.is_model_load());
    }

    #[tokio::test]
    async fn stream_complete_yields_tokens() {
        let (mut server, _mocks) = ready_server("{}").await;
        let completion = server
            .mock("POST", "/completion")
            .match_body(Matcher::PartialJson(json!({
                "prompt": "hello",
                "stream": true,
                "n_predict": 32,
                "temperature": 0.25
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"content\":\"Ber\",\"stop\":false}\n\n\
                 data: {\"content\":\"lin\",\"stop\":false}\n\n\
                 data: {\"content\":\".\",\"stop\":false}\n\n\
                 data: {\"content\":\"\",\"stop\":true,\"tokens_predicted\":3}\n\n",
            )
            .create_async()
            .await;

        let sampling = SamplingOptions {
            max_tokens: Some(32),
            temperature: Some(0.25),
            ..SamplingOptions::default()
        };
        let engine = LlamaServer::load(&server.url(), ModelSpec::default(), sampling)
            .await
            .unwrap();
        let tokens: Vec<String> = collect(engine.stream_complete("hello").await.unwrap())
            .await
            .into_iter()
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(tokens, vec!["Ber", "lin", "."]);
        completion.assert_async().await;
    }

    #[tokio::test]
    async fn stream_complete_maps_error_status() {
        let (mut server, _mocks) = ready_server("{}").await;
        let _completion = server
            .mock("POST", "/completion")
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"the request exceeds the available context size"}}"#)
            .create_async()
            .await;
        let engine = LlamaServer::load(&server.url(), ModelSpec::default(), SamplingOptions::default())
            .await
            .unwrap();
        let err = match engine.stream_complete("x").await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("context size"));
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let (mut server, _mocks) = ready_server("{}").await;
        let _completion = server
            .mock("POST", "/completion")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: {\"content\":\"Ber\",\"stop\":false}\n\n")
            .create_async()
            .await;
        let engine = LlamaServer::load(&server.url(), ModelSpec::default(), SamplingOptions::default())
            .await
            .unwrap();
        let items = collect(engine.stream_complete("x").await.unwrap()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Ber");
        assert!(items[1].as_ref().unwrap_err().is_streaming());
    }

    #[tokio::test]
    async fn tokens_stop_after_final_chunk() {
        let chunks = futures::stream::iter(vec![
            Ok(CompletionChunk::text("a")),
            Ok(CompletionChunk {
                content: "b".to_string(),
                stop: true,
                ..CompletionChunk::default()
            }),
            Ok(CompletionChunk::text("never")),
        ]);
        let items: Vec<String> = collect(tokens(chunks))
            .await
            .into_iter()
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn tokens_stop_at_first_error() {
        let chunks = futures::stream::iter(vec![
            Err(Error::streaming("connection reset", None)),
            Ok(CompletionChunk::text("never")),
        ]);
        let items = collect(tokens(chunks)).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
