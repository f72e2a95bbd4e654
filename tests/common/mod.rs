//! Shared fixtures for HTTP integration tests
//!
//! Every test gets its own wiremock server standing in for both the
//! document store (`POST /query`) and the chat service
//! (`POST /chat/completions`).

#![allow(dead_code)]

use ragrelay::config::Config;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TOKEN: &str = "test1234";
pub const API_KEY: &str = "sk-test";

/// Config pointing both services at `server`, with millisecond backoff
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.datastore.query_url = Some(format!("{}/query", server.uri()));
    config.datastore.bearer_token = Some(TOKEN.to_string());
    config.datastore.timeout_secs = 1;
    config.chat.api_base = server.uri();
    config.chat.api_key = Some(API_KEY.to_string());
    config.chat.timeout_secs = 1;
    config.retry.min_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config.retry.max_attempts = 3;
    config
}

/// Document store response body for a single query
pub fn query_response(chunks: &[(&str, f32)]) -> Value {
    let results: Vec<Value> = chunks
        .iter()
        .enumerate()
        .map(|(idx, (text, score))| {
            json!({
                "id": format!("chunk-{}", idx),
                "text": text,
                "score": score,
                "metadata": { "source": "file", "source_id": format!("doc-{}.md", idx) }
            })
        })
        .collect();

    json!({ "results": [{ "query": "test", "results": results }] })
}

/// Chat completion response body with a single choice
pub fn completion_response(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

/// Mount a document store answering every query with `chunks`
pub async fn mock_query(server: &MockServer, chunks: &[(&str, f32)]) {
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(chunks)))
        .mount(server)
        .await;
}

/// Mount a chat service that always answers `content`
pub async fn mock_completion(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_response(content)))
        .mount(server)
        .await;
}

/// Chat service that answers by quoting the first context message it was sent
pub struct QuotingCompletion;

impl Respond for QuotingCompletion {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match request.body_json() {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };

        let quoted = body["messages"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|m| m["content"].as_str())
            .find(|content| content.starts_with("[Context"))
            .and_then(|content| content.lines().nth(1))
            .unwrap_or("I do not know.");

        ResponseTemplate::new(200)
            .set_body_json(completion_response(&format!("  According to the docs: {}\n", quoted)))
    }
}

/// Bodies of every request the server received on `route`
pub async fn request_bodies(server: &MockServer, route: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .filter_map(|r| serde_json::from_slice(&r.body).ok())
        .collect()
}
