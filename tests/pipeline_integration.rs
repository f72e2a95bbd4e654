//! End-to-end pipeline tests: mock document store + mock chat service

mod common;

use common::*;
use ragrelay::rag::{RagPipeline, RetrievalFailurePolicy};
use ragrelay::types::{Message, MessageHistory, Prompt};
use ragrelay::RagError;
use std::time::Duration;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_conda_question_is_grounded_in_context() {
    let server = MockServer::start().await;
    mock_query(&server, &[("Run `conda activate myenv`", 0.9)]).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(QuotingCompletion)
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = RagPipeline::from_config(&test_config(&server)).unwrap();
    let answer = assert_ok!(
        pipeline
            .answer(&Prompt::from("How do I activate Conda?"), None)
            .await
    );

    assert!(answer.as_str().contains("conda activate"));
    assert_eq!(answer.as_str(), answer.as_str().trim());

    let queries = request_bodies(&server, "/query").await;
    assert_eq!(queries[0]["queries"][0]["query"], "How do I activate Conda?");
    assert_eq!(queries[0]["queries"][0]["top_k"], 3);
    assert!(queries[0]["queries"][0].get("filter").is_none());
}

#[tokio::test]
async fn test_retrieval_timeouts_are_transparent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(query_response(&[("too late", 0.9)]))
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mock_query(&server, &[("Run `conda activate myenv`", 0.9)]).await;
    mock_completion(&server, "Use conda activate myenv.").await;

    let pipeline = RagPipeline::from_config(&test_config(&server)).unwrap();
    let answer = assert_ok!(
        pipeline
            .answer(&Prompt::from("How do I activate Conda?"), None)
            .await
    );

    assert_eq!(answer.as_str(), "Use conda activate myenv.");
    assert_eq!(request_bodies(&server, "/query").await.len(), 3);
}

#[tokio::test]
async fn test_zero_chunks_sends_only_system_and_user() {
    let server = MockServer::start().await;
    mock_query(&server, &[]).await;
    mock_completion(&server, "I do not know.").await;

    let pipeline = RagPipeline::from_config(&test_config(&server)).unwrap();
    let answer = assert_ok!(pipeline.answer(&Prompt::from("Anything?"), None).await);
    assert!(!answer.as_str().is_empty());

    let completions = request_bodies(&server, "/chat/completions").await;
    assert_eq!(completions.len(), 1);
    let messages = completions[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "Anything?");
}

#[tokio::test]
async fn test_prior_history_comes_first() {
    let server = MockServer::start().await;
    mock_query(&server, &[("chunk", 0.5)]).await;
    mock_completion(&server, "ok").await;

    let prior = MessageHistory::from(vec![
        Message::user("Hi"),
        Message::assistant("Hello!"),
    ]);
    let pipeline = RagPipeline::from_config(&test_config(&server)).unwrap();
    assert_ok!(pipeline.answer(&Prompt::from("And now?"), Some(prior)).await);

    let completions = request_bodies(&server, "/chat/completions").await;
    let roles: Vec<&str> = completions[0]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "assistant", "system", "system", "user"]);
}

#[tokio::test]
async fn test_retrieval_failure_skips_generation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let pipeline = RagPipeline::from_config(&test_config(&server)).unwrap();
    let err = pipeline.answer(&Prompt::from("q"), None).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_proceed_policy_answers_without_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mock_completion(&server, "general answer").await;

    let mut config = test_config(&server);
    config.pipeline.on_retrieval_failure = RetrievalFailurePolicy::ProceedWithoutContext;
    let pipeline = RagPipeline::from_config(&config).unwrap();

    let answer = assert_ok!(pipeline.answer(&Prompt::from("q"), None).await);
    assert_eq!(answer.as_str(), "general answer");
}

#[tokio::test]
async fn test_cancellation_stops_pending_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.retry.min_delay_ms = 10_000;
    config.retry.max_delay_ms = 20_000;

    let token = CancellationToken::new();
    let pipeline = RagPipeline::from_config_with_cancellation(&config, token.clone()).unwrap();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = pipeline.answer(&Prompt::from("q"), None).await.unwrap_err();
    assert!(matches!(err, RagError::Cancelled));
}

#[tokio::test]
async fn test_proceed_policy_still_surfaces_missing_datastore_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.datastore.query_url = None;
    config.pipeline.on_retrieval_failure = RetrievalFailurePolicy::ProceedWithoutContext;
    let pipeline = RagPipeline::from_config(&config).unwrap();

    let err = pipeline.answer(&Prompt::from("q"), None).await.unwrap_err();
    assert!(matches!(err, RagError::Config(_)));
}
