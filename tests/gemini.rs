use mockito::Matcher;
use pdf_chat_rag::completion::CompletionService;
use pdf_chat_rag::embeddings::Embedder;
use pdf_chat_rag::error::RagError;
use pdf_chat_rag::gemini::{GeminiClient, GeminiConfig};
use serde_json::json;

fn client_for(server: &mockito::ServerGuard) -> GeminiClient {
    let mut config = GeminiConfig::with_api_key("test-key");
    config.base_url = server.url();
    GeminiClient::new(config)
}

#[tokio::test]
async fn test_generate_sends_prompt_and_parameters() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-flash-latest:generateContent")
        .match_header("x-goog-api-key", "test-key")
        .match_query(Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({
            "contents": [{"role": "user", "parts": [{"text": "Say hi"}]}],
            "generationConfig": {
                "temperature": 0.7,
                "topP": 1.0,
                "topK": 32,
                "maxOutputTokens": 4096
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Hi "}, {"text": "there"}], "role": "model"}
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let reply = client_for(&server).complete("Say hi").await.unwrap();

    assert_eq!(reply, "Hi there");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_service_unavailable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/models/gemini-flash-latest:generateContent")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body("quota exhausted")
        .create_async()
        .await;

    let err = client_for(&server).complete("hello").await.unwrap_err();

    match err {
        RagError::ServiceUnavailable(detail) => assert!(detail.contains("quota exhausted")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_candidates_is_service_unavailable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/models/gemini-flash-latest:generateContent")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates": []}"#)
        .create_async()
        .await;

    let err = client_for(&server).complete("hello").await.unwrap_err();
    assert!(matches!(err, RagError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_missing_api_key_fails_without_a_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut config = GeminiConfig::with_api_key("unused");
    config.api_key = None;
    config.base_url = server.url();
    let client = GeminiClient::new(config);

    let err = client.complete("hello").await.unwrap_err();
    assert!(matches!(err, RagError::ServiceUnavailable(_)));
    let err = client.embed("hello").await.unwrap_err();
    assert!(matches!(err, RagError::ServiceUnavailable(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_embed_single_text() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/models/text-embedding-004:embedContent")
        .match_header("x-goog-api-key", "test-key")
        .match_query(Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({
            "model": "models/text-embedding-004",
            "content": {"parts": [{"text": "garlic"}]}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"embedding": {"values": [0.5, -0.25, 1.0]}}"#)
        .create_async()
        .await;

    let embedding = client_for(&server).embed("garlic").await.unwrap();
    assert_eq!(embedding.values, vec![0.5, -0.25, 1.0]);
}

#[tokio::test]
async fn test_embed_batch_preserves_order() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/models/text-embedding-004:batchEmbedContents")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "requests": [
                {"model": "models/text-embedding-004", "content": {"parts": [{"text": "one"}]}},
                {"model": "models/text-embedding-004", "content": {"parts": [{"text": "two"}]}}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"embeddings": [{"values": [1.0]}, {"values": [2.0]}]}"#)
        .create_async()
        .await;

    let texts = vec!["one".to_string(), "two".to_string()];
    let embeddings = client_for(&server).embed_batch(&texts).await.unwrap();

    let values: Vec<Vec<f32>> = embeddings.into_iter().map(|e| e.values).collect();
    assert_eq!(values, vec![vec![1.0], vec![2.0]]);
}

#[tokio::test]
async fn test_short_batch_response_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/models/text-embedding-004:batchEmbedContents")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"embeddings": [{"values": [1.0]}]}"#)
        .create_async()
        .await;

    let texts = vec!["one".to_string(), "two".to_string()];
    let err = client_for(&server).embed_batch(&texts).await.unwrap_err();
    assert!(matches!(err, RagError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_transport_error_does_not_expose_api_key() {
    let mut config = GeminiConfig::with_api_key("SECRET-KEY-123");
    config.base_url = "http://127.0.0.1:1".to_string();
    let client = GeminiClient::new(config);

    let err = client.complete("hi").await.unwrap_err();

    assert!(matches!(err, RagError::ServiceUnavailable(_)));
    assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);
    let err = client.embed("hi").await.unwrap_err();
    assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);
}
