//! Integration tests for the OpenAI-compatible client.
//!
//! These tests make real API calls.
//! Run with: OPENAI_API_KEY=your_key cargo test --test llm_integration -- --ignored

use std::sync::Arc;

use persona_forge::llm::{
    CompletionClient, GenerationRequest, LlmProvider, Message, OpenAiClient,
};
use persona_forge::utils::{extract_record, non_empty_string, RecordSchema};

fn test_model() -> String {
    std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())
}

fn create_test_client() -> OpenAiClient {
    OpenAiClient::from_env()
        .expect("OPENAI_API_KEY environment variable must be set for integration tests")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = create_test_client();

    let request = GenerationRequest::new(
        test_model(),
        vec![Message::user("What is 2 + 2? Reply with just the number.")],
    )
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(
        content.contains('4'),
        "Response should contain '4', got: {}",
        content
    );
}

#[tokio::test]
#[ignore]
async fn test_persona_style_completion_is_extractable() {
    let client = CompletionClient::new(Arc::new(create_test_client()), test_model());

    let prompt = "Invent a person who is a retired teacher. Reply only with JSON of the form \
        {\"name\": \"<name>\", \"description\": \"<one sentence>\"}";
    let text = client
        .complete(prompt, 0.7)
        .await
        .expect("completion should succeed");

    let schema = RecordSchema::new()
        .field("name", non_empty_string)
        .field("description", non_empty_string);
    let record = extract_record(&text, &schema);
    assert!(record.is_ok(), "Reply was not a persona record: {}", text);
}

#[tokio::test]
#[ignore]
async fn test_invalid_api_key() {
    let client = OpenAiClient::new(
        persona_forge::llm::DEFAULT_API_BASE,
        Some("invalid-key-12345".to_string()),
        test_model(),
    )
    .expect("client builds");

    let request = GenerationRequest::new(test_model(), vec![Message::user("Hello")]);
    let response = client.generate(request).await;
    assert!(response.is_err(), "Should fail with invalid API key");
}
