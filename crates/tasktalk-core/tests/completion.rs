use serde_json::json;
use tasktalk_core::ai::{CompletionSource, GeminiClient, OllamaClient};
use tasktalk_core::state::{CompletionResult, Prompt};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }, { "text": "ignored" }] }
        }]
    })
}

#[tokio::test]
async fn gemini_sends_generation_settings_and_reads_first_part() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": {
                "temperature": 0.9,
                "topK": 1,
                "topP": 1.0,
                "maxOutputTokens": 2048
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::new("test-key", "gemini-pro").with_base_url(&server.uri());
    let result = client.complete(&Prompt::Structured("Hello".to_string())).await;
    assert_eq!(result, CompletionResult::Success("Hi there".to_string()));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    let parts = contents[0]["parts"].as_array().unwrap();
    assert_eq!(parts.last().unwrap()["text"], "Response: ");
    assert_eq!(parts[parts.len() - 2]["text"], "Request: Hello");

    let safety = body["safetySettings"].as_array().unwrap();
    assert_eq!(safety.len(), 4);
    assert!(safety
        .iter()
        .all(|s| s["threshold"] == "BLOCK_MEDIUM_AND_ABOVE"));
}

#[tokio::test]
async fn gemini_chat_prompt_sends_history_then_user_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Sunny")))
        .mount(&server)
        .await;

    let client = GeminiClient::new("k", "gemini-pro").with_base_url(&server.uri());
    let text = client
        .generate(&Prompt::Freeform("What's the weather".to_string()))
        .await
        .unwrap();
    assert_eq!(text, "Sunny");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 5);
    assert_eq!(contents[4]["role"], "user");
    assert_eq!(contents[4]["parts"][0]["text"], "What's the weather");
}

#[tokio::test]
async fn gemini_errors_become_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid" }
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::new("bad", "gemini-pro").with_base_url(&server.uri());
    match client.complete(&Prompt::Structured("Hello".to_string())).await {
        CompletionResult::Failure(message) => assert!(message.contains("API key not valid")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn gemini_without_candidates_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::new("k", "gemini-pro").with_base_url(&server.uri());
    let result = client.complete(&Prompt::Freeform("...".to_string())).await;
    assert!(matches!(result, CompletionResult::Failure(m) if m.contains("SAFETY")));
}

#[tokio::test]
async fn ollama_generate_trims_the_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "gemma3:latest", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "  You should say \"I went home\".\n",
            "done": true
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&server.uri(), "gemma3:latest");
    let result = client.complete(&Prompt::Structured("I goed home".to_string())).await;
    assert_eq!(
        result,
        CompletionResult::Success("You should say \"I went home\".".to_string())
    );
}
