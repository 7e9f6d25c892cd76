//! `POST /api/suggestions`

mod common;

use axum::http::StatusCode;
use common::create_test_app;
use dastyar_server::llm::ModelTier;
use serde_json::{json, Value};

#[tokio::test]
async fn test_three_suggestions_from_fast_model() {
    let app = create_test_app();
    app.model
        .set_generated(Some("```json\n[\"rust ownership\", \"rust borrow checker\", \"rust lifetimes\"]\n```"));

    let response = app.server.post("/api/suggestions").json(&json!({ "query": "rust" })).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(
        body["suggestions"],
        json!(["rust ownership", "rust borrow checker", "rust lifetimes"])
    );

    let request = app.model.last_request();
    assert_eq!(request.tier, ModelTier::Fast);
    assert!(request.json_output);
    assert_eq!(request.messages[0].content, "query: rust");
}

#[tokio::test]
async fn test_unusable_output_gives_no_suggestions() {
    let app = create_test_app();

    for output in [r#"["only", "two"]"#, "no idea", r#"{"suggestions": ["a", "b", "c"]}"#] {
        app.model.set_generated(Some(output));
        let body: Value = app
            .server
            .post("/api/suggestions")
            .json(&json!({ "query": "weather" }))
            .await
            .json();
        assert_eq!(body["suggestions"], json!([]), "output: {output}");
    }
}

#[tokio::test]
async fn test_query_is_required() {
    let app = create_test_app();

    for body in [json!({}), json!({ "query": "   " }), json!({ "query": 42 })] {
        let response = app.server.post("/api/suggestions").json(&body).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "body: {body}");
    }
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let app = create_test_app();
    app.model.set_generated(None);

    let response = app.server.post("/api/suggestions").json(&json!({ "query": "news" })).await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
}
