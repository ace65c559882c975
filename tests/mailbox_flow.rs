mod common;

use std::time::Duration;

use futures::StreamExt;

use axum::http::{Method, StatusCode};
use common::{
    build_app, config_yaml, json_request, load_test_config, plain_request, read_json,
    request_with_bearer, LOCKED, UNLOCKED,
};
use serde_json::json;
use tower::ServiceExt;
use wishtree::state::AppState;
use wishtree::store::Store;
use wishtree::models::user::UserIdentity;

const NO_PROVIDER: &str = "http://127.0.0.1:9";

async fn owner_token(state: &AppState, uid: &str, name: &str) -> String {
    state
        .store
        .upsert_user(&UserIdentity {
            display_name: Some(name.to_string()),
            ..UserIdentity::bare(uid)
        })
        .await
        .unwrap();
    state
        .sessions
        .mint(uid, Default::default())
        .unwrap()
        .as_str()
        .to_string()
}

#[tokio::test]
async fn test_empty_sender_rejected_then_anonymous_stored() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, UNLOCKED));
    let (app, state) = build_app(config).await;

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/trees/kakao:42/messages",
            &json!({ "sender": "", "content": "Happy New Year", "isAnonymous": false }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.store.count_messages("kakao:42").await.unwrap(), 0);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/trees/kakao:42/messages",
            &json!({ "sender": "", "content": "Happy New Year", "isAnonymous": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = read_json(response).await["id"].as_str().unwrap().to_string();

    let stored = state
        .store
        .list_messages("kakao:42", Default::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].sender, "익명");
    assert_eq!(stored[0].envelope_type.get(), 1);
}

#[tokio::test]
async fn test_oversized_fields_are_rejected() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, UNLOCKED));
    let (app, state) = build_app(config).await;

    let too_long_sender = "가".repeat(21);
    let too_long_content = "a".repeat(1001);
    for body in [
        json!({ "sender": too_long_sender, "content": "hi" }),
        json!({ "sender": "Jisoo", "content": too_long_content }),
        json!({ "sender": "Jisoo", "content": "hi", "envelopeType": 7 }),
        json!({ "sender": "Jisoo", "content": "hi", "envelopeType": 300 }),
        json!({ "sender": "Jisoo", "content": "hi", "envelopeType": -1 }),
        json!({ "sender": 12, "content": "hi" }),
    ] {
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/trees/kakao:42/messages", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
        let error = read_json(response).await;
        assert!(error["error"].is_string(), "body {}", body);
    }
    assert_eq!(state.store.count_messages("kakao:42").await.unwrap(), 0);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/trees/kakao:42/messages",
            &json!({ "sender": "가".repeat(20), "content": "a".repeat(1000) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_tree_lookup_for_owner_and_orphan() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, UNLOCKED));
    let (app, state) = build_app(config).await;
    owner_token(&state, "kakao:42", "Minsu").await;

    app.clone()
        .oneshot(json_request(
            Method::POST,
            "/api/trees/nobody/messages",
            &json!({ "sender": "Jisoo", "content": "anyone there?" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(plain_request("/api/trees/kakao:42", Method::GET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["ownerId"], "kakao:42");
    assert_eq!(body["ownerName"], "Minsu");
    assert_eq!(body["messageCount"], 0);

    let response = app
        .oneshot(plain_request("/api/trees/nobody", Method::GET))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert!(body["ownerName"].is_null());
    assert_eq!(body["messageCount"], 1);
}

#[tokio::test]
async fn test_dashboard_before_unlock_withholds_content() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, LOCKED));
    let (app, state) = build_app(config).await;
    let token = owner_token(&state, "kakao:42", "Minsu").await;

    app.clone()
        .oneshot(json_request(
            Method::POST,
            "/api/trees/kakao:42/messages",
            &json!({ "sender": "Jisoo", "content": "Happy New Year", "envelopeType": 4 }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request_with_bearer("/api/my-tree", &token, Method::GET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["unlocked"], false);
    assert_eq!(body["sharePath"], "/tree/kakao:42");
    let message = &body["messages"][0];
    assert_eq!(message["locked"], true);
    assert!(message["content"].is_null());
    assert_eq!(message["sender"], "Jisoo");
    assert_eq!(message["envelopeType"], 4);
}

#[tokio::test]
async fn test_dashboard_after_unlock_lists_in_order() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, UNLOCKED));
    let (app, state) = build_app(config).await;
    let token = owner_token(&state, "kakao:42", "Minsu").await;

    for content in ["first", "second", "third"] {
        app.clone()
            .oneshot(json_request(
                Method::POST,
                "/api/trees/kakao:42/messages",
                &json!({ "sender": "Jisoo", "content": content }),
            ))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let response = app
        .oneshot(request_with_bearer("/api/my-tree", &token, Method::GET))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["unlocked"], true);
    let contents: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_disabled_store_write_is_service_unavailable() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, false, UNLOCKED));
    let (app, _) = build_app(config).await;

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/trees/kakao:42/messages",
            &json!({ "sender": "Jisoo", "content": "Happy New Year" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Sending the message failed, please try again");

    let response = app
        .oneshot(plain_request("/health", Method::GET))
        .await
        .unwrap();
    assert_eq!(read_json(response).await["store"], "disabled");
}

#[tokio::test]
async fn test_live_subscription_sees_new_messages() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, UNLOCKED));
    let (app, state) = build_app(config).await;

    let mut subscription = state.mailbox.subscribe_messages("kakao:42");
    assert!(subscription.next().await.unwrap().unwrap().is_empty());

    app.oneshot(json_request(
        Method::POST,
        "/api/trees/kakao:42/messages",
        &json!({ "sender": "Jisoo", "content": "Happy New Year" }),
    ))
    .await
    .unwrap();

    let snapshot = tokio::time::timeout(Duration::from_secs(1), subscription.next())
        .await
        .expect("subscription should see the write")
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].content, "Happy New Year");
}

#[tokio::test]
async fn test_providers_listing_hides_secrets() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, UNLOCKED));
    let (app, _) = build_app(config).await;

    let response = app
        .oneshot(plain_request("/providers", Method::GET))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["providers"][0]["name"], "kakao");
    assert_eq!(body["providers"][0]["login"], "/api/auth/kakao/authorize");
    assert!(!body.to_string().contains("test-client"));
}

async fn first_sse_frame(response: axum::http::Response<axum::body::Body>) -> String {
    let mut body = response.into_body().into_data_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(1), body.next())
        .await
        .expect("stream should emit a frame")
        .expect("stream ended early")
        .expect("frame should be readable");
    String::from_utf8(chunk.to_vec()).unwrap()
}

fn sse_data(frame: &str) -> serde_json::Value {
    let data = frame
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .expect("frame has a data line");
    serde_json::from_str(data.trim()).unwrap()
}

#[tokio::test]
async fn test_message_stream_requires_session() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, LOCKED));
    let (app, _) = build_app(config).await;

    let response = app
        .oneshot(plain_request("/api/my-tree/messages/stream", Method::GET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["www-authenticate"], "Bearer");
}

#[tokio::test]
async fn test_message_stream_sends_gated_snapshot() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, LOCKED));
    let (app, state) = build_app(config).await;
    let token = owner_token(&state, "kakao:42", "Minsu").await;

    app.clone()
        .oneshot(json_request(
            Method::POST,
            "/api/trees/kakao:42/messages",
            &json!({ "sender": "Jisoo", "content": "Happy New Year", "envelopeType": 5 }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(request_with_bearer(
            "/api/my-tree/messages/stream",
            &token,
            Method::GET,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let frame = first_sse_frame(response).await;
    assert!(frame.contains("event: messages"), "frame {:?}", frame);
    let messages = sse_data(&frame);
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["sender"], "Jisoo");
    assert_eq!(messages[0]["envelopeType"], 5);
    assert_eq!(messages[0]["locked"], true);
    assert!(messages[0]["content"].is_null());
}

#[tokio::test]
async fn test_message_stream_pushes_new_messages() {
    let config = load_test_config(&config_yaml(NO_PROVIDER, true, UNLOCKED));
    let (app, state) = build_app(config).await;
    let token = owner_token(&state, "kakao:42", "Minsu").await;

    let response = app
        .clone()
        .oneshot(request_with_bearer(
            "/api/my-tree/messages/stream",
            &token,
            Method::GET,
        ))
        .await
        .unwrap();
    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    let initial = sse_data(std::str::from_utf8(&first).unwrap());
    assert!(initial.as_array().unwrap().is_empty());

    app.oneshot(json_request(
        Method::POST,
        "/api/trees/kakao:42/messages",
        &json!({ "sender": "Jisoo", "content": "Happy New Year" }),
    ))
    .await
    .unwrap();

    let next = tokio::time::timeout(Duration::from_secs(1), body.next())
        .await
        .expect("stream should push the new set")
        .unwrap()
        .unwrap();
    let update = sse_data(std::str::from_utf8(&next).unwrap());
    assert_eq!(update[0]["content"], "Happy New Year");
    assert_eq!(update[0]["locked"], false);
}
