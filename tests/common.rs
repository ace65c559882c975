#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response};
use axum::Router;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde_json::Value;
use wishtree::config::{parse_config, ConfigV1};
use wishtree::routes::create_router;
use wishtree::startup::build_state;
use wishtree::state::AppState;

pub const PRIVATE_KEY: &str = include_str!("fixtures/session_private.pem");
pub const PUBLIC_KEY: &str = include_str!("fixtures/session_public.pem");

/// Before every test instant.
pub const UNLOCKED: &str = "2000-01-01T00:00:00Z";
/// After every test instant.
pub const LOCKED: &str = "2999-01-01T00:00:00Z";

fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.trim_end()
        .lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A complete config with one Kakao provider pointing at `kakao_url`.
pub fn config_yaml(kakao_url: &str, store_enabled: bool, unlock_at: &str) -> String {
    format!(
        r#"
version: "1.0.0"
bind_address: "127.0.0.1:0"
logging:
  level: "debug"
  format: "console"
providers:
  - type: "kakao"
    name: "kakao"
    client_id: "test-client"
    redirect_uri: "http://localhost:3000/auth/kakao"
    authorize_url: "{url}/oauth/authorize"
    token_url: "{url}/oauth/token"
    profile_url: "{url}/v2/user/me"
    timeout_in_ms: 3000
backend:
  project_id: "wishtree-test"
  client_email: "svc@wishtree-test.iam"
  private_key: |
{private_key}
  public_key: |
{public_key}
store:
  enabled: {store_enabled}
  type: "memory"
mailbox:
  unlock_at: "{unlock_at}"
  order: "asc"
"#,
        url = kakao_url,
        private_key = indent(PRIVATE_KEY, 4),
        public_key = indent(PUBLIC_KEY, 4),
        store_enabled = store_enabled,
        unlock_at = unlock_at,
    )
}

pub fn load_test_config(yaml: &str) -> ConfigV1 {
    parse_config(Figment::new().merge(Yaml::string(yaml))).expect("test config should parse")
}

pub async fn build_app(config: ConfigV1) -> (Router, AppState) {
    let state = build_state(Arc::new(config))
        .await
        .expect("state should build");
    (create_router(state.clone()), state)
}

fn with_connect_info(mut request: Request<Body>) -> Request<Body> {
    request.extensions_mut().insert(ConnectInfo(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        0,
    )));
    request
}

pub fn json_request(method: Method, path: &str, body: &Value) -> Request<Body> {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request");
    with_connect_info(request)
}

pub fn request_with_bearer(path: &str, token: &str, method: Method) -> Request<Body> {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .expect("failed to build request");
    with_connect_info(request)
}

pub fn plain_request(path: &str, method: Method) -> Request<Body> {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request");
    with_connect_info(request)
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
