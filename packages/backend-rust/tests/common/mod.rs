#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use flashcard_backend::auth::sign_jwt_with_secret;
use flashcard_backend::config::Config;
use flashcard_backend::store::{Card, Group, MemoryStore, StudyStore, UserId};

pub const TEST_SECRET: &str = "integration-test-secret";

/// Cards 1..=6; group 10 holds 1..=3, group 20 holds 3..=5.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for id in 1..=6 {
        store.insert_card(Card {
            id,
            gloss: format!("SIGN {id}"),
            definition: format!("definition of sign {id}"),
            video: (id % 2 == 0).then(|| format!("https://videos.example/{id}.mp4")),
        });
    }
    store.insert_group(
        Group {
            id: 10,
            name: "Animals".to_string(),
            owner_id: 1,
            owner_name: Some("instructor".to_string()),
        },
        [1, 2, 3],
    );
    store.insert_group(
        Group {
            id: 20,
            name: "Colors".to_string(),
            owner_id: 1,
            owner_name: Some("instructor".to_string()),
        },
        [3, 4, 5],
    );
    Arc::new(store)
}

pub fn create_test_app(store: Option<Arc<MemoryStore>>) -> Router {
    std::env::set_var("JWT_SECRET", TEST_SECRET);
    let store = store.map(|store| store as Arc<dyn StudyStore>);
    flashcard_backend::create_app_with_store(store, &Config::default())
}

pub fn token_for(user_id: UserId) -> String {
    let (token, _) = sign_jwt_with_secret(user_id, TEST_SECRET, "1h").unwrap();
    token
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
