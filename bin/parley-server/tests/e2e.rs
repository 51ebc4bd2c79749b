//! Client store against a live server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use parley_core::attachment;
use parley_core::types::{MessageStatus, Role};
use parley_core::{ChatStore, ClientConfig, HttpTransport, TurnOutcome, TurnState};
use parley_server::provider::{MOCK_RESPONSE, MockProvider};
use parley_server::{AppState, Config, routes};

async fn spawn_server(config: Config) -> String {
    let provider = Arc::new(MockProvider::new(config.mock_delay));
    let app = routes::build(Arc::new(AppState::new(config, provider)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/chat")
}

fn store_for(endpoint: &str) -> ChatStore {
    let config = ClientConfig::default().with_endpoint(endpoint);
    ChatStore::new(Arc::new(HttpTransport::new(&config).unwrap()))
}

fn fast_config() -> Config {
    Config {
        mock_delay: Duration::from_millis(1),
        ..Config::default()
    }
}

#[tokio::test]
async fn turn_streams_mock_reply_into_store() {
    let endpoint = spawn_server(fast_config()).await;
    let store = store_for(&endpoint);

    let outcome = store.send_message("hello", Vec::new()).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);

    let snap = store.snapshot();
    assert_eq!(snap.state, TurnState::Idle);
    let messages = snap.session.unwrap().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, MOCK_RESPONSE);
    assert_eq!(messages[1].status, MessageStatus::Complete);
}

#[tokio::test]
async fn second_turn_carries_history() {
    let endpoint = spawn_server(fast_config()).await;
    let store = store_for(&endpoint);

    store.send_message("first", Vec::new()).await.unwrap();
    let outcome = store.send_message("second", Vec::new()).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(store.snapshot().session.unwrap().messages.len(), 4);
}

#[tokio::test]
async fn attachments_are_uploaded() {
    let endpoint = spawn_server(fast_config()).await;
    let store = store_for(&endpoint);

    let file = attachment::from_bytes("notes.txt", "text/plain", b"some notes").unwrap();
    let outcome = store.send_message("", vec![file]).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
}

#[tokio::test]
async fn server_rejection_surfaces_as_error_state() {
    let config = Config {
        max_file_bytes: 4,
        ..fast_config()
    };
    let endpoint = spawn_server(config).await;
    let store = store_for(&endpoint);

    let file = attachment::from_bytes("big.txt", "text/plain", b"more than four bytes").unwrap();
    let outcome = store.send_message("look", vec![file]).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Failed);

    let snap = store.snapshot();
    assert!(snap.state.error().is_some());
    assert_eq!(snap.session.unwrap().messages.len(), 1);
}

#[tokio::test]
async fn unreachable_server_fails_the_turn() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = store_for(&format!("http://{addr}/api/chat"));
    let outcome = store.send_message("hello", Vec::new()).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Failed);
    assert!(!store.is_loading());
}
