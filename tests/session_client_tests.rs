// Integration tests for the session backend client
//
// Each test runs a throwaway axum backend on an ephemeral port and checks
// how the client maps its responses.

use anyhow::Result;
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voice_chat::backend::{SessionApi, SessionClient};
use voice_chat::error::{BackendOperation, UnavailableKind, VoiceError};

async fn spawn_backend(router: Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{}", addr))
}

fn client(base_url: &str) -> Result<SessionClient> {
    SessionClient::new(base_url, Duration::from_secs(5))
}

fn credentials_json() -> Value {
    json!({
        "room_name": "voice-room-1",
        "token": "tok-123",
        "url": "wss://media.example.com"
    })
}

#[tokio::test]
async fn test_create_session_returns_credentials() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
    let recorder = Arc::clone(&seen);

    let router = Router::new().route(
        "/api/voice/session",
        post(move |Json(body): Json<Value>| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder.lock().unwrap().push(body);
                Json(credentials_json())
            }
        }),
    );
    let base = spawn_backend(router).await?;

    let credentials = client(&base)?.create_session(Some("alice")).await?;

    assert_eq!(credentials.room_name, "voice-room-1");
    assert_eq!(credentials.token, "tok-123");
    assert_eq!(credentials.url, "wss://media.example.com");

    let bodies = seen.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0], json!({ "user_id": "alice" }));

    Ok(())
}

#[tokio::test]
async fn test_create_session_generates_user_id() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
    let recorder = Arc::clone(&seen);

    let router = Router::new().route(
        "/api/voice/session",
        post(move |Json(body): Json<Value>| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder.lock().unwrap().push(body);
                Json(credentials_json())
            }
        }),
    );
    let base = spawn_backend(router).await?;

    client(&base)?.create_session(None).await?;

    let bodies = seen.lock().unwrap();
    let user_id = bodies[0]["user_id"].as_str().unwrap_or_default().to_string();
    let millis = user_id.strip_prefix("user-").expect("user- prefix");
    assert!(!millis.is_empty());
    assert!(millis.chars().all(|c| c.is_ascii_digit()), "got {}", user_id);

    Ok(())
}

#[tokio::test]
async fn test_create_session_empty_user_id_is_generated() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
    let recorder = Arc::clone(&seen);

    let router = Router::new().route(
        "/api/voice/session",
        post(move |Json(body): Json<Value>| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder.lock().unwrap().push(body);
                Json(credentials_json())
            }
        }),
    );
    let base = spawn_backend(router).await?;

    client(&base)?.create_session(Some("")).await?;

    let bodies = seen.lock().unwrap();
    let user_id = bodies[0]["user_id"].as_str().unwrap_or_default();
    assert!(user_id.starts_with("user-"), "got {:?}", user_id);
    assert!(user_id.len() > "user-".len());

    Ok(())
}

#[tokio::test]
async fn test_create_session_missing_endpoint() -> Result<()> {
    let base = spawn_backend(Router::new()).await?;

    let err = client(&base)?
        .create_session(Some("alice"))
        .await
        .expect_err("404 must fail");

    assert!(err.is_endpoint_missing());
    let message = err.to_string();
    assert!(message.contains("/api/voice/session endpoint"), "{}", message);
    assert!(message.contains(&format!("{}/api/voice/session", base)), "{}", message);

    Ok(())
}

#[tokio::test]
async fn test_create_session_server_error_carries_status_and_body() -> Result<()> {
    let router = Router::new().route(
        "/api/voice/session",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = spawn_backend(router).await?;

    let err = client(&base)?
        .create_session(Some("alice"))
        .await
        .expect_err("500 must fail");

    match &err {
        VoiceError::BackendUnavailable {
            operation,
            kind,
            status,
            body,
            ..
        } => {
            assert_eq!(*operation, BackendOperation::CreateSession);
            assert_eq!(*kind, UnavailableKind::Status);
            assert_eq!(*status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.to_string(), "Failed to create voice session (500): boom");

    Ok(())
}

#[tokio::test]
async fn test_create_session_rejects_malformed_body() -> Result<()> {
    let router = Router::new().route(
        "/api/voice/session",
        post(|| async { Json(json!({ "room": "missing fields" })) }),
    );
    let base = spawn_backend(router).await?;

    let err = client(&base)?
        .create_session(Some("alice"))
        .await
        .expect_err("undecodable body must fail");

    assert!(matches!(err, VoiceError::InvalidResponse(_)));

    Ok(())
}

#[tokio::test]
async fn test_create_session_unreachable_backend() -> Result<()> {
    // Grab a free port, then close it so nothing is listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let base = format!("http://{}", addr);
    let err = client(&base)?
        .create_session(Some("alice"))
        .await
        .expect_err("closed port must fail");

    assert!(matches!(err, VoiceError::BackendUnreachable { .. }));
    let message = err.to_string();
    assert!(message.contains(&base));
    assert!(message.contains("backend is running"));

    Ok(())
}

#[tokio::test]
async fn test_end_session_deletes_room() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let recorder = Arc::clone(&seen);

    let router = Router::new().route(
        "/api/voice/session/:room_name",
        delete(move |Path(room_name): Path<String>| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder.lock().unwrap().push(room_name);
                StatusCode::NO_CONTENT
            }
        }),
    );
    let base = spawn_backend(router).await?;

    client(&base)?.end_session("room 1").await?;

    assert_eq!(*seen.lock().unwrap(), vec!["room 1".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_end_session_not_found_is_success() -> Result<()> {
    let base = spawn_backend(Router::new()).await?;

    client(&base)?.end_session("gone-room").await?;

    Ok(())
}

#[tokio::test]
async fn test_end_session_server_error() -> Result<()> {
    let router = Router::new().route(
        "/api/voice/session/:room_name",
        delete(|| async { (StatusCode::BAD_GATEWAY, "media server down") }),
    );
    let base = spawn_backend(router).await?;

    let err = client(&base)?
        .end_session("voice-room-1")
        .await
        .expect_err("502 must fail");

    assert!(matches!(
        err,
        VoiceError::BackendUnavailable {
            operation: BackendOperation::EndSession,
            status: 502,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "Failed to end voice session: 502 media server down"
    );

    Ok(())
}
