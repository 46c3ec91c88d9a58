//! Integration tests for `HttpBindingClient` against a stub backend.
//!
//! Each test starts an axum server on an ephemeral localhost port that serves
//! canned responses for the three authorization-session endpoints and records
//! what the client sent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cardauth_client::application::{BindingClient, SessionController};
use cardauth_client::infrastructure::HttpBindingClient;
use cardauth_core::protocol::endpoints;
use cardauth_core::{
    AuthorizationOutcome, BindingError, MemberId, SessionToken, VerificationError,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

// ── Stub backend ──────────────────────────────────────────────────────────────

struct Stub {
    bind_status: StatusCode,
    bind_body: Value,
    hang_bind: bool,
    verify_status: StatusCode,
    verify_body: Value,
    cancel_status: StatusCode,
    verify_requests: Mutex<Vec<Value>>,
    cancel_requests: Mutex<Vec<Value>>,
}

impl Default for Stub {
    fn default() -> Self {
        Self {
            bind_status: StatusCode::OK,
            bind_body: json!({"token": "t1", "hardware_user_id": "u1", "hardware_name": "Alice"}),
            hang_bind: false,
            verify_status: StatusCode::OK,
            verify_body: json!({"member_id": "m1", "member_name": "Alice"}),
            cancel_status: StatusCode::OK,
            verify_requests: Mutex::new(Vec::new()),
            cancel_requests: Mutex::new(Vec::new()),
        }
    }
}

async fn bind_handler(State(stub): State<Arc<Stub>>) -> Response {
    if stub.hang_bind {
        std::future::pending::<()>().await;
    }
    (stub.bind_status, Json(stub.bind_body.clone())).into_response()
}

async fn verify_handler(State(stub): State<Arc<Stub>>, Json(body): Json<Value>) -> Response {
    stub.verify_requests.lock().unwrap().push(body);
    (stub.verify_status, Json(stub.verify_body.clone())).into_response()
}

async fn cancel_handler(State(stub): State<Arc<Stub>>, Json(body): Json<Value>) -> StatusCode {
    stub.cancel_requests.lock().unwrap().push(body);
    stub.cancel_status
}

/// Serves `stub` on 127.0.0.1 and returns a client pointed at it.
async fn serve(stub: Stub) -> (HttpBindingClient, Arc<Stub>) {
    let stub = Arc::new(stub);
    let app = Router::new()
        .route(endpoints::BIND, get(bind_handler))
        .route(endpoints::VERIFY, post(verify_handler))
        .route(endpoints::CANCEL, post(cancel_handler))
        .with_state(Arc::clone(&stub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = HttpBindingClient::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    (client, stub)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bind_returns_full_claim() {
    let (client, _stub) = serve(Stub::default()).await;

    let claim = client.bind(&CancellationToken::new()).await.unwrap();

    assert_eq!(claim.token, SessionToken::new("t1"));
    assert_eq!(claim.hardware_user_id, "u1");
    assert_eq!(claim.hardware_display_name, "Alice");
}

#[tokio::test]
async fn test_bind_accepts_numeric_ids() {
    let (client, _stub) = serve(Stub {
        bind_body: json!({"token": "t9", "hardware_user_id": 42, "hardware_name": "Bob"}),
        ..Stub::default()
    })
    .await;

    let claim = client.bind(&CancellationToken::new()).await.unwrap();

    assert_eq!(claim.hardware_user_id, "42");
}

#[tokio::test]
async fn test_bind_with_missing_hardware_name_is_incomplete_identity() {
    let (client, _stub) = serve(Stub {
        bind_body: json!({"token": "t1", "hardware_user_id": "u1"}),
        ..Stub::default()
    })
    .await;

    let err = client.bind(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(
        err,
        BindingError::IncompleteIdentity {
            field: "hardware_name"
        }
    );
}

#[tokio::test]
async fn test_bind_server_error_is_rejected() {
    let (client, _stub) = serve(Stub {
        bind_status: StatusCode::SERVICE_UNAVAILABLE,
        bind_body: json!({"detail": "scanner offline"}),
        ..Stub::default()
    })
    .await;

    let err = client.bind(&CancellationToken::new()).await.unwrap_err();

    match err {
        BindingError::Rejected { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("scanner offline"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hanging_bind_is_aborted_by_cancellation() {
    let (client, _stub) = serve(Stub {
        hang_bind: true,
        ..Stub::default()
    })
    .await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let result = tokio::time::timeout(Duration::from_secs(2), client.bind(&cancel))
        .await
        .expect("bind must return promptly once cancelled");

    assert_eq!(result.unwrap_err(), BindingError::Aborted);
}

#[tokio::test]
async fn test_verify_sends_token_and_hardware_name() {
    let (client, stub) = serve(Stub::default()).await;

    let member = client
        .verify(&SessionToken::new("t1"), "Alice", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(member.member_id, MemberId::new("m1"));
    assert_eq!(member.member_name, "Alice");
    assert_eq!(
        *stub.verify_requests.lock().unwrap(),
        vec![json!({"token": "t1", "hardware_name": "Alice"})]
    );
}

#[tokio::test]
async fn test_verify_forbidden_is_rejected() {
    let (client, _stub) = serve(Stub {
        verify_status: StatusCode::FORBIDDEN,
        verify_body: json!({"detail": "member revoked"}),
        ..Stub::default()
    })
    .await;

    let err = client
        .verify(&SessionToken::new("t1"), "Alice", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, VerificationError::Rejected { status: 403, .. }));
}

#[tokio::test]
async fn test_verify_gone_is_token_expired() {
    let (client, _stub) = serve(Stub {
        verify_status: StatusCode::GONE,
        ..Stub::default()
    })
    .await;

    let err = client
        .verify(&SessionToken::new("t1"), "Alice", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, VerificationError::TokenExpired);
}

#[tokio::test]
async fn test_cancel_session_treats_not_found_as_done() {
    let (client, stub) = serve(Stub {
        cancel_status: StatusCode::NOT_FOUND,
        ..Stub::default()
    })
    .await;

    client
        .cancel_session(&SessionToken::new("t1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        *stub.cancel_requests.lock().unwrap(),
        vec![json!({"token": "t1"})]
    );
}

#[tokio::test]
async fn test_cancel_session_server_error_is_reported() {
    let (client, _stub) = serve(Stub {
        cancel_status: StatusCode::INTERNAL_SERVER_ERROR,
        ..Stub::default()
    })
    .await;

    let result = client
        .cancel_session(&SessionToken::new("t1"), &CancellationToken::new())
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_rejected_verification_cancels_backend_session_once() {
    let (client, stub) = serve(Stub {
        verify_status: StatusCode::FORBIDDEN,
        verify_body: json!({"detail": "unknown card"}),
        ..Stub::default()
    })
    .await;
    let controller = SessionController::new(Arc::new(client));

    let outcome = controller.start().await.unwrap();
    controller.wait_for_cleanup().await;

    assert!(matches!(
        outcome,
        AuthorizationOutcome::VerificationFailed(VerificationError::Rejected { status: 403, .. })
    ));
    assert_eq!(
        *stub.cancel_requests.lock().unwrap(),
        vec![json!({"token": "t1"})]
    );
}

#[tokio::test]
async fn test_dropping_controller_after_outcome_still_cancels_backend_session() {
    let (client, stub) = serve(Stub {
        verify_status: StatusCode::FORBIDDEN,
        verify_body: json!({"detail": "unknown card"}),
        ..Stub::default()
    })
    .await;
    let controller = SessionController::new(Arc::new(client));

    let outcome = controller.start().await.unwrap();
    // The dialog closes as soon as it has an outcome.
    drop(controller);

    assert!(matches!(outcome, AuthorizationOutcome::VerificationFailed(_)));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while stub.cancel_requests.lock().unwrap().is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "cancel request never reached the backend"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        *stub.cancel_requests.lock().unwrap(),
        vec![json!({"token": "t1"})]
    );
}
