// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;
use todo_ai::error::AppError;
use todo_ai::validation::{validate_priority, ValidationError};

async fn render(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED, "unauthorized"),
        (AppError::NotFound("Todo 1 not found".into()), StatusCode::NOT_FOUND, "not_found"),
        (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST, "validation_failed"),
        (
            AppError::RemoteOperationFailed("boom".into()),
            StatusCode::BAD_GATEWAY,
            "remote_error",
        ),
        (
            AppError::CredentialUnavailable("no identity".into()),
            StatusCode::SERVICE_UNAVAILABLE,
            "credential_unavailable",
        ),
        (
            AppError::Internal(anyhow::anyhow!("oops")),
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
        ),
    ];

    for (err, expected_status, expected_code) in cases {
        let (status, body) = render(err).await;
        assert_eq!(status, expected_status);
        assert_eq!(body["error"], expected_code);
    }
}

#[tokio::test]
async fn test_credential_details_are_not_exposed() {
    let (_, body) = render(AppError::CredentialUnavailable("secret endpoint info".into())).await;
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_remote_message_is_passed_through() {
    let (_, body) = render(AppError::RemoteOperationFailed(
        "API error (status 503): down".into(),
    ))
    .await;
    assert_eq!(body["details"], "API error (status 503): down");
}

#[tokio::test]
async fn test_validation_error_conversion() {
    let err: AppError = validate_priority(Some("7")).unwrap_err().into();
    match &err {
        AppError::Validation(msg) => {
            assert_eq!(msg, &ValidationError::PriorityOutOfRange.to_string())
        }
        other => panic!("expected Validation, got {:?}", other),
    }

    let (status, body) = render(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("0, 1, 2, or 3"));
}
