// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use odyssey_session::SessionError;

#[test]
fn test_is_provider_unavailable() {
    assert!(SessionError::ProviderUnavailable.is_provider_unavailable());
    assert!(!SessionError::Auth("nope".to_string()).is_provider_unavailable());
    assert!(!SessionError::Persistence("disk".to_string()).is_provider_unavailable());
}

#[test]
fn test_is_auth_error() {
    let err = SessionError::Auth("Invalid email or password (INVALID_LOGIN_CREDENTIALS)".into());
    assert!(err.is_auth_error());
    assert_eq!(
        err.to_string(),
        "Authentication failed: Invalid email or password (INVALID_LOGIN_CREDENTIALS)"
    );

    assert!(!SessionError::ProviderUnavailable.is_auth_error());
    assert!(!SessionError::Persistence("timeout".into()).is_auth_error());
}

#[test]
fn test_internal_from_anyhow() {
    let err: SessionError = anyhow::anyhow!("task panicked").into();
    assert!(matches!(err, SessionError::Internal(_)));
    assert_eq!(err.to_string(), "Internal error: task panicked");
}
