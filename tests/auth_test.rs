//! Tests for bearer token handling and the current-user cache.
//!
//! Tokens are minted locally with HS256; the client never verifies
//! signatures, it only refuses to send tokens that have visibly expired.
//!
//! Run with: `cargo test --test auth_test`
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use brandlink_chat::auth::token::{Claims, TokenError, bearer_token, check_expiry};
use brandlink_chat::auth::{IdentityCache, StaticToken};
use brandlink_chat::models::{CurrentUser, Role};
use brandlink_chat::transport::TransportError;

const TEST_SECRET: &str = "test-secret-at-least-256-bits-long-for-hs256-xxxxxxx";

/// Helper: mint a JWT expiring `exp_offset` seconds from now.
fn mint_token(exp_offset: i64) -> String {
    let now = Utc::now().timestamp();

    let claims = Claims {
        sub: Some(serde_json::json!(42)),
        exp: Some((now + exp_offset) as usize),
        iat: Some((now - 60) as usize),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to encode test JWT")
}

fn promoter(id: i64) -> CurrentUser {
    CurrentUser {
        id,
        name: Some("Priya".to_string()),
        email: Some("priya@example.com".to_string()),
        role: Some(Role::Promoter),
    }
}

#[test]
fn test_valid_jwt_is_passed_through() {
    let token = mint_token(3600);
    let provider = StaticToken::new(token.clone());

    assert_eq!(bearer_token(&provider).unwrap(), token);
}

#[test]
fn test_expired_jwt_is_rejected_locally() {
    // Well past the default 60s leeway.
    let token = mint_token(-300);

    assert_eq!(check_expiry(&token), Err(TokenError::Expired));
    assert_eq!(
        bearer_token(&StaticToken::new(token)),
        Err(TokenError::Expired)
    );
}

#[test]
fn test_opaque_token_is_not_inspected() {
    // Sanctum-style personal access token.
    let provider = StaticToken::new("17|Qm9ndXNUb2tlbkZvclRlc3Rz");
    assert_eq!(bearer_token(&provider).unwrap(), "17|Qm9ndXNUb2tlbkZvclRlc3Rz");

    // Three segments but not a JWT: left for the backend to judge.
    assert!(check_expiry("not.a.jwt").is_ok());
}

#[test]
fn test_missing_or_blank_token() {
    assert_eq!(bearer_token(&StaticToken::none()), Err(TokenError::Missing));
    assert_eq!(bearer_token(&StaticToken::new("   ")), Err(TokenError::Missing));
}

#[test]
fn test_closure_token_provider() {
    let provider = || Some("abc".to_string());
    assert_eq!(bearer_token(&provider).unwrap(), "abc");
}

#[test]
fn test_token_errors_surface_as_unauthorized() {
    let err: TransportError = TokenError::Expired.into();
    assert!(matches!(err, TransportError::Unauthorized(_)));
}

#[tokio::test]
async fn test_identity_cache_fetches_once_per_token() {
    let cache = IdentityCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = calls.clone();
        let user = cache
            .resolve("token-a", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(promoter(7))
            })
            .await
            .unwrap();
        assert_eq!(user.id, 7);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_identity_cache_does_not_cache_failures() {
    let cache = IdentityCache::new(Duration::from_secs(60));

    let failed = cache
        .resolve("token-b", || async {
            Err(TransportError::Network("connection refused".to_string()))
        })
        .await;
    assert!(matches!(failed, Err(TransportError::Network(_))));

    let user = cache
        .resolve("token-b", || async { Ok(promoter(9)) })
        .await
        .unwrap();
    assert_eq!(user.id, 9);
}

#[tokio::test]
async fn test_identity_cache_forget() {
    let cache = IdentityCache::new(Duration::from_secs(60));
    cache.resolve("token-c", || async { Ok(promoter(1)) }).await.unwrap();

    cache.forget("token-c").await;

    let user = cache
        .resolve("token-c", || async { Ok(promoter(2)) })
        .await
        .unwrap();
    assert_eq!(user.id, 2);
}
