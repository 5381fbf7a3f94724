//! Session-store tests against the in-process fake Redis.

use crate::auth::jwt_service::*;
use crate::test_support::test_jwt_service;
use uuid::Uuid;

#[tokio::test]
async fn test_generate_and_validate_token_pair() {
    let service = test_jwt_service().await;
    let user_id = Uuid::new_v4();

    let pair = service
        .generate_token_pair(user_id, vec!["user".to_string()])
        .await
        .unwrap();
    assert_eq!(pair.token_type, "Bearer");
    assert_eq!(pair.expires_in, 15 * 60);

    let access = service.validate_token(&pair.access_token).await.unwrap();
    let refresh = service.validate_token(&pair.refresh_token).await.unwrap();

    assert_eq!(access.sub, user_id.to_string());
    assert_eq!(access.token_type, TokenType::Access);
    assert_eq!(refresh.token_type, TokenType::Refresh);
    assert_eq!(access.session_id, refresh.session_id);
    assert_eq!(access.iss, ISSUER);
}

#[tokio::test]
async fn test_access_validation_refuses_refresh_tokens() {
    let service = test_jwt_service().await;
    let pair = service
        .generate_token_pair(Uuid::new_v4(), vec!["user".to_string()])
        .await
        .unwrap();

    assert!(service.validate_access_token(&pair.access_token).await.is_ok());
    assert!(matches!(
        service.validate_access_token(&pair.refresh_token).await,
        Err(JwtError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_validate_garbage_token() {
    let service = test_jwt_service().await;
    assert!(service.validate_token("not.a.token").await.is_err());
}

#[tokio::test]
async fn test_refresh_rotates_session() {
    let service = test_jwt_service().await;
    let user_id = Uuid::new_v4();

    let pair = service
        .generate_token_pair(user_id, vec!["moderator".to_string()])
        .await
        .unwrap();
    let rotated = service.refresh_token(&pair.refresh_token).await.unwrap();

    let claims = service.validate_access_token(&rotated.access_token).await.unwrap();
    assert!(claims.is_moderator());

    // The old pair belonged to the retired session.
    assert!(matches!(
        service.validate_token(&pair.access_token).await,
        Err(JwtError::SessionNotFound)
    ));
    assert!(service.refresh_token(&pair.refresh_token).await.is_err());
}

#[tokio::test]
async fn test_refresh_with_access_token_fails() {
    let service = test_jwt_service().await;
    let pair = service
        .generate_token_pair(Uuid::new_v4(), vec!["user".to_string()])
        .await
        .unwrap();

    assert!(matches!(
        service.refresh_token(&pair.access_token).await,
        Err(JwtError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_blacklisted_token_is_rejected() {
    let service = test_jwt_service().await;
    let pair = service
        .generate_token_pair(Uuid::new_v4(), vec!["user".to_string()])
        .await
        .unwrap();

    service
        .blacklist_token(&pair.access_token, "logout")
        .await
        .unwrap();

    assert!(matches!(
        service.validate_token(&pair.access_token).await,
        Err(JwtError::TokenBlacklisted)
    ));
    // Logout drops the session, so the refresh token dies with it.
    assert!(service.refresh_token(&pair.refresh_token).await.is_err());
}
