use auth_identity::*;
use std::sync::Arc;

fn service() -> IdentityService {
    IdentityService::new(Arc::new(InMemoryUserRepository::new()), IdentityConfig::default())
}

fn register_request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        name: "Ada Lovelace".to_string(),
        password: password.to_string(),
    }
}

fn claims(sub: &str, email: Option<&str>) -> OidcClaims {
    OidcClaims {
        sub: sub.to_string(),
        email: email.map(str::to_string),
        name: Some("Ada".to_string()),
        preferred_username: None,
        email_verified: Some(true),
    }
}

#[tokio::test]
async fn test_register_and_authenticate() {
    let service = service();
    let user = service
        .register(register_request("Ada@Example.com", "correct horse"))
        .await
        .unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert!(user.password_hash.as_deref().unwrap().starts_with("$argon2"));

    let logged_in = service.authenticate("ada@example.com", "correct horse").await.unwrap();
    assert_eq!(logged_in.id, user.id);

    let err = service.authenticate("ada@example.com", "wrong horse").await.unwrap_err();
    assert!(matches!(err, IdentityError::InvalidCredentials));

    let err = service.authenticate("nobody@example.com", "correct horse").await.unwrap_err();
    assert!(matches!(err, IdentityError::InvalidCredentials));
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let service = service();

    let err = service.register(register_request("not-an-email", "correct horse")).await.unwrap_err();
    assert!(matches!(err, IdentityError::InvalidEmail));

    let err = service.register(register_request("ada@example.com", "short")).await.unwrap_err();
    assert!(matches!(err, IdentityError::WeakPassword(_)));

    service.register(register_request("ada@example.com", "correct horse")).await.unwrap();
    let err = service
        .register(register_request("ADA@example.com", "another horse"))
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::EmailAlreadyInUse));
}

#[tokio::test]
async fn test_oidc_creates_then_finds_by_subject() {
    let service = service();

    let created = service
        .get_or_create_from_oidc(&claims("sub-1", Some("ada@example.com")))
        .await
        .unwrap();
    assert_eq!(created.oidc_subject.as_deref(), Some("sub-1"));
    assert_eq!(created.name, "Ada");
    assert!(created.password_hash.is_none());

    // Email changed at the provider; the subject still identifies the user
    let again = service
        .get_or_create_from_oidc(&claims("sub-1", Some("ada@new.example.com")))
        .await
        .unwrap();
    assert_eq!(again.id, created.id);
}

#[tokio::test]
async fn test_oidc_links_existing_password_user() {
    let service = service();
    let registered = service
        .register(register_request("ada@example.com", "correct horse"))
        .await
        .unwrap();

    let linked = service
        .get_or_create_from_oidc(&claims("sub-9", Some("ADA@example.com")))
        .await
        .unwrap();
    assert_eq!(linked.id, registered.id);
    assert_eq!(linked.oidc_subject.as_deref(), Some("sub-9"));

    // Password login keeps working after linking
    service.authenticate("ada@example.com", "correct horse").await.unwrap();
}

#[tokio::test]
async fn test_oidc_unverified_email_does_not_link() {
    let service = service();
    let registered = service
        .register(register_request("ada@example.com", "correct horse"))
        .await
        .unwrap();

    for email_verified in [Some(false), None] {
        let mut unverified = claims("attacker-1", Some("ada@example.com"));
        unverified.email_verified = email_verified;
        let err = service.get_or_create_from_oidc(&unverified).await.unwrap_err();
        assert!(matches!(err, IdentityError::UnverifiedEmail));
    }

    let untouched = service.find_user(registered.id).await.unwrap();
    assert_eq!(untouched.oidc_subject, None);

    // A fresh address still creates an account
    let mut newcomer = claims("sub-5", Some("grace@example.com"));
    newcomer.email_verified = None;
    let created = service.get_or_create_from_oidc(&newcomer).await.unwrap();
    assert_ne!(created.id, registered.id);
}

#[tokio::test]
async fn test_oidc_requires_subject_and_email() {
    let service = service();

    let err = service
        .get_or_create_from_oidc(&claims("", Some("ada@example.com")))
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::IncompleteClaims(_)));

    let err = service.get_or_create_from_oidc(&claims("sub-2", None)).await.unwrap_err();
    assert!(matches!(err, IdentityError::IncompleteClaims(_)));
}

#[tokio::test]
async fn test_oidc_only_user_cannot_password_login() {
    let service = service();
    service
        .get_or_create_from_oidc(&claims("sub-3", Some("grace@example.com")))
        .await
        .unwrap();

    let err = service.authenticate("grace@example.com", "anything at all").await.unwrap_err();
    assert!(matches!(err, IdentityError::InvalidCredentials));
}

#[test]
fn test_find_user_missing() {
    let service = service();
    let err = tokio_test::block_on(service.find_user(uuid::Uuid::nil())).unwrap_err();
    assert!(matches!(err, IdentityError::UserNotFound));
}
