//! Account and profile service tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use uuid::Uuid;

use craftmarket::domain::{Password, User, UserRole};
use craftmarket::errors::{AppError, AppResult};
use craftmarket::infra::repositories::{
    CategoryRepository, OrderRepository, ProductRepository, UserRepository,
};
use craftmarket::infra::UnitOfWork;
use craftmarket::services::{AuthService, Authenticator, UserManager, UserService};
use craftmarket::Config;

mock! {
    pub Users {}

    #[async_trait]
    impl UserRepository for Users {
        async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
        async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
        async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;
        async fn email_taken(&self, email: &str, exclude: Option<Uuid>) -> AppResult<bool>;
        async fn create(&self, email: String, password_hash: String, name: String) -> AppResult<User>;
        async fn update_profile(
            &self,
            id: Uuid,
            name: Option<String>,
            email: Option<String>,
        ) -> AppResult<User>;
    }
}

struct FakeUow {
    users: Arc<MockUsers>,
}

impl UnitOfWork for FakeUow {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }
    fn categories(&self) -> Arc<dyn CategoryRepository> {
        unimplemented!("not used in account tests")
    }
    fn products(&self) -> Arc<dyn ProductRepository> {
        unimplemented!("not used in account tests")
    }
    fn orders(&self) -> Arc<dyn OrderRepository> {
        unimplemented!("not used in account tests")
    }
}

fn uow(users: MockUsers) -> Arc<FakeUow> {
    Arc::new(FakeUow {
        users: Arc::new(users),
    })
}

fn test_config() -> Config {
    std::env::set_var("JWT_SECRET", "account-tests-secret-0123456789abcdef");
    Config::from_env()
}

fn sample_user(email: &str, password_hash: String) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash,
        name: "Jamie".to_string(),
        role: UserRole::User,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn registration_stores_a_hash_not_the_password() {
    let mut users = MockUsers::new();
    users.expect_email_taken().returning(|_, _| Ok(false));
    users
        .expect_create()
        .withf(|_, hash, _| hash.starts_with("$argon2") && hash != "hunter2-hunter2")
        .returning(|email, hash, _| Ok(sample_user(&email, hash)));

    let auth = Authenticator::new(uow(users), test_config());
    let user = auth
        .register(
            "jamie@example.com".to_string(),
            "hunter2-hunter2".to_string(),
            "Jamie".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(user.email, "jamie@example.com");
}

#[tokio::test]
async fn duplicate_email_registration_is_a_conflict() {
    let mut users = MockUsers::new();
    users.expect_email_taken().returning(|_, _| Ok(true));
    users.expect_create().times(0);

    let auth = Authenticator::new(uow(users), test_config());
    let err = auth
        .register(
            "jamie@example.com".to_string(),
            "hunter2-hunter2".to_string(),
            "Jamie".to_string(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn login_roundtrip_issues_a_verifiable_token() {
    let hash = Password::new("hunter2-hunter2").unwrap().into_string();
    let user = sample_user("jamie@example.com", hash);
    let user_id = user.id;

    let mut users = MockUsers::new();
    users
        .expect_find_by_email()
        .returning(move |_| Ok(Some(user.clone())));

    let auth = Authenticator::new(uow(users), test_config());
    let token = auth
        .login("jamie@example.com".to_string(), "hunter2-hunter2".to_string())
        .await
        .unwrap();

    assert_eq!(token.token_type, "Bearer");
    let claims = auth.verify_token(&token.access_token).unwrap();
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.email, "jamie@example.com");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_read_the_same() {
    let hash = Password::new("hunter2-hunter2").unwrap().into_string();
    let user = sample_user("jamie@example.com", hash);

    let mut users = MockUsers::new();
    users.expect_find_by_email().returning(move |email: &str| {
        if email == "jamie@example.com" {
            Ok(Some(user.clone()))
        } else {
            Ok(None)
        }
    });

    let auth = Authenticator::new(uow(users), test_config());

    let wrong_password = auth
        .login("jamie@example.com".to_string(), "not-the-password".to_string())
        .await
        .unwrap_err();
    let unknown_email = auth
        .login("nobody@example.com".to_string(), "hunter2-hunter2".to_string())
        .await
        .unwrap_err();

    assert!(matches!(wrong_password, AppError::InvalidCredentials));
    assert!(matches!(unknown_email, AppError::InvalidCredentials));
}

#[tokio::test]
async fn profile_email_change_checks_for_collisions() {
    let id = Uuid::new_v4();

    let mut users = MockUsers::new();
    users
        .expect_email_taken()
        .withf(move |email, exclude| email == "new@example.com" && *exclude == Some(id))
        .returning(|_, _| Ok(true));
    users.expect_update_profile().times(0);

    let svc = UserManager::new(uow(users));
    let err = svc
        .update_profile(id, None, Some("new@example.com".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn profile_update_passes_both_fields_through() {
    let id = Uuid::new_v4();

    let mut users = MockUsers::new();
    users.expect_email_taken().returning(|_, _| Ok(false));
    users
        .expect_update_profile()
        .withf(move |uid, name, email| {
            *uid == id
                && name.as_deref() == Some("Jamie Lee")
                && email.as_deref() == Some("new@example.com")
        })
        .returning(|id, name, _| {
            let mut user = sample_user("new@example.com", "hash".to_string());
            user.id = id;
            user.name = name.unwrap_or_default();
            Ok(user)
        });

    let svc = UserManager::new(uow(users));
    let user = svc
        .update_profile(
            id,
            Some("Jamie Lee".to_string()),
            Some("new@example.com".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(user.name, "Jamie Lee");
}

#[tokio::test]
async fn authorize_rejects_tokens_for_deleted_accounts() {
    let hash = Password::new("hunter2-hunter2").unwrap().into_string();
    let user = sample_user("jamie@example.com", hash);

    let mut users = MockUsers::new();
    {
        let user = user.clone();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
    }
    // The account vanished between token issue and use
    users.expect_find_by_id().returning(|_| Ok(None));

    let auth = Authenticator::new(uow(users), test_config());
    let token = auth
        .login("jamie@example.com".to_string(), "hunter2-hunter2".to_string())
        .await
        .unwrap();

    let err = auth.authorize(&token.access_token).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidSession));
}

#[tokio::test]
async fn garbage_tokens_are_unauthorized() {
    let auth = Authenticator::new(uow(MockUsers::new()), test_config());
    let err = auth.authorize("not-a-jwt").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}
