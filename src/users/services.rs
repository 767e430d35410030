use lazy_static::lazy_static;
use tracing::{debug, error, warn};

use crate::users::error::{Result, UserError};
use crate::users::hooks::{before_create, before_update, run_blocking, verify_blocking};
use crate::users::password::{hash_password, verify_password};
use crate::users::repo::UserStore;
use crate::users::repo_types::{NewUser, User, UserChanges};
use crate::users::validate::{normalize_email, validate_changes, validate_new};

/// Validate, hash, insert. Nothing reaches the store unless validation passes.
pub async fn create_user(store: &dyn UserStore, mut new_user: NewUser) -> Result<User> {
    new_user.email = normalize_email(&new_user.email);
    if let Err(errs) = validate_new(&new_user) {
        warn!(email = %new_user.email, errors = %errs, "create rejected");
        return Err(errs.into());
    }

    let new_user = before_create(new_user).await?;
    let user = store.insert(new_user).await?;
    debug!(user_id = user.id, "user created");
    Ok(user)
}

pub async fn update_user(store: &dyn UserStore, id: i32, mut changes: UserChanges) -> Result<User> {
    if let Some(email) = changes.email.as_deref() {
        changes.email = Some(normalize_email(email));
    }
    if let Err(errs) = validate_changes(&changes) {
        warn!(user_id = id, errors = %errs, "update rejected");
        return Err(errs.into());
    }

    if changes.is_empty() {
        return store.find_by_id(id).await?.ok_or(UserError::NotFound);
    }

    let changes = before_update(changes).await?;
    let user = store.update(id, changes).await?;
    debug!(user_id = user.id, "user updated");
    Ok(user)
}

pub async fn delete_user(store: &dyn UserStore, id: i32) -> Result<()> {
    if store.delete(id).await? {
        debug!(user_id = id, "user deleted");
        Ok(())
    } else {
        Err(UserError::NotFound)
    }
}

lazy_static! {
    // Verified against on unknown emails so both login branches pay for one Argon2 run.
    static ref DUMMY_HASH: String = hash_password("accountd-no-such-user").unwrap_or_default();
}

/// Looks the user up by email and checks the password. Unknown email and
/// wrong password are indistinguishable to the caller.
pub async fn authenticate(store: &dyn UserStore, email: &str, password: &str) -> Result<User> {
    let email = normalize_email(email);
    let Some(user) = store.find_by_email(&email).await? else {
        let plain = password.to_owned();
        let _ = run_blocking(move || verify_password(&plain, &DUMMY_HASH)).await;
        warn!(email = %email, "login unknown email");
        return Err(UserError::InvalidCredentials);
    };

    let ok = verify_blocking(password.to_owned(), user.password.clone())
        .await
        .map_err(|e| {
            error!(error = %e, user_id = user.id, "verify_password failed");
            e
        })?;

    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(UserError::InvalidCredentials);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::users::repo::MemoryUserStore;

    /// Counts how often the runtime got to poll another task while `fut` ran.
    async fn ticks_during<F: std::future::Future>(fut: F) -> (F::Output, usize) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let ticker = tokio::spawn(async move {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        });
        let out = fut.await;
        ticker.abort();
        (out, ticks.load(Ordering::SeqCst))
    }

    fn new_user(email: &str, password: &str) -> NewUser {
        NewUser {
            username: "lernantino".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn stored_password_is_never_the_plaintext() {
        let store = MemoryUserStore::default();
        let user = create_user(&store, new_user("lernantino@gmail.com", "password1234"))
            .await
            .unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.password, "password1234");
        assert!(verify_password("password1234", &stored.password).unwrap());
    }

    #[tokio::test]
    async fn same_plaintext_is_salted_per_row() {
        let store = MemoryUserStore::default();
        let a = create_user(&store, new_user("a@example.com", "hunter22")).await.unwrap();
        let b = create_user(&store, new_user("b@example.com", "hunter22")).await.unwrap();

        assert_ne!(a.password, b.password);
        assert!(verify_password("hunter22", &a.password).unwrap());
        assert!(verify_password("hunter22", &b.password).unwrap());
    }

    #[tokio::test]
    async fn short_password_never_reaches_storage() {
        let store = MemoryUserStore::default();
        let err = create_user(&store, new_user("a@example.com", "abc"))
            .await
            .unwrap_err();

        match err {
            UserError::Validation(errs) => assert!(errs.has("password")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn malformed_email_never_reaches_storage() {
        let store = MemoryUserStore::default();
        let err = create_user(&store, new_user("not-an-email", "password1234"))
            .await
            .unwrap_err();

        match err {
            UserError::Validation(errs) => assert!(errs.has("email")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let store = MemoryUserStore::default();
        create_user(&store, new_user("dup@example.com", "password1234"))
            .await
            .unwrap();
        let err = create_user(&store, new_user(" DUP@Example.com ", "other-pass"))
            .await
            .unwrap_err();

        assert!(matches!(err, UserError::EmailTaken));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn password_update_rehashes() {
        let store = MemoryUserStore::default();
        let user = create_user(&store, new_user("a@example.com", "old-pass"))
            .await
            .unwrap();

        let updated = update_user(
            &store,
            user.id,
            UserChanges {
                password: Some("new-pass".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_ne!(updated.password, user.password);
        assert_ne!(updated.password, "new-pass");
        assert!(verify_password("new-pass", &updated.password).unwrap());
        assert!(!verify_password("old-pass", &updated.password).unwrap());
    }

    #[tokio::test]
    async fn unrelated_update_keeps_the_hash() {
        let store = MemoryUserStore::default();
        let user = create_user(&store, new_user("a@example.com", "password1234"))
            .await
            .unwrap();

        let updated = update_user(
            &store,
            user.id,
            UserChanges {
                username: Some("renamed".into()),
                email: Some("B@Example.com".into()),
                password: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.username, "renamed");
        assert_eq!(updated.email, "b@example.com");
        assert_eq!(updated.password, user.password);
    }

    #[tokio::test]
    async fn update_validates_present_fields() {
        let store = MemoryUserStore::default();
        let user = create_user(&store, new_user("a@example.com", "password1234"))
            .await
            .unwrap();

        let err = update_user(
            &store,
            user.id,
            UserChanges {
                password: Some("no".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password, user.password);
    }

    #[tokio::test]
    async fn update_and_delete_missing_user() {
        let store = MemoryUserStore::default();
        let err = update_user(
            &store,
            42,
            UserChanges {
                username: Some("ghost".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UserError::NotFound));

        let err = delete_user(&store, 42).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let store = MemoryUserStore::default();
        let user = create_user(&store, new_user("a@example.com", "password1234"))
            .await
            .unwrap();

        let found = authenticate(&store, "A@example.com", "password1234").await.unwrap();
        assert_eq!(found.id, user.id);

        let err = authenticate(&store, "a@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, UserError::InvalidCredentials));

        let err = authenticate(&store, "nobody@example.com", "password1234")
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::InvalidCredentials));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn login_verification_leaves_the_runtime_free() {
        let store = MemoryUserStore::default();
        create_user(&store, new_user("a@example.com", "password1234"))
            .await
            .unwrap();

        let (res, ticks) = ticks_during(authenticate(&store, "a@example.com", "password1234")).await;
        assert!(res.is_ok());
        assert!(ticks > 0, "verification must not hold the only worker thread");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_email_still_runs_a_verification() {
        let store = MemoryUserStore::default();

        let (res, ticks) = ticks_during(authenticate(&store, "ghost@example.com", "password1234")).await;
        assert!(matches!(res, Err(UserError::InvalidCredentials)));
        assert!(ticks > 0, "miss branch must do the same blocking work as a hit");
    }
}
