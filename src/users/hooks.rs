//! Pre-persistence hooks. Both run right before the write is sent to storage
//! and replace a plaintext password with its hash.

use tracing::{debug, error};

use crate::users::error::{Result, UserError};
use crate::users::password::{hash_password, verify_password};
use crate::users::repo_types::{NewUser, UserChanges};

/// Runs Argon2 work on the blocking pool so the async worker stays free.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!(error = %e, "spawn_blocking join error");
            UserError::Hash(e.to_string())
        })?
        .map_err(|e| UserError::Hash(e.to_string()))
}

async fn hash_blocking(plain: String) -> Result<String> {
    run_blocking(move || hash_password(&plain)).await
}

pub(crate) async fn verify_blocking(plain: String, hash: String) -> Result<bool> {
    run_blocking(move || verify_password(&plain, &hash)).await
}

/// Runs before an insert.
pub async fn before_create(mut new_user: NewUser) -> Result<NewUser> {
    new_user.password = hash_blocking(new_user.password).await?;
    debug!(email = %new_user.email, "password hashed before create");
    Ok(new_user)
}

/// Runs before an update. Change sets that leave the password alone pass through.
pub async fn before_update(mut changes: UserChanges) -> Result<UserChanges> {
    if let Some(plain) = changes.password.take() {
        changes.password = Some(hash_blocking(plain).await?);
        debug!("password rehashed before update");
    }
    Ok(changes)
}
