use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{FromRef, State};
use axum::{routing, Json, Router};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::api::user::UserResource;
use crate::api::{self, ApiResult, ServiceError, ValidationErrors};
use crate::auth::{AuthRwLock, Claim, Principal};
use crate::repo::user::{self, NewUser};
use crate::repo::Repo;

pub fn hash_password(pass: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pass.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::Internal(format!("password hashing failed: {}", err)))
}

pub fn verify_password(hash: &str, pass: &str) -> bool {
    PasswordHash::new(hash)
        .map(|hash| Argon2::default().verify_password(pass.as_bytes(), &hash).is_ok())
        .unwrap_or(false)
}

/// Creates the administrator account unless a user with `email` exists.
pub async fn bootstrap_admin(repo: &Repo, email: &str, pass: &str) -> Result<(), ServiceError> {
    let email = email.to_owned();
    let pass = pass.to_owned();

    let created = repo
        .run(move |conn| {
            if user::user::find_by_email(conn, &email)?.is_some() {
                return Ok(None);
            }
            let admin = NewUser {
                name: "Administrator".to_owned(),
                email,
                password: hash_password(&pass)?,
                is_admin: true,
            };
            Ok(Some(user::user::create(conn, &admin, &[])?))
        })
        .await?;

    if let Some(admin) = created {
        log::info!("created administrator {}", admin.email);
    }
    Ok(())
}

pub fn build_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
{
    Router::new()
        .route("/login", routing::post(login))
        .route("/me", routing::get(me))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: UserResource,
}

async fn login(
    State(repo): State<Repo>,
    State(lock): State<AuthRwLock>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let mut errors = ValidationErrors::new();
    errors.required("email", &request.email);
    errors.required("password", &request.password);
    errors.finish()?;

    let user = repo
        .run(move |conn| {
            let found = user::user::find_by_email(conn, request.email.trim())?
                .filter(|user| verify_password(&user.password, &request.password));
            let Some(user) = found else {
                return Err(ServiceError::Validation(ValidationErrors::single(
                    "email",
                    "These credentials do not match our records.",
                )));
            };
            let roles = user::user::roles_of(conn, &[user.id])?
                .remove(&user.id)
                .unwrap_or_default();
            Ok(UserResource::new(user, roles))
        })
        .await?;

    let token = Claim::for_user(user.id)
        .to_token(&lock)
        .map_err(|_| ServiceError::Internal("could not sign token".to_owned()))?;
    log::info!("user {} logged in", user.id);

    Ok(api::ok(LoginResponse { token, user }))
}

#[derive(Serialize)]
struct Me {
    #[serde(flatten)]
    user: UserResource,
    permissions: Vec<String>,
}

async fn me(principal: Principal, State(repo): State<Repo>) -> ApiResult<Me> {
    let mut permissions: Vec<String> = principal.permissions.into_iter().collect();
    permissions.sort_unstable();
    let user_id = principal.user.id;
    let found = principal.user;

    let user = repo
        .run(move |conn| {
            let roles = user::user::roles_of(conn, &[user_id])?
                .remove(&user_id)
                .unwrap_or_default();
            Ok(UserResource::new(found, roles))
        })
        .await?;

    Ok(api::ok(Me { user, permissions }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_their_password() {
        let hash = hash_password("s3cret-depot").unwrap();
        assert!(verify_password(&hash, "s3cret-depot"));
        assert!(!verify_password(&hash, "s3cret-depo"));
        assert!(!verify_password("not a hash", "s3cret-depot"));
    }
}
