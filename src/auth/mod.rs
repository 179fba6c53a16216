pub mod policy;
pub mod service;

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Mac, SimpleHmac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::api::ServiceError;
use crate::repo::user::{self, User};
use crate::repo::Repo;

pub use policy::{authorize, Action, Resource};

const TOKEN_DURATION: u64 = 2 * 24 * 60 * 60;

fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

pub struct Key {
    pub bytes: [u8; 32],
    pub expires: u64,
}

impl Key {
    pub fn generate(expires: u64) -> Self {
        let mut key = Key {
            bytes: [0; 32],
            expires,
        };
        OsRng.fill_bytes(&mut key.bytes);
        key
    }
}

/// Signing keys, oldest first. A key outlives the tokens it signed.
struct Secret {
    pub keys: VecDeque<Key>,
}

impl Secret {
    pub fn new() -> Self {
        Secret {
            keys: VecDeque::new(),
        }
    }

    pub fn rotate(&mut self) -> &Key {
        let current_timestamp = timestamp_now();

        while let Some(key) = self.keys.front() {
            if key.expires <= current_timestamp {
                self.keys.pop_front();
            } else {
                break;
            }
        }

        // A key keeps signing until less than one token lifetime is left.
        if self
            .keys
            .back()
            .map_or(true, |key| key.expires < current_timestamp + TOKEN_DURATION)
        {
            self.keys
                .push_back(Key::generate(current_timestamp + 2 * TOKEN_DURATION));
        }

        &self.keys[self.keys.len() - 1]
    }
}

#[derive(Clone)]
pub struct AuthRwLock(Arc<RwLock<Secret>>);

impl AuthRwLock {
    pub fn new() -> Self {
        AuthRwLock(Arc::new(RwLock::new(Secret::new())))
    }
}

impl Default for AuthRwLock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claim {
    pub user_id: i32,
    pub expires: u64,
}

#[derive(Debug)]
pub struct TokenError;

impl<T> From<T> for TokenError
where
    T: std::error::Error,
{
    fn from(_: T) -> Self {
        TokenError
    }
}

impl Claim {
    pub fn for_user(user_id: i32) -> Self {
        Claim {
            user_id,
            expires: timestamp_now() + TOKEN_DURATION,
        }
    }

    pub fn from_token(s: &str, lock: &AuthRwLock) -> Result<Self, TokenError> {
        let mut parts = s.split('.');

        let claim_raw = parts
            .next()
            .and_then(|t| STANDARD.decode(t).ok())
            .ok_or(TokenError)?;
        let signature_raw = parts
            .next()
            .and_then(|t| STANDARD.decode(t).ok())
            .ok_or(TokenError)?;

        if parts.next().is_some() {
            return Err(TokenError);
        }

        let current_timestamp = timestamp_now();

        let mut valid = false;
        {
            let secret = lock.0.read().map_err(|_| TokenError)?;

            for key in secret.keys.iter().rev() {
                if key.expires > current_timestamp {
                    let mut mac = SimpleHmac::<Sha256>::new_from_slice(&key.bytes)?;

                    mac.update(&claim_raw);
                    if mac.verify_slice(&signature_raw).is_ok() {
                        valid = true;
                        break;
                    }
                }
            }
        }
        if !valid {
            return Err(TokenError);
        }

        let claim: Claim = serde_cbor::from_slice(&claim_raw)?;
        if claim.expires <= current_timestamp {
            return Err(TokenError);
        }

        Ok(claim)
    }

    pub fn to_token(&self, lock: &AuthRwLock) -> Result<String, TokenError> {
        let mut mac = {
            let mut secret = lock.0.write().map_err(|_| TokenError)?;
            let key = secret.rotate();

            SimpleHmac::<Sha256>::new_from_slice(&key.bytes)?
        };

        let claim_bytes = serde_cbor::to_vec(self)?;
        mac.update(&claim_bytes);

        let signature_raw = mac.finalize().into_bytes();

        let claim_str = STANDARD.encode(&claim_bytes);
        let sig_str = STANDARD.encode(signature_raw);

        Ok(format!("{}.{}", claim_str, sig_str))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Claim
where
    AuthRwLock: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ServiceError::Unauthenticated)?;
        let lock = AuthRwLock::from_ref(state);

        Claim::from_token(bearer.token(), &lock).map_err(|_| ServiceError::Unauthenticated)
    }
}

/// The authenticated caller with everything the policy table needs.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub permissions: HashSet<String>,
}

impl Principal {
    pub fn load(conn: &mut diesel::PgConnection, user_id: i32) -> Result<Self, ServiceError> {
        // A token for a deleted user no longer authenticates.
        let user = user::user::find(conn, user_id).map_err(|err| match err {
            diesel::result::Error::NotFound => ServiceError::Unauthenticated,
            other => other.into(),
        })?;
        let permissions = user::user::permission_names(conn, user_id)?
            .into_iter()
            .collect();

        Ok(Principal { user, permissions })
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.is_admin() || self.permissions.contains(name)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claim = Claim::from_request_parts(parts, state).await?;
        let repo = Repo::from_ref(state);

        repo.run(move |conn| Principal::load(conn, claim.user_id))
            .await
    }
}

/// Principal for routes open to guests; a missing or invalid token yields `None`.
pub struct OptionalPrincipal(pub Option<Principal>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalPrincipal
where
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Principal::from_request_parts(parts, state).await {
            Ok(principal) => Ok(OptionalPrincipal(Some(principal))),
            Err(ServiceError::Unauthenticated) => Ok(OptionalPrincipal(None)),
            Err(other) => Err(other),
        }
    }
}
