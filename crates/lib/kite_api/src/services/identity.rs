//! Identity service flows: token issuance, registration, login, refresh
//! rotation and logout, on top of `kite_core::auth` and the identity store.
//!
//! Each flow orders its writes so that abandoning it at any await point leaves
//! the user either with their previous grants or with none, never with a
//! grant that was not issued through [`issue_tokens`].

use chrono::Utc;
use kite_core::auth::jwt::ACCESS_TOKEN_EXPIRY_SECS;
use kite_core::auth::refresh::{generate_refresh_token, hash_refresh_token, refresh_token_expiry};
use kite_core::auth::{AccessTokenSigner, password, validation};
use kite_core::models::auth::{NewUser, TokenPair, User};
use kite_core::store::{IdentityStore, StoreError};
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};

/// Outcome of a registration.
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    /// `None` when the user was persisted but tokens could not be issued.
    pub tokens: Option<TokenPair>,
}

// ---------------------------------------------------------------------------
// Password hashing (off the async runtime)
// ---------------------------------------------------------------------------

async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hash task: {e}")))?
        .map_err(AppError::from)
}

async fn verify_password(password: String, hash: Option<String>) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => password::verify_password(&password, &hash),
        None => Ok(password::verify_dummy(&password)),
    })
    .await
    .map_err(|e| AppError::Internal(format!("verify task: {e}")))?
    .map_err(AppError::from)
}

// ---------------------------------------------------------------------------
// Token issuance
// ---------------------------------------------------------------------------

/// Issue an access + refresh token pair for a persisted user.
///
/// The refresh token is stored before anything is returned; a storage
/// failure fails the whole issuance. Prior refresh tokens are left alone.
pub async fn issue_tokens(
    store: &dyn IdentityStore,
    signer: &AccessTokenSigner,
    user: &User,
) -> AppResult<TokenPair> {
    let access_token = signer.sign(user)?;
    let refresh_token = generate_refresh_token();
    let token_hash = hash_refresh_token(&refresh_token);

    store
        .insert_refresh_token(&token_hash, user.id, refresh_token_expiry(Utc::now()))
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: ACCESS_TOKEN_EXPIRY_SECS,
    })
}

// ---------------------------------------------------------------------------
// Public flows
// ---------------------------------------------------------------------------

/// Register a new account and issue its first token pair.
///
/// Uniqueness of username and email is decided by the store in the insert
/// itself. If issuance fails after the insert, the account is kept and the
/// registration is returned without tokens.
pub async fn register(
    store: &dyn IdentityStore,
    signer: &AccessTokenSigner,
    username: &str,
    email: &str,
    password: &str,
) -> AppResult<Registration> {
    let username = validation::normalize_username(username);
    let email = validation::normalize_email(email);
    validation::validate_registration(&username, &email, password)?;

    let password_hash = hash_password(password.to_string()).await?;

    let user = store
        .insert_user(NewUser {
            username,
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(constraint) => {
                warn!(constraint = %constraint, "registration rejected: user already exists");
                AppError::Conflict("User already exists".into())
            }
            other => AppError::from(other),
        })?;
    info!(user_id = %user.id, "user registered");

    let tokens = match issue_tokens(store, signer, &user).await {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            error!(user_id = %user.id, error = %e, "user registered but token issuance failed");
            None
        }
    };

    Ok(Registration { user, tokens })
}

/// Authenticate with email + password. Revokes every earlier refresh token
/// of the user before issuing a fresh pair.
pub async fn login(
    store: &dyn IdentityStore,
    signer: &AccessTokenSigner,
    email: &str,
    password: &str,
) -> AppResult<(User, TokenPair)> {
    let email = validation::normalize_email(email);
    validation::validate_login(&email, password)?;

    let found = store.find_user_by_email(&email).await?;
    let hash = found.as_ref().map(|u| u.password_hash.clone());
    let password_ok = verify_password(password.to_string(), hash).await?;

    let user = match found {
        Some(found) if password_ok => found.user,
        Some(found) => {
            warn!(user_id = %found.user.id, "login rejected: wrong password");
            return Err(AppError::InvalidCredentials);
        }
        None => {
            warn!("login rejected: unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    let revoked = store.delete_refresh_tokens_for_user(user.id).await?;
    info!(user_id = %user.id, revoked, "previous refresh tokens revoked on login");

    let tokens = issue_tokens(store, signer, &user).await?;
    Ok((user, tokens))
}

/// Exchange a refresh token for a new pair (single-use rotation).
///
/// The presented token is deleted first, so it is unusable afterwards even
/// if the new issuance fails.
pub async fn refresh(
    store: &dyn IdentityStore,
    signer: &AccessTokenSigner,
    refresh_token: Option<&str>,
) -> AppResult<TokenPair> {
    let refresh_token = refresh_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Refresh token is required".into()))?;

    let record = store
        .take_refresh_token(&hash_refresh_token(refresh_token))
        .await?
        .ok_or_else(|| AppError::InvalidToken("Invalid or expired refresh token".into()))?;

    if record.is_expired_at(Utc::now()) {
        info!(user_id = %record.user_id, "expired refresh token presented and removed");
        return Err(AppError::InvalidToken(
            "Invalid or expired refresh token".into(),
        ));
    }

    let Some(user) = store.find_user_by_id(record.user_id).await? else {
        warn!(user_id = %record.user_id, "orphaned refresh token presented and removed");
        return Err(AppError::InvalidToken(
            "Invalid or expired refresh token".into(),
        ));
    };

    let tokens = issue_tokens(store, signer, &user).await?;
    info!(user_id = %user.id, "refresh token rotated");
    Ok(tokens)
}

/// Revoke a single refresh token.
///
/// An unknown or already revoked token is a client error and changes
/// nothing.
pub async fn logout(store: &dyn IdentityStore, refresh_token: Option<&str>) -> AppResult<()> {
    let refresh_token = refresh_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Refresh token is required for logout".into()))?;

    let record = store
        .take_refresh_token(&hash_refresh_token(refresh_token))
        .await?
        .ok_or_else(|| {
            warn!("logout with unknown or already revoked refresh token");
            AppError::StaleRefreshToken("Invalid refresh token or already logged out".into())
        })?;

    info!(user_id = %record.user_id, "user logged out");
    Ok(())
}
