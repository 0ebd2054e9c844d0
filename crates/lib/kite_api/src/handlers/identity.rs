//! Identity service handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use crate::IdentityState;
use crate::error::AppResult;
use crate::models::{
    AuthUser, LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, RefreshRequest,
    RegisterRequest, RegisterResponse, ServiceInfoResponse, TokenResponse,
};
use crate::services::identity;

const TOKEN_TYPE: &str = "Bearer";

/// `GET /` — identity service liveness message.
pub async fn service_info_handler() -> Json<ServiceInfoResponse> {
    Json(ServiceInfoResponse {
        message: "Identity service is running".into(),
        version: kite_core::version().into(),
    })
}

/// `POST /register` — create an account and issue its first token pair.
pub async fn register_handler(
    State(state): State<IdentityState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(body) = body?;
    let reg = identity::register(
        state.store.as_ref(),
        &state.signer,
        &body.username,
        &body.email,
        &body.password,
    )
    .await?;

    let resp = match reg.tokens {
        Some(tokens) => RegisterResponse {
            success: true,
            message: "User registered successfully".into(),
            user: AuthUser::from(reg.user),
            tokens_issued: true,
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            expires_in: Some(tokens.expires_in),
        },
        None => RegisterResponse {
            success: true,
            message: "User registered, but tokens could not be issued. Please log in.".into(),
            user: AuthUser::from(reg.user),
            tokens_issued: false,
            access_token: None,
            refresh_token: None,
            expires_in: None,
        },
    };
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `POST /login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<IdentityState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(body) = body?;
    let (user, tokens) =
        identity::login(state.store.as_ref(), &state.signer, &body.email, &body.password).await?;
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        token_type: TOKEN_TYPE.into(),
        user_id: user.id,
    }))
}

/// `POST /refresh` — exchange a refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<IdentityState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(body) = body?;
    let tokens =
        identity::refresh(state.store.as_ref(), &state.signer, body.refresh_token.as_deref())
            .await?;
    Ok(Json(TokenResponse {
        success: true,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        token_type: TOKEN_TYPE.into(),
    }))
}

/// `POST /logout` — revoke a refresh token.
pub async fn logout_handler(
    State(state): State<IdentityState>,
    body: Result<Json<LogoutRequest>, JsonRejection>,
) -> AppResult<Json<LogoutResponse>> {
    let Json(body) = body?;
    identity::logout(state.store.as_ref(), body.refresh_token.as_deref()).await?;
    Ok(Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".into(),
    }))
}
