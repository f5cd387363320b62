use axum::{extract::State, http::StatusCode, Json};
use boxkeeper_inventory::{Error, Registration};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{LoginRequest, LoginResponse, MessageResponse};
use crate::AppState;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Registration>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    tracing::info!("Register request received for username: {}", payload.username);

    state.keeper.register(payload).await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(
            "Registration successful. You can now log in with your new account.",
        )),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if payload.password.is_empty() || payload.password.len() > 128 {
        return Err(Error::WrongPassword.into());
    }

    let token = state
        .keeper
        .login(&payload.email, &payload.password)
        .await
        .map_err(|e| match e {
            Error::NotFound => ApiError::with_message(
                Error::NotFound,
                "No account found with the provided email address. Please check your email and try again.",
            ),
            other => other.into(),
        })?;

    Ok(Json(LoginResponse {
        token,
        message: "Login successful. Welcome back!".to_string(),
    }))
}
