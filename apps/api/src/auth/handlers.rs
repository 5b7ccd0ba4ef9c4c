use axum::{extract::State, http::StatusCode, Json};

use super::service::{self, SigninOutcome, SigninResponse, SignupResponse};
use crate::errors::AppError;
use crate::identity::AuthUser;
use crate::state::AppState;

/// POST /api/v1/auth/signup
pub async fn handle_signup(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let created = service::signup(state.users.as_ref(), &claims).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /api/v1/auth/signin
pub async fn handle_signin(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<(StatusCode, Json<SigninResponse>), AppError> {
    let (status, message) = match service::signin(state.users.as_ref(), &claims).await? {
        SigninOutcome::Existing => (StatusCode::OK, "User signed in successfully"),
        SigninOutcome::Created => (StatusCode::CREATED, "User created and signed in"),
    };
    Ok((
        status,
        Json(SigninResponse {
            message: message.into(),
        }),
    ))
}
