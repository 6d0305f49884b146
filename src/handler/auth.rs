//! Sign-in, sign-up and forgot-password handlers

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};
use mongodb::bson::{doc, to_document};

use super::form::{read_form, BoxError};
use crate::config::AppState;
use crate::error::AppError;
use crate::http;
use crate::logger;
use crate::models::{SignInForm, SignUpForm, UserRecord};
use crate::password;
use crate::store::StoreError;

const RESET_ACK: &str = "Password reset link sent to your email";

/// Verify credentials and redirect to the landing page. No session is issued.
pub async fn sign_in<B>(
    headers: &HeaderMap,
    body: B,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let form: SignInForm = read_form(headers, body, state.config.http.max_body_size).await?;

    let record = state
        .store
        .find_one(state.users_collection(), doc! { "email": form.email.as_str() })
        .await
        .map_err(AppError::SignIn)?;

    let Some(stored) = record
        .as_ref()
        .and_then(|user| user.get_str("password").ok())
        .map(ToString::to_string)
    else {
        password::verify_missing_in_background(form.password).await?;
        return Err(AppError::InvalidCredentials);
    };

    let valid = password::verify_in_background(
        form.password,
        stored,
        state.config.auth.legacy_plaintext,
    )
    .await?;

    if valid {
        Ok(http::build_redirect_response(&state.config.site.landing_path))
    } else {
        Err(AppError::InvalidCredentials)
    }
}

/// Create a user record. The unique index on `email` decides duplicates.
pub async fn sign_up<B>(
    headers: &HeaderMap,
    body: B,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let form: SignUpForm = read_form(headers, body, state.config.http.max_body_size).await?;
    if form.email.is_empty() || form.password.is_empty() {
        return Err(AppError::MissingCredentials);
    }

    let user = UserRecord {
        name: form.f_name,
        email: form.email,
        password: password::hash_in_background(form.password).await?,
    };
    let document = to_document(&user).map_err(|e| AppError::Registration(e.into()))?;

    match state.store.insert_one(state.users_collection(), document).await {
        Ok(_) => {
            logger::log_info("User registered successfully");
            Ok(http::build_redirect_response(&state.config.site.landing_path))
        }
        Err(StoreError::Duplicate(_)) => Err(AppError::UserExists),
        Err(e) => Err(AppError::Registration(e)),
    }
}

/// Acknowledge a reset request. Nothing is looked up or sent.
pub fn forgot_password() -> Response<Full<Bytes>> {
    http::build_text_response(StatusCode::OK, RESET_ACK)
}
