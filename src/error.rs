//! Handler error taxonomy
//!
//! Every failure a route can produce, mapped to a fixed client-facing
//! response. Underlying store and hashing errors are logged here and never
//! sent to the client.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use thiserror::Error;

use crate::http;
use crate::logger;
use crate::password::PasswordError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Malformed request body")]
    MalformedBody(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already exists")]
    UserExists,

    #[error("Error signing in")]
    SignIn(#[source] StoreError),

    #[error("Error registering user")]
    Registration(#[source] StoreError),

    #[error("Error processing credentials")]
    Hashing(#[from] PasswordError),

    #[error("Error inserting record")]
    EventInsert(#[source] StoreError),

    #[error("Error fetching events")]
    EventListing(#[source] StoreError),
}

impl AppError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MalformedBody(_) | Self::MissingCredentials | Self::UserExists => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::SignIn(_)
            | Self::Registration(_)
            | Self::Hashing(_)
            | Self::EventInsert(_)
            | Self::EventListing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            Self::MalformedBody(detail) => {
                logger::log_debug(&format!("Rejected request body: {detail}"));
            }
            Self::SignIn(e) | Self::Registration(e) | Self::EventInsert(e) | Self::EventListing(e) => {
                logger::log_error(&format!("{self}: {e}"));
            }
            Self::Hashing(e) => logger::log_error(&format!("{self}: {e}")),
            _ => {}
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        self.log();
        let status = self.status();

        match self {
            Self::EventListing(ref e) => http::build_json_response(
                status,
                &serde_json::json!({
                    "message": self.to_string(),
                    "error": { "kind": e.kind() },
                }),
            ),
            _ => http::build_text_response(status, self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_store_details_stay_server_side() {
        let err = AppError::Registration(StoreError::Operation(
            "connection to 10.0.0.5 refused".to_string(),
        ));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(resp).await, "Error registering user");
    }

    #[tokio::test]
    async fn test_event_listing_error_is_json() {
        let resp =
            AppError::EventListing(StoreError::Unavailable("timeout".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers()["content-type"], "application/json");

        let value: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(value["message"], "Error fetching events");
        assert_eq!(value["error"]["kind"], "unavailable");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::UserExists.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(AppError::InvalidCredentials.to_string(), "Invalid login credentials");
    }
}
