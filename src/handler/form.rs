//! Request body decoding
//!
//! `application/json` bodies are parsed as JSON, everything else as an
//! urlencoded form. An empty body yields the form type's defaults.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::error::AppError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Collect at most `max_body_size` bytes of `body` and decode them as `T`
pub async fn read_form<T, B>(headers: &HeaderMap, body: B, max_body_size: u64) -> Result<T, AppError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<BoxError>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let bytes = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                AppError::PayloadTooLarge
            } else {
                AppError::MalformedBody(e.to_string())
            }
        })?
        .to_bytes();

    if is_json(headers) && !bytes.is_empty() {
        serde_json::from_slice(&bytes).map_err(|e| AppError::MalformedBody(e.to_string()))
    } else {
        serde_urlencoded::from_bytes(&bytes).map_err(|e| AppError::MalformedBody(e.to_string()))
    }
}
