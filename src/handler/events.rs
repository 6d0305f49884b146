//! Event listing and registration handlers

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};
use mongodb::bson::{doc, to_document};
use serde_json::Value;

use super::form::{read_form, BoxError};
use crate::config::AppState;
use crate::error::AppError;
use crate::http;
use crate::logger;
use crate::models::{document_to_json, EventRegistration};

/// Every registration in the events collection, unfiltered and unpaginated
pub async fn list_events(state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    let documents = state
        .store
        .find(state.events_collection(), doc! {})
        .await
        .map_err(AppError::EventListing)?;

    let events: Vec<Value> = documents.into_iter().map(document_to_json).collect();
    Ok(http::build_json_response(StatusCode::OK, &events))
}

pub async fn register<B>(
    headers: &HeaderMap,
    body: B,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let registration: EventRegistration =
        read_form(headers, body, state.config.http.max_body_size).await?;
    let document = to_document(&registration).map_err(|e| AppError::EventInsert(e.into()))?;

    state
        .store
        .insert_one(state.events_collection(), document)
        .await
        .map_err(AppError::EventInsert)?;

    logger::log_info("Record Inserted Successfully");
    Ok(http::build_redirect_response(&state.config.site.landing_path))
}
