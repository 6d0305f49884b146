//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body size limits, route
//! matching, method validation and dispatch to the auth, event and page
//! handlers. Also stamps the `Server` header and writes the access log.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, IF_NONE_MATCH, REFERER, SERVER, USER_AGENT,
};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::form::BoxError;
use super::pages::{self, PageRequest};
use super::{auth, events};
use crate::config::{AppState, HealthConfig};
use crate::error::AppError;
use crate::http::{self, FORM_METHODS, PAGE_METHODS};
use crate::logger::{self, AccessLogEntry};

/// POST-only routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormRoute {
    SignIn,
    SignUp,
    ForgotPassword,
    EventRegister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Liveness,
    Readiness,
    Events,
    Form(FormRoute),
    Static,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let is_head = req.method() == Method::HEAD;
    let entry = state
        .config
        .logging
        .access_log
        .then(|| access_entry(&req, peer_addr));

    let mut response = dispatch(req, &state).await;

    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server);
    }

    let body_bytes = response.body().size_hint().exact().unwrap_or(0);
    if is_head {
        *response.body_mut() = Full::new(Bytes::new());
    }

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = if is_head { 0 } else { body_bytes };
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Lowercase the path and drop a single trailing slash
fn normalize_route(path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    match lower.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => lower,
    }
}

fn classify(route: &str, health: &HealthConfig) -> Route {
    if health.enabled {
        if route.eq_ignore_ascii_case(&health.liveness_path) {
            return Route::Liveness;
        }
        if route.eq_ignore_ascii_case(&health.readiness_path) {
            return Route::Readiness;
        }
    }

    match route {
        "/event" => Route::Events,
        "/signin" => Route::Form(FormRoute::SignIn),
        "/signup" => Route::Form(FormRoute::SignUp),
        "/forgot-password" => Route::Form(FormRoute::ForgotPassword),
        "/event-register" => Route::Form(FormRoute::EventRegister),
        _ => Route::Static,
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get(CONTENT_LENGTH)?;
    let Ok(size_str) = content_length.to_str() else {
        logger::log_warning("Content-Length header contains non-ASCII characters");
        return None;
    };

    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
        _ => None,
    }
}

async fn dispatch<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    if let Some(resp) = check_body_size(req.headers(), state.config.http.max_body_size) {
        return resp;
    }

    let (parts, body) = req.into_parts();
    let route = normalize_route(parts.uri.path());
    let enable_cors = state.config.http.enable_cors;

    match classify(&route, &state.config.health) {
        Route::Form(form) => {
            if parts.method == Method::OPTIONS {
                return http::build_options_response(FORM_METHODS, enable_cors);
            }
            if parts.method != Method::POST {
                logger::log_warning(&format!("Method not allowed: {} {route}", parts.method));
                return http::build_405_response(FORM_METHODS);
            }

            let result = match form {
                FormRoute::SignIn => auth::sign_in(&parts.headers, body, state).await,
                FormRoute::SignUp => auth::sign_up(&parts.headers, body, state).await,
                FormRoute::ForgotPassword => Ok(auth::forgot_password()),
                FormRoute::EventRegister => events::register(&parts.headers, body, state).await,
            };
            result.unwrap_or_else(AppError::into_response)
        }
        page_route => {
            if parts.method == Method::OPTIONS {
                return http::build_options_response(PAGE_METHODS, enable_cors);
            }
            if parts.method != Method::GET && parts.method != Method::HEAD {
                // static files outside the page table are unknown to other methods
                if page_route == Route::Static && pages::page_file(&route).is_none() {
                    return http::build_404_response();
                }
                logger::log_warning(&format!("Method not allowed: {} {route}", parts.method));
                return http::build_405_response(PAGE_METHODS);
            }

            match page_route {
                Route::Liveness => http::build_health_response(true),
                Route::Readiness => readiness(state).await,
                Route::Events => events::list_events(state)
                    .await
                    .unwrap_or_else(AppError::into_response),
                _ => {
                    let page = PageRequest {
                        path: parts.uri.path(),
                        route: &route,
                        if_none_match: parts.headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok()),
                    };
                    pages::serve(&page, &state.config.site).await
                }
            }
        }
    }
}

async fn readiness(state: &AppState) -> Response<Full<Bytes>> {
    match state.store.ping().await {
        Ok(()) => http::build_health_response(true),
        Err(e) => {
            logger::log_warning(&format!("Readiness check failed: {e}"));
            http::build_health_response(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("/"), "/");
        assert_eq!(normalize_route("/Event"), "/event");
        assert_eq!(normalize_route("/signin/"), "/signin");
        assert_eq!(normalize_route("/Images/Stage.PNG"), "/images/stage.png");
    }

    #[test]
    fn test_classify() {
        let health = HealthConfig {
            enabled: true,
            liveness_path: "/healthz".to_string(),
            readiness_path: "/readyz".to_string(),
        };
        assert_eq!(classify("/event", &health), Route::Events);
        assert_eq!(classify("/signup", &health), Route::Form(FormRoute::SignUp));
        assert_eq!(
            classify("/forgot-password", &health),
            Route::Form(FormRoute::ForgotPassword)
        );
        assert_eq!(classify("/forget-password", &health), Route::Static);
        assert_eq!(classify("/healthz", &health), Route::Liveness);

        let disabled = HealthConfig {
            enabled: false,
            ..health
        };
        assert_eq!(classify("/healthz", &disabled), Route::Static);
    }

    #[test]
    fn test_check_body_size() {
        let mut headers = HeaderMap::new();
        assert!(check_body_size(&headers, 10).is_none());

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("10"));
        assert!(check_body_size(&headers, 10).is_none());

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("11"));
        let resp = check_body_size(&headers, 10).unwrap();
        assert_eq!(resp.status(), hyper::StatusCode::PAYLOAD_TOO_LARGE);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert!(check_body_size(&headers, 10).is_none());
    }
}
