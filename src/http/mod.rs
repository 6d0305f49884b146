//! HTTP protocol layer module
//!
//! Response builders, content types and conditional GET helpers shared by
//! the route handlers.

pub mod cache;
pub mod mime;
pub mod response;

pub use response::{
    build_304_response, build_404_response, build_405_response, build_413_response,
    build_file_response, build_health_response, build_json_response, build_options_response,
    build_redirect_response, build_text_response, FORM_METHODS, PAGE_METHODS,
};
