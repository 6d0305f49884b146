//! Event portal web backend
//!
//! Sign-in and sign-up against a document store, event registration and
//! listing, and the site's static pages, served over HTTP/1.1 with hyper.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod models;
pub mod password;
pub mod server;
pub mod store;
