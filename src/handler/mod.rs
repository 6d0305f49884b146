//! Request handler module
//!
//! Routing dispatch plus the auth, event and static page handlers.

pub mod auth;
pub mod events;
pub mod form;
pub mod pages;
pub mod router;


pub use router::handle_request;
