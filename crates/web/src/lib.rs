//! Web application: configuration, request session, gating chain, HTML pages
//! and the JSON data API.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
