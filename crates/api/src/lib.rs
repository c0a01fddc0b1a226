//! HTTP API: correlation, bearer verification and the permission guard.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
