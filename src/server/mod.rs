//! HTTP server exposing the task API.

mod api;

pub use api::{ApiServer, ServerHandle, build_router, start_server};
