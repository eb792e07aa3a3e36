//! HTTP surface of the APK Depot.
//!
//! Four JSON/multipart endpoints over the depot, plus static serving of
//! stored APKs under `/uploads` and the browser front-end.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
