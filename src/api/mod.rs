//! HTTP API module

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{route, ApiServer, HttpRequest, HttpResponse};
