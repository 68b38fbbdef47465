//! HTTP(S) protocol surface and upload client for a LocalSend-compatible
//! node.

pub mod error;
pub mod serve;
pub mod server;
pub mod upload_client;

pub use error::ApiError;
pub use serve::{app_state, serve_http, serve_https};
pub use server::{router, AppState};
pub use upload_client::UploadClient;
