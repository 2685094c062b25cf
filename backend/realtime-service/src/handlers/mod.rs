/// HTTP handlers for the realtime service
pub mod publish;
pub mod websocket;

use actix_web::{error::JsonPayloadError, web, HttpRequest};
use serde::Serialize;

use crate::error::AppError;

pub use publish::register_routes as register_publish;
pub use websocket::register_routes as register_websocket;

/// Response envelope shared by the publish API
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Malformed JSON bodies surface as 400 with the service's error envelope
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        AppError::BadRequest(err.to_string()).into()
    })
}
