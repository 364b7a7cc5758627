use std::io::Error as IoError;
use std::num::ParseIntError;

use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use pulse::PulseError;
use thiserror::Error;

/// Startup failures
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Invalid OPSMON_PORT: {0}")]
    Port(#[from] ParseIntError),
    #[error("Configuration error: {0}")]
    Config(#[from] PulseError),
}

/// Request failures, rendered as `{"error": ...}` with status 500
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Pulse(#[from] PulseError),
    #[error("worker pool error: {0}")]
    Blocking(#[from] BlockingError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": self.to_string() }))
    }
}
