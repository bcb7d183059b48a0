use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("not found")]
    NotFound,
    #[error("request too large")]
    RequestTooLarge,
    #[error("rate limited")]
    RateLimited { retry_after: Duration },
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorObj<'a> {
    pub code: &'a str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: ErrorObj<'a>,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::UnknownFunction(_) => "UnknownFunction",
            AppError::InvalidParameters(_) => "InvalidParameters",
            AppError::NotFound => "NotFound",
            AppError::RequestTooLarge => "RequestTooLarge",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::Upstream(_) => "Upstream",
            AppError::UpstreamTimeout(_) => "UpstreamTimeout",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::UnknownFunction(_) | AppError::InvalidParameters(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody<'static> {
        ErrorBody { error: ErrorObj { code: self.code(), message: self.to_string() } }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut resp = (self.status(), Json(self.body())).into_response();
        if let AppError::RateLimited { retry_after } = &self {
            // round up so clients never retry early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(v) = HeaderValue::from_str(&secs.max(1).to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        resp
    }
}
