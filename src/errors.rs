// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsignError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Index {index} is out of range for {len} images")]
    OutOfRange { index: usize, len: usize },

    #[error("Cannot add {requested} images, only {remaining} slots remain")]
    CapacityExceeded { requested: usize, remaining: usize },

    #[error("Classifier request failed: {0}")]
    Transport(String),

    #[error("Classifier returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("No image could be analyzed")]
    AnalysisUnavailable,

    #[error("A submission is already in progress")]
    SubmissionInFlight,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl ResponseError for ConsignError {
    fn error_response(&self) -> HttpResponse {
        let body = |category: &str| {
            serde_json::json!({
                "error": category,
                "message": self.to_string()
            })
        };

        match self {
            ConsignError::Validation(_) => {
                HttpResponse::UnprocessableEntity().json(body("Validation error"))
            }
            ConsignError::OutOfRange { .. } => HttpResponse::NotFound().json(body("Out of range")),
            ConsignError::CapacityExceeded { .. } => {
                HttpResponse::BadRequest().json(body("Too many images"))
            }
            ConsignError::Transport(_) | ConsignError::Upstream { .. } => {
                HttpResponse::BadGateway().json(body("AI service error"))
            }
            ConsignError::MalformedResponse(_) => {
                HttpResponse::BadGateway().json(body("Malformed AI response"))
            }
            ConsignError::AnalysisUnavailable => {
                HttpResponse::ServiceUnavailable().json(body("AI service error"))
            }
            ConsignError::SubmissionInFlight => {
                HttpResponse::Conflict().json(body("Submission in progress"))
            }
            ConsignError::SessionNotFound(_) => {
                HttpResponse::NotFound().json(body("Session not found"))
            }
            ConsignError::ItemNotFound(_) => HttpResponse::NotFound().json(body("Item not found")),
            ConsignError::ImageProcessing(_) => {
                HttpResponse::BadRequest().json(body("Image processing error"))
            }
            ConsignError::InvalidValue(_) => HttpResponse::BadRequest().json(body("Invalid value")),
        }
    }
}
