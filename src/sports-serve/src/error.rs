use http::StatusCode;
use thiserror::Error;

/// Failure raised by a [`Classifier`](crate::Classifier) while running a batch.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("batch rejected: {0}")]
    Rejected(String),

    #[error("unusable output: {0}")]
    Output(String),
}

/// Failure to append a record to the audit sink.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AuditError(pub String);

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("inference failed: {0}")]
    Inference(#[from] ClassifierError),

    #[error("predicted class {index} is outside the label table ({len} labels)")]
    LabelOutOfRange { index: usize, len: usize },

    #[error("audit log write failed: {0}")]
    AuditSink(#[from] AuditError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid upload: {0}")]
    Upload(String),

    #[error("upload exceeds {limit} bytes")]
    UploadTooLarge { limit: usize },
}

impl PredictError {
    /// HTTP status reported to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::Decode(_) => StatusCode::BAD_REQUEST,
            PredictError::Upload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PredictError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::Inference(_)
            | PredictError::LabelOutOfRange { .. }
            | PredictError::AuditSink(_)
            | PredictError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure points at the deployment rather than the request.
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }
}
