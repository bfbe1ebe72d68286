//! Sports image classification behind a small HTTP surface.
//!
//! An uploaded image is decoded, squashed to 224x224 RGB and run through a
//! pre-trained classifier; the top class and its confidence are returned and
//! one audit record per successful prediction is written to a document store.

pub mod audit;
pub mod classifier;
pub mod config;
mod error;
pub mod labels;
pub mod pipeline;
pub mod preprocess;
pub mod routes;
pub mod scoring;
pub mod startup;
mod timer;

pub use audit::{AuditPolicy, AuditSink, MongoAuditSink, PredictionLogRecord};
pub use classifier::Classifier;
#[cfg(feature = "tensorflow")]
pub use classifier::SavedModelClassifier;
pub use config::{CorsPolicy, MongoSettings, ServiceConfig};
pub use error::{AuditError, ClassifierError, PredictError};
pub use labels::LabelTable;
pub use pipeline::{classify_image, Classification, Prediction, Predictor};
pub use preprocess::ImageBatch;
pub use startup::{bootstrap, Resources};
pub use timer::Timer;
