use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};

use crate::config::MongoSettings;
use crate::{AuditError, PredictError};

/// One successful prediction, as stored in the audit collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLogRecord {
    /// Client supplied upload name; untrusted.
    pub filename: Option<String>,
    pub predicted_sport: String,
    /// Percentage in [0, 100], unrounded.
    pub confidence: f64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl PredictionLogRecord {
    pub fn new(filename: Option<String>, predicted_sport: String, confidence: f64) -> Self {
        PredictionLogRecord {
            filename,
            predicted_sport,
            confidence,
            timestamp: Utc::now(),
        }
    }
}

/// Whether a failed audit write fails the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditPolicy {
    /// Log the failure and still answer the client.
    #[default]
    BestEffort,
    /// Report the failure to the client.
    Strict,
}

impl std::str::FromStr for AuditPolicy {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(AuditPolicy::BestEffort),
            "strict" => Ok(AuditPolicy::Strict),
            other => Err(PredictError::Configuration(format!(
                "unknown audit mode {:?}; use best-effort or strict",
                other
            ))),
        }
    }
}

/// Append-only destination for prediction records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn insert(&self, record: PredictionLogRecord) -> Result<(), AuditError>;
}

/// Audit sink backed by a MongoDB collection.
pub struct MongoAuditSink {
    collection: Collection<PredictionLogRecord>,
}

impl MongoAuditSink {
    /// Build the pooled client. No round trip is made until the first insert.
    pub async fn connect(settings: &MongoSettings) -> Result<Self, PredictError> {
        let uri = settings.connection_string.as_deref().ok_or_else(|| {
            PredictError::Configuration("MONGO_CONNECTION_STRING is not set".into())
        })?;

        let client = Client::with_uri_str(uri).await.map_err(|e| {
            PredictError::Configuration(format!("invalid document store connection string: {}", e))
        })?;

        info!(
            "Audit records go to {}.{}",
            settings.database, settings.collection
        );

        Ok(MongoAuditSink {
            collection: client
                .database(&settings.database)
                .collection(&settings.collection),
        })
    }
}

#[async_trait]
impl AuditSink for MongoAuditSink {
    async fn insert(&self, record: PredictionLogRecord) -> Result<(), AuditError> {
        self.collection
            .insert_one(record, None)
            .await
            .map(|_| ())
            .map_err(|e| AuditError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_timestamp_as_bson_datetime() {
        let record = PredictionLogRecord::new(Some("dunk.jpg".into()), "basketball".into(), 88.5);
        let doc = bson::to_document(&record).unwrap();

        assert_eq!(doc.get_str("predicted_sport").unwrap(), "basketball");
        assert_eq!(doc.get_f64("confidence").unwrap(), 88.5);
        assert!(doc.get_datetime("timestamp").is_ok());
    }

    #[test]
    fn absent_filename_is_stored_as_null() {
        let record = PredictionLogRecord::new(None, "polo".into(), 12.0);
        let doc = bson::to_document(&record).unwrap();
        assert_eq!(doc.get("filename"), Some(&bson::Bson::Null));
    }

    #[test]
    fn audit_mode_parses() {
        assert_eq!("strict".parse::<AuditPolicy>().unwrap(), AuditPolicy::Strict);
        assert_eq!(
            " Best-Effort ".parse::<AuditPolicy>().unwrap(),
            AuditPolicy::BestEffort
        );
        assert!("sometimes".parse::<AuditPolicy>().is_err());
    }

    #[tokio::test]
    async fn missing_connection_string_is_a_configuration_error() {
        let settings = MongoSettings::default();
        match MongoAuditSink::connect(&settings).await {
            Err(PredictError::Configuration(msg)) => {
                assert!(msg.contains("MONGO_CONNECTION_STRING"))
            }
            Err(other) => panic!("unexpected {}", other),
            Ok(_) => panic!("connected without a connection string"),
        }
    }
}
