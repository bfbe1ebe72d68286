use std::sync::Arc;

use bytes::Bytes;
use log::{error, info, warn};
use serde::Serialize;

use crate::audit::{AuditPolicy, AuditSink, PredictionLogRecord};
use crate::classifier::Classifier;
use crate::labels::LabelTable;
use crate::preprocess;
use crate::scoring::{argmax, format_confidence, softmax, to_percent};
use crate::{ClassifierError, PredictError, Timer};

/// Top class for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    /// Percentage in [0, 100].
    pub confidence: f64,
}

/// Response body of the predict endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub sport: String,
    /// Two decimals and a trailing `%`.
    pub confidence: String,
}

impl From<&Classification> for Prediction {
    fn from(c: &Classification) -> Self {
        Prediction {
            sport: c.label.clone(),
            confidence: format_confidence(c.confidence),
        }
    }
}

/// Decode, preprocess and classify one encoded image. Blocking.
pub fn classify_image(
    classifier: &dyn Classifier,
    labels: &LabelTable,
    data: &[u8],
) -> Result<Classification, PredictError> {
    let mut t = Timer::start("Decoding image");
    let image = preprocess::decode(data)?;
    t.stop();

    let mut t = Timer::start("Resizing image");
    let batch = preprocess::prepare(&image);
    t.stop();

    let output = classifier.infer(&batch)?;
    let row = output
        .first()
        .ok_or_else(|| ClassifierError::Output("no output rows".into()))?;

    let probabilities = softmax(row);
    let index = argmax(&probabilities)
        .ok_or_else(|| ClassifierError::Output("no finite class scores".into()))?;
    let label = labels.get(index)?;

    Ok(Classification {
        label: label.to_owned(),
        confidence: to_percent(probabilities[index]),
    })
}

/// The request pipeline: classification followed by one audit write.
///
/// Holds only read-only shared state, so one instance serves every request.
pub struct Predictor {
    classifier: Arc<dyn Classifier>,
    labels: Arc<LabelTable>,
    sink: Arc<dyn AuditSink>,
    audit_policy: AuditPolicy,
}

impl Predictor {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        labels: Arc<LabelTable>,
        sink: Arc<dyn AuditSink>,
        audit_policy: AuditPolicy,
    ) -> Self {
        Predictor {
            classifier,
            labels,
            sink,
            audit_policy,
        }
    }

    pub async fn handle_predict(
        &self,
        data: Bytes,
        filename: Option<String>,
    ) -> Result<Prediction, PredictError> {
        let classifier = Arc::clone(&self.classifier);
        let labels = Arc::clone(&self.labels);

        let classification = tokio::task::spawn_blocking(move || {
            classify_image(classifier.as_ref(), &labels, &data)
        })
        .await
        .map_err(|e| ClassifierError::Rejected(format!("inference task failed: {}", e)))?;

        let classification = match classification {
            Ok(c) => c,
            Err(err) => {
                if err.is_server_fault() {
                    error!("Prediction failed: {}", err);
                } else {
                    info!("Rejected upload {:?}: {}", filename, err);
                }
                return Err(err);
            }
        };

        info!(
            "Predicted {} ({:.2}%) for {:?}",
            classification.label, classification.confidence, filename
        );

        let response = Prediction::from(&classification);
        let record =
            PredictionLogRecord::new(filename, classification.label, classification.confidence);

        self.audit(record).await?;

        Ok(response)
    }

    /// The insert runs on its own task so a dropped request future cannot
    /// cut it short.
    async fn audit(&self, record: PredictionLogRecord) -> Result<(), PredictError> {
        let sink = Arc::clone(&self.sink);
        let result = tokio::spawn(async move { sink.insert(record).await })
            .await
            .unwrap_or_else(|e| Err(crate::AuditError(format!("audit task failed: {}", e))));

        match (result, self.audit_policy) {
            (Ok(()), _) => Ok(()),
            (Err(err), AuditPolicy::BestEffort) => {
                warn!("Audit log write failed, answering anyway: {}", err);
                Ok(())
            }
            (Err(err), AuditPolicy::Strict) => {
                error!("Audit log write failed: {}", err);
                Err(err.into())
            }
        }
    }
}
