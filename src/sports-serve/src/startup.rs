use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::audit::{AuditSink, MongoAuditSink};
use crate::classifier::Classifier;
use crate::config::ServiceConfig;
use crate::labels::LabelTable;
use crate::pipeline::Predictor;
use crate::PredictError;

/// Model and label table, loaded once per process.
pub struct Resources {
    pub labels: Arc<LabelTable>,
    pub classifier: Arc<dyn Classifier>,
}

impl Resources {
    pub fn load(config: &ServiceConfig) -> Result<Self, PredictError> {
        let labels = LabelTable::load(&config.class_names_path())?;
        let classifier = load_classifier(&config.model_path())?;

        check_label_width(classifier.as_ref(), &labels)?;

        Ok(Resources {
            labels: Arc::new(labels),
            classifier,
        })
    }
}

/// The label table must have one entry per model output.
pub fn check_label_width(
    classifier: &dyn Classifier,
    labels: &LabelTable,
) -> Result<(), PredictError> {
    match classifier.num_classes() {
        Some(k) if k != labels.len() => Err(PredictError::Configuration(format!(
            "model has {} outputs but {} class names were loaded",
            k,
            labels.len()
        ))),
        _ => Ok(()),
    }
}

#[cfg(feature = "tensorflow")]
pub fn load_classifier(path: &Path) -> Result<Arc<dyn Classifier>, PredictError> {
    Ok(Arc::new(crate::classifier::SavedModelClassifier::load(path)?))
}

#[cfg(not(feature = "tensorflow"))]
pub fn load_classifier(path: &Path) -> Result<Arc<dyn Classifier>, PredictError> {
    Err(PredictError::Configuration(format!(
        "cannot load {}: built without the `tensorflow` feature",
        path.display()
    )))
}

/// Load every shared resource in dependency order and assemble the pipeline.
pub async fn bootstrap(config: &ServiceConfig) -> Result<Predictor, PredictError> {
    let resources = Resources::load(config)?;
    let sink: Arc<dyn AuditSink> = Arc::new(MongoAuditSink::connect(&config.mongo).await?);

    info!(
        "Pipeline ready: {} classes, audit {:?}",
        resources.labels.len(),
        config.audit_policy
    );

    Ok(Predictor::new(
        resources.classifier,
        resources.labels,
        sink,
        config.audit_policy,
    ))
}
