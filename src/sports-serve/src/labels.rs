use std::fs;
use std::path::Path;

use log::info;

use crate::PredictError;

/// Ordered class names; entry `i` names output channel `i` of the classifier.
#[derive(Debug, Clone)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Result<Self, PredictError> {
        if labels.is_empty() {
            return Err(PredictError::Configuration("label table is empty".into()));
        }

        Ok(LabelTable { labels })
    }

    /// Parse one label per line. Lines are trimmed and trailing blank lines
    /// dropped; a blank line in the middle still occupies its index.
    pub fn parse(text: &str) -> Result<Self, PredictError> {
        let mut labels: Vec<String> = text.lines().map(|l| l.trim().to_owned()).collect();

        while labels.last().map_or(false, |l| l.is_empty()) {
            labels.pop();
        }

        Self::new(labels)
    }

    pub fn load(path: &Path) -> Result<Self, PredictError> {
        let text = fs::read_to_string(path).map_err(|e| {
            PredictError::Configuration(format!(
                "could not read class names from {}: {}",
                path.display(),
                e
            ))
        })?;

        let table = Self::parse(&text)?;
        info!("Loaded {} class names from {}", table.len(), path.display());

        Ok(table)
    }

    pub fn get(&self, index: usize) -> Result<&str, PredictError> {
        self.labels
            .get(index)
            .map(String::as_str)
            .ok_or(PredictError::LabelOutOfRange {
                index,
                len: self.labels.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
