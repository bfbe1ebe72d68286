#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use sports_serve::{
    AuditError, AuditPolicy, AuditSink, ClassifierError, Classifier, ImageBatch, LabelTable,
    PredictionLogRecord, Predictor,
};

pub const SPORTS: [&str; 10] = [
    "archery",
    "baseball",
    "basketball",
    "bowling",
    "cricket",
    "fencing",
    "golf",
    "hockey",
    "rugby",
    "tennis",
];

pub fn labels() -> Arc<LabelTable> {
    Arc::new(LabelTable::new(SPORTS.iter().map(|s| s.to_string()).collect()).unwrap())
}

/// Scores class `mean red * classes / 256` far above the rest, so a solid
/// color maps to a known class.
pub struct RedClassifier {
    pub classes: usize,
    pub calls: AtomicUsize,
}

impl RedClassifier {
    pub fn new(classes: usize) -> Self {
        RedClassifier {
            classes,
            calls: AtomicUsize::new(0),
        }
    }

    /// Red value that lands in `class`.
    pub fn red_for(class: usize) -> u8 {
        (class * 25 + 12) as u8
    }
}

impl Classifier for RedClassifier {
    fn infer(&self, batch: &ImageBatch) -> Result<Vec<Vec<f32>>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(batch.shape(), [1, 224, 224, 3]);

        let reds: Vec<f32> = batch.pixels().iter().step_by(3).copied().collect();
        let mean = reds.iter().sum::<f32>() / reds.len() as f32;
        let winner = ((mean / 256.0) * self.classes as f32) as usize;

        let mut row = vec![0.0; self.classes];
        row[winner.min(self.classes - 1)] = 10.0;
        Ok(vec![row])
    }

    fn num_classes(&self) -> Option<usize> {
        Some(self.classes)
    }
}

/// Returns the same row for every input.
pub struct FixedClassifier(pub Vec<f32>);

impl Classifier for FixedClassifier {
    fn infer(&self, _: &ImageBatch) -> Result<Vec<Vec<f32>>, ClassifierError> {
        Ok(vec![self.0.clone()])
    }
}

pub struct RejectingClassifier;

impl Classifier for RejectingClassifier {
    fn infer(&self, batch: &ImageBatch) -> Result<Vec<Vec<f32>>, ClassifierError> {
        Err(ClassifierError::Rejected(format!(
            "expected [1, 299, 299, 3], got {:?}",
            batch.shape()
        )))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<PredictionLogRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<PredictionLogRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn insert(&self, record: PredictionLogRecord) -> Result<(), AuditError> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

#[derive(Default)]
pub struct DownSink {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl AuditSink for DownSink {
    async fn insert(&self, _: PredictionLogRecord) -> Result<(), AuditError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AuditError("server selection timeout".into()))
    }
}

pub fn predictor(
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn AuditSink>,
    policy: AuditPolicy,
) -> Predictor {
    Predictor::new(classifier, labels(), sink, policy)
}

pub fn encode(image: DynamicImage, format: ImageOutputFormat) -> Bytes {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    Bytes::from(buf.into_inner())
}

pub fn solid_png(red: u8, width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([red, 40, 90]));
    encode(DynamicImage::ImageRgb8(img), ImageOutputFormat::Png)
}

pub const BOUNDARY: &str = "sports-boundary-7MA4YWxk";

/// Multipart body with a single part named `field`.
pub fn multipart(field: &str, filename: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    match filename {
        Some(name) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                field, name
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", field).as_bytes(),
        ),
    }
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Parse `"NN.NN%"` back into a number.
pub fn parse_percent(s: &str) -> f64 {
    s.strip_suffix('%').unwrap().parse().unwrap()
}
