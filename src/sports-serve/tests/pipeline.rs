mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat};
use sports_serve::{AuditPolicy, PredictError};
use support::*;

#[tokio::test]
async fn success_writes_exactly_one_matching_record() {
    let sink = Arc::new(RecordingSink::default());
    let predictor = predictor(
        Arc::new(RedClassifier::new(10)),
        sink.clone(),
        AuditPolicy::Strict,
    );

    let prediction = predictor
        .handle_predict(solid_png(RedClassifier::red_for(6), 400, 300), Some("swing.png".into()))
        .await
        .unwrap();

    assert_eq!(prediction.sport, "golf");
    assert!(prediction.confidence.ends_with('%'));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].predicted_sport, prediction.sport);
    assert_eq!(records[0].filename.as_deref(), Some("swing.png"));
    assert!((records[0].confidence - parse_percent(&prediction.confidence)).abs() <= 0.005);
}

#[tokio::test]
async fn every_channel_layout_yields_a_known_label() {
    let sink = Arc::new(RecordingSink::default());
    let predictor = predictor(
        Arc::new(RedClassifier::new(10)),
        sink.clone(),
        AuditPolicy::BestEffort,
    );
    let uploads = vec![
        encode(DynamicImage::new_rgb8(1, 1), ImageOutputFormat::Png),
        encode(DynamicImage::new_rgba8(1000, 7), ImageOutputFormat::Png),
        encode(DynamicImage::new_luma8(31, 640), ImageOutputFormat::Png),
        encode(DynamicImage::new_luma_a8(50, 50), ImageOutputFormat::Png),
        encode(DynamicImage::new_rgba8(64, 48), ImageOutputFormat::Gif),
        encode(DynamicImage::new_rgb8(225, 223), ImageOutputFormat::Jpeg(90)),
    ];
    let count = uploads.len();

    for upload in uploads {
        let prediction = predictor.handle_predict(upload, None).await.unwrap();
        assert!(SPORTS.contains(&prediction.sport.as_str()));
        let confidence = parse_percent(&prediction.confidence);
        assert!((0.0..=100.0).contains(&confidence));
    }

    assert_eq!(sink.records().len(), count);
}

#[tokio::test]
async fn undecodable_upload_is_not_audited() {
    let sink = Arc::new(RecordingSink::default());
    let classifier = Arc::new(RedClassifier::new(10));
    let predictor = predictor(classifier.clone(), sink.clone(), AuditPolicy::Strict);

    let err = predictor
        .handle_predict(Bytes::from_static(b"GIF89a but not really"), Some("x.gif".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, PredictError::Decode(_)));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn rejected_batch_is_an_inference_error_without_audit() {
    let sink = Arc::new(RecordingSink::default());
    let predictor = predictor(Arc::new(RejectingClassifier), sink.clone(), AuditPolicy::Strict);

    let err = predictor
        .handle_predict(solid_png(10, 8, 8), None)
        .await
        .unwrap_err();

    assert!(matches!(err, PredictError::Inference(_)));
    assert!(err.is_server_fault());
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn exact_tie_picks_the_lower_index() {
    let sink = Arc::new(RecordingSink::default());
    let mut row = vec![0.0; 10];
    row[3] = 4.0;
    row[7] = 4.0;
    let predictor = predictor(Arc::new(FixedClassifier(row)), sink, AuditPolicy::Strict);

    let prediction = predictor.handle_predict(solid_png(0, 4, 4), None).await.unwrap();
    assert_eq!(prediction.sport, SPORTS[3]);
}

#[tokio::test]
async fn class_past_the_label_table_is_an_error() {
    let sink = Arc::new(RecordingSink::default());
    let mut row = vec![0.0; 12];
    row[11] = 9.0;
    let predictor = predictor(Arc::new(FixedClassifier(row)), sink.clone(), AuditPolicy::Strict);

    let err = predictor
        .handle_predict(solid_png(0, 4, 4), None)
        .await
        .unwrap_err();

    match err {
        PredictError::LabelOutOfRange { index, len } => {
            assert_eq!(index, 11);
            assert_eq!(len, SPORTS.len());
        }
        other => panic!("unexpected {}", other),
    }
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn nan_scores_are_an_inference_error() {
    let sink = Arc::new(RecordingSink::default());
    let predictor = predictor(
        Arc::new(FixedClassifier(vec![f32::NAN; 10])),
        sink,
        AuditPolicy::Strict,
    );

    let err = predictor.handle_predict(solid_png(0, 4, 4), None).await.unwrap_err();
    assert!(matches!(err, PredictError::Inference(_)));
}

#[tokio::test]
async fn best_effort_audit_failure_still_answers() {
    let sink = Arc::new(DownSink::default());
    let predictor = predictor(
        Arc::new(RedClassifier::new(10)),
        sink.clone(),
        AuditPolicy::BestEffort,
    );

    let prediction = predictor
        .handle_predict(solid_png(RedClassifier::red_for(0), 10, 10), None)
        .await
        .unwrap();

    assert_eq!(prediction.sport, "archery");
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn strict_audit_failure_fails_the_request() {
    let sink = Arc::new(DownSink::default());
    let predictor = predictor(Arc::new(RedClassifier::new(10)), sink.clone(), AuditPolicy::Strict);

    let err = predictor
        .handle_predict(solid_png(0, 10, 10), None)
        .await
        .unwrap_err();

    assert!(matches!(err, PredictError::AuditSink(_)));
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_do_not_mix_results() {
    let sink = Arc::new(RecordingSink::default());
    let predictor = Arc::new(predictor(
        Arc::new(RedClassifier::new(10)),
        sink.clone(),
        AuditPolicy::Strict,
    ));

    let tasks: Vec<_> = (0..10)
        .map(|class| {
            let predictor = Arc::clone(&predictor);
            tokio::spawn(async move {
                let upload = solid_png(RedClassifier::red_for(class), 64 + class as u32, 48);
                let name = format!("upload-{}.png", class);
                let prediction = predictor.handle_predict(upload, Some(name)).await.unwrap();
                (class, prediction)
            })
        })
        .collect();

    for task in tasks {
        let (class, prediction) = task.await.unwrap();
        assert_eq!(prediction.sport, SPORTS[class]);
    }

    let mut records = sink.records();
    assert_eq!(records.len(), 10);
    records.sort_by(|a, b| a.filename.cmp(&b.filename));
    for (class, record) in records.iter().enumerate() {
        assert_eq!(record.filename.as_deref(), Some(format!("upload-{}.png", class).as_str()));
        assert_eq!(record.predicted_sport, SPORTS[class]);
    }
}
