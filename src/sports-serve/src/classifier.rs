use crate::preprocess::ImageBatch;
use crate::ClassifierError;

/// A loaded, immutable classification model.
///
/// `infer` takes an NHWC batch and returns one row of raw class scores per
/// batch item. Implementations must be safe to call from many requests at
/// once.
pub trait Classifier: Send + Sync {
    fn infer(&self, batch: &ImageBatch) -> Result<Vec<Vec<f32>>, ClassifierError>;

    /// Width of an output row, if the artifact declares it.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

/// Split a flat `[rows, width]` output buffer into rows.
pub(crate) fn split_rows(values: &[f32], dims: &[u64]) -> Result<Vec<Vec<f32>>, ClassifierError> {
    let (rows, width) = match dims {
        [rows, width] => (*rows as usize, *width as usize),
        _ => {
            return Err(ClassifierError::Output(format!(
                "expected a [batch, classes] tensor, got shape {:?}",
                dims
            )))
        }
    };

    if width == 0 || values.len() != rows * width {
        return Err(ClassifierError::Output(format!(
            "{} values do not fill shape {:?}",
            values.len(),
            dims
        )));
    }

    Ok(values.chunks(width).map(|c| c.to_vec()).collect())
}

#[cfg(feature = "tensorflow")]
pub use self::saved_model::SavedModelClassifier;

#[cfg(feature = "tensorflow")]
mod saved_model {
    use std::path::Path;

    use log::{debug, info};
    use tensorflow::{
        Graph, SavedModelBundle, SessionOptions, SessionRunArgs, Tensor,
        DEFAULT_SERVING_SIGNATURE_DEF_KEY,
    };

    use super::{split_rows, Classifier};
    use crate::preprocess::ImageBatch;
    use crate::{ClassifierError, PredictError, Timer};

    /// Graph endpoint named by the serving signature.
    struct Endpoint {
        op: String,
        index: i32,
    }

    /// TensorFlow SavedModel exported with the `serve` tag.
    pub struct SavedModelClassifier {
        /// TensorFlow model graph
        graph: Graph,

        /// Loaded bundle holding the session
        bundle: SavedModelBundle,

        input: Endpoint,
        output: Endpoint,

        /// Output width from the signature, when fully defined
        classes: Option<usize>,
    }

    impl SavedModelClassifier {
        pub fn load(export_dir: &Path) -> Result<Self, PredictError> {
            let mut t = Timer::start("Loading SavedModel");

            let mut graph = Graph::new();
            let bundle =
                SavedModelBundle::load(&SessionOptions::new(), &["serve"], &mut graph, export_dir)
                    .map_err(|e| {
                        PredictError::Configuration(format!(
                            "could not load model from {}: {}",
                            export_dir.display(),
                            e
                        ))
                    })?;

            let (input, output, classes) = {
                let signature = bundle
                    .meta_graph_def()
                    .get_signature(DEFAULT_SERVING_SIGNATURE_DEF_KEY)
                    .map_err(|e| PredictError::Configuration(e.to_string()))?;

                let only = |kind: &str, count: usize| {
                    PredictError::Configuration(format!(
                        "serving signature must have exactly one {}, found {}",
                        kind, count
                    ))
                };
                if signature.inputs().len() != 1 {
                    return Err(only("input", signature.inputs().len()));
                }
                if signature.outputs().len() != 1 {
                    return Err(only("output", signature.outputs().len()));
                }

                let input_info = signature
                    .inputs()
                    .values()
                    .next()
                    .ok_or_else(|| only("input", 0))?;
                let output_info = signature
                    .outputs()
                    .values()
                    .next()
                    .ok_or_else(|| only("output", 0))?;

                let shape = output_info.shape();
                let classes = match shape.dims() {
                    Some(2) => shape[1].map(|d| d as usize),
                    _ => None,
                };

                (
                    Endpoint {
                        op: input_info.name().name.clone(),
                        index: input_info.name().index,
                    },
                    Endpoint {
                        op: output_info.name().name.clone(),
                        index: output_info.name().index,
                    },
                    classes,
                )
            };

            // Fail at startup rather than on the first request.
            graph
                .operation_by_name_required(&input.op)
                .and_then(|_| graph.operation_by_name_required(&output.op))
                .map_err(|e| PredictError::Configuration(e.to_string()))?;

            t.stop();
            info!(
                "Model ready: input {}:{}, output {}:{}, classes {:?}",
                input.op, input.index, output.op, output.index, classes
            );

            Ok(SavedModelClassifier {
                graph,
                bundle,
                input,
                output,
                classes,
            })
        }
    }

    impl Classifier for SavedModelClassifier {
        fn infer(&self, batch: &ImageBatch) -> Result<Vec<Vec<f32>>, ClassifierError> {
            let mut t = Timer::start("Running session");

            let dims: Vec<u64> = batch.shape().iter().map(|&d| d as u64).collect();
            let input = Tensor::new(&dims)
                .with_values(batch.pixels())
                .map_err(|e| ClassifierError::Rejected(e.to_string()))?;

            let rejected = |e: tensorflow::Status| ClassifierError::Rejected(e.to_string());

            let mut args = SessionRunArgs::new();
            args.add_feed(
                &self
                    .graph
                    .operation_by_name_required(&self.input.op)
                    .map_err(rejected)?,
                self.input.index,
                &input,
            );
            let token = args.request_fetch(
                &self
                    .graph
                    .operation_by_name_required(&self.output.op)
                    .map_err(rejected)?,
                self.output.index,
            );

            self.bundle.session.run(&mut args).map_err(rejected)?;
            let output: Tensor<f32> = args
                .fetch(token)
                .map_err(|e| ClassifierError::Output(e.to_string()))?;

            t.stop();
            debug!("Output shape {:?}", output.dims());

            split_rows(&output, output.dims())
        }

        fn num_classes(&self) -> Option<usize> {
            self.classes
        }
    }
}
