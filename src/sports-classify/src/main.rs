use log::{error, info};
use serde::Serialize;
use sports_serve::{classify_image, startup::Resources, Prediction, ServiceConfig};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "sports-classify",
    about = "Classify sports images with the same model the API serves"
)]
struct CmdArgs {
    #[structopt(
        long,
        parse(from_os_str),
        help = "Directory holding class_names.txt and the sports_classifier SavedModel"
    )]
    resource_dir: Option<PathBuf>,

    #[structopt(parse(from_os_str), required = true, help = "Image files to classify")]
    images: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Line<'a> {
    file: String,
    #[serde(flatten)]
    prediction: &'a Prediction,
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    let mut config = ServiceConfig::local().with_env_overrides()?;
    if let Some(dir) = args.resource_dir {
        config.resource_base_path = dir;
    }

    let resources = Resources::load(&config)?;
    info!("Classifying {} image(s)", args.images.len());

    let mut failures = 0;
    for path in &args.images {
        let result = fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|data| {
                classify_image(resources.classifier.as_ref(), &resources.labels, &data)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(classification) => {
                let prediction = Prediction::from(&classification);
                let line = Line {
                    file: path.display().to_string(),
                    prediction: &prediction,
                };
                println!("{}", serde_json::to_string(&line)?);
            }
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} image(s) failed", failures, args.images.len()).into());
    }

    Ok(())
}
