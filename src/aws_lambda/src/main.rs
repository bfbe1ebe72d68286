use bytes::Bytes;
use lambda_http::{http, run, service_fn, Body, Error, Request, RequestExt, Response};
use log::{debug, error};
use sports_serve::{bootstrap, routes, Predictor, ServiceConfig};
use std::sync::Arc;
use tower::ServiceBuilder;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Arc::new(ServiceConfig::serverless().with_env_overrides()?);

    let predictor = match bootstrap(&config).await {
        Ok(predictor) => Arc::new(predictor),
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };

    debug!("Loaded model in memory");

    let handler = ServiceBuilder::new()
        .layer(config.cors_policy.layer())
        .service(service_fn(move |event: Request| {
            let predictor = Arc::clone(&predictor);
            let config = Arc::clone(&config);
            async move { handle_request(event, &predictor, &config).await }
        }));

    debug!("Dispatching handler");
    run(handler).await
}

/// The request URI carries the API Gateway stage in front of the path
/// (`/prod/api/predict`); routes are matched against the path the client
/// actually called.
fn client_uri(event: &Request) -> Option<http::Uri> {
    let raw = event.raw_http_path().to_string();
    if raw.is_empty() {
        return None;
    }

    let path_and_query = match event.uri().query() {
        Some(query) => format!("{}?{}", raw, query),
        None => raw,
    };

    path_and_query.parse().ok()
}

async fn handle_request(
    event: Request,
    predictor: &Predictor,
    config: &ServiceConfig,
) -> Result<Response<Body>, Error> {
    let uri = client_uri(&event);
    let (mut parts, body) = event.into_parts();

    if let Some(uri) = uri {
        debug!("Routing {} as {}", parts.uri, uri);
        parts.uri = uri;
    }

    let raw = match body {
        Body::Empty => Bytes::new(),
        Body::Text(text) => Bytes::from(text),
        Body::Binary(data) => Bytes::from(data),
    };

    let response =
        routes::handle(predictor, config, http::Request::from_parts(parts, raw)).await;

    Ok(response.map(|b| Body::Text(String::from_utf8_lossy(&b).into_owned())))
}
