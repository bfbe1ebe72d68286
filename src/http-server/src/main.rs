use http_body::{LengthLimitError, Limited};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Request, Response, Server};
use log::{error, info};
use sports_serve::{bootstrap, routes, PredictError, Predictor, ServiceConfig};
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceBuilder;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

async fn handle(
    req: Request<Body>,
    predictor: Arc<Predictor>,
    config: Arc<ServiceConfig>,
) -> Result<Response<Body>, Infallible> {
    let (parts, body) = req.into_parts();

    let raw = match body::to_bytes(Limited::new(body, config.max_upload_bytes)).await {
        Ok(raw) => raw,
        Err(err) => {
            let err = if err.downcast_ref::<LengthLimitError>().is_some() {
                PredictError::UploadTooLarge {
                    limit: config.max_upload_bytes,
                }
            } else {
                PredictError::Upload(format!("could not read request body: {}", err))
            };
            return Ok(routes::error_response(&err).map(Body::from));
        }
    };

    let response = routes::handle(&predictor, &config, Request::from_parts(parts, raw)).await;

    Ok(response.map(Body::from))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Arc::new(ServiceConfig::local().with_env_overrides()?);

    let predictor = match bootstrap(&config).await {
        Ok(predictor) => Arc::new(predictor),
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };

    let cors = config.cors_policy.layer();
    let shared = Arc::clone(&config);

    let make_service = make_service_fn(move |_conn: &AddrStream| {
        let predictor = Arc::clone(&predictor);
        let config = Arc::clone(&shared);

        let service = ServiceBuilder::new()
            .layer(cors.clone())
            .service(service_fn(move |req| {
                handle(req, Arc::clone(&predictor), Arc::clone(&config))
            }));

        async move { Ok::<_, Infallible>(service) }
    });

    let server = Server::bind(&config.bind_addr).serve(make_service);
    info!("Listening on http://{}", config.bind_addr);

    if let Err(e) = server.await {
        error!("server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
