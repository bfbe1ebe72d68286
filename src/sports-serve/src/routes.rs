//! HTTP surface shared by the local server and the serverless function.
//!
//! Front-ends collect the request body into [`Bytes`], call [`handle`] and
//! convert the response back into their own body type. CORS is not handled
//! here; wrap the service in [`CorsPolicy::layer`](crate::CorsPolicy::layer).

use std::convert::Infallible;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap};
use http::{Method, Request, Response, StatusCode};
use log::debug;
use serde::Serialize;
use serde_json::json;

use crate::config::ServiceConfig;
use crate::pipeline::Predictor;
use crate::PredictError;

pub const LIVENESS_MESSAGE: &str = "Sports Classifier API is running!";

/// Multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Liveness,
    Predict,
}

fn resolve(config: &ServiceConfig, path: &str) -> Option<Route> {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };

    if path == "/" || (!config.route_prefix.is_empty() && path == config.prefixed("")) {
        Some(Route::Liveness)
    } else if path == config.prefixed("/predict") {
        Some(Route::Predict)
    } else {
        None
    }
}

pub async fn handle(
    predictor: &Predictor,
    config: &ServiceConfig,
    req: Request<Bytes>,
) -> Response<Bytes> {
    debug!("{} {}", req.method(), req.uri().path());

    let route = match resolve(config, req.uri().path()) {
        Some(route) => route,
        None => return detail(StatusCode::NOT_FOUND, "Not Found"),
    };

    match (route, req.method()) {
        (Route::Liveness, &Method::GET) | (Route::Liveness, &Method::HEAD) => {
            json_response(StatusCode::OK, &json!({ "message": LIVENESS_MESSAGE }))
        }
        (Route::Predict, &Method::POST) => {
            match predict(predictor, config, req.headers(), req.body().clone()).await {
                Ok(body) => body,
                Err(err) => error_response(&err),
            }
        }
        _ => detail(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
    }
}

async fn predict(
    predictor: &Predictor,
    config: &ServiceConfig,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response<Bytes>, PredictError> {
    if body.len() > config.max_upload_bytes {
        return Err(PredictError::UploadTooLarge {
            limit: config.max_upload_bytes,
        });
    }

    let upload = extract_upload(headers, body).await?;
    let prediction = predictor
        .handle_predict(upload.data, upload.filename)
        .await?;

    Ok(json_response(StatusCode::OK, &prediction))
}

/// The `file` part of a multipart form.
#[derive(Debug)]
pub struct Upload {
    pub filename: Option<String>,
    pub data: Bytes,
}

pub async fn extract_upload(headers: &HeaderMap, body: Bytes) -> Result<Upload, PredictError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PredictError::Upload("expected a multipart/form-data body".into()))?;

    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| PredictError::Upload(e.to_string()))?;

    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PredictError::Upload(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_owned);
        let data = field
            .bytes()
            .await
            .map_err(|e| PredictError::Upload(e.to_string()))?;

        return Ok(Upload { filename, data });
    }

    Err(PredictError::Upload(format!(
        "missing form field `{}`",
        UPLOAD_FIELD
    )))
}

/// Client errors carry their cause; server faults answer with the bare
/// reason phrase, the cause stays in the log.
pub fn error_response(err: &PredictError) -> Response<Bytes> {
    let status = err.status();
    if err.is_server_fault() {
        return detail(status, status.canonical_reason().unwrap_or("Internal Server Error"));
    }

    detail(status, &err.to_string())
}

fn detail(status: StatusCode, message: &str) -> Response<Bytes> {
    json_response(status, &json!({ "detail": message }))
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(serde_json::to_vec(body).unwrap_or_default()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}
