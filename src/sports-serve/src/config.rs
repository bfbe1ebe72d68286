//! Deployment configuration.
//!
//! Both front-ends run the same pipeline; they differ only in route prefix,
//! CORS policy and where the model files live. `ServiceConfig::local()` and
//! `ServiceConfig::serverless()` capture the two layouts, and
//! [`ServiceConfig::with_env_overrides`] applies `SPORTS_*` variables on top.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use http::HeaderValue;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

use crate::{AuditPolicy, PredictError};

pub const CLASS_NAMES_FILE: &str = "class_names.txt";
pub const MODEL_DIR: &str = "sports_classifier";

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Explicit origins; credentials allowed, request methods and headers
    /// are echoed back.
    AllowList(Vec<String>),
    /// Any origin, method and header; no credentials.
    Any,
}

impl CorsPolicy {
    pub fn layer(&self) -> CorsLayer {
        match self {
            CorsPolicy::AllowList(origins) => {
                // `*` cannot be listed next to credentials.
                let origins: Vec<HeaderValue> = origins
                    .iter()
                    .filter(|o| o.as_str() != "*")
                    .filter_map(|o| o.parse().ok())
                    .collect();
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_credentials(true)
                    .allow_methods(AllowMethods::mirror_request())
                    .allow_headers(AllowHeaders::mirror_request())
            }
            CorsPolicy::Any => CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoSettings {
    pub connection_string: Option<String>,
    pub database: String,
    pub collection: String,
}

impl Default for MongoSettings {
    fn default() -> Self {
        MongoSettings {
            connection_string: None,
            database: "sports_api_db".to_owned(),
            collection: "predictions".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Prefix for every route except the `/` liveness check, e.g. `/api`.
    pub route_prefix: String,
    pub cors_policy: CorsPolicy,
    /// Directory holding `class_names.txt` and the `sports_classifier` model.
    pub resource_base_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub audit_policy: AuditPolicy,
    pub max_upload_bytes: usize,
    pub mongo: MongoSettings,
}

impl ServiceConfig {
    /// Development server next to a local frontend.
    pub fn local() -> Self {
        ServiceConfig {
            route_prefix: String::new(),
            cors_policy: CorsPolicy::AllowList(vec![
                "http://localhost".to_owned(),
                "http://localhost:3000".to_owned(),
            ]),
            resource_base_path: PathBuf::from("."),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            audit_policy: AuditPolicy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            mongo: MongoSettings::default(),
        }
    }

    /// Function deployment: routes under `/api`, any origin, resources next
    /// to the deployed package.
    pub fn serverless() -> Self {
        ServiceConfig {
            route_prefix: "/api".to_owned(),
            cors_policy: CorsPolicy::Any,
            resource_base_path: package_root(),
            ..Self::local()
        }
    }

    pub fn with_env_overrides(self) -> Result<Self, PredictError> {
        self.apply_env(|key| env::var(key).ok())
    }

    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, PredictError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup("SPORTS_RESOURCE_DIR") {
            self.resource_base_path = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("SPORTS_BIND_ADDR") {
            self.bind_addr = addr.trim().parse().map_err(|_| {
                PredictError::Configuration(format!("invalid SPORTS_BIND_ADDR {:?}", addr))
            })?;
        }
        if let Some(mode) = lookup("SPORTS_AUDIT_MODE") {
            self.audit_policy = mode.parse()?;
        }
        if let Some(limit) = lookup("SPORTS_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = limit.trim().parse().map_err(|_| {
                PredictError::Configuration(format!("invalid SPORTS_MAX_UPLOAD_BYTES {:?}", limit))
            })?;
        }
        if let Some(origins) = lookup("SPORTS_CORS_ORIGINS") {
            if let CorsPolicy::AllowList(_) = self.cors_policy {
                self.cors_policy = CorsPolicy::AllowList(parse_origins(&origins)?);
            }
        }
        if let Some(uri) = lookup("MONGO_CONNECTION_STRING") {
            self.mongo.connection_string = Some(uri);
        }
        if let Some(db) = lookup("SPORTS_MONGO_DATABASE") {
            self.mongo.database = db;
        }
        if let Some(collection) = lookup("SPORTS_MONGO_COLLECTION") {
            self.mongo.collection = collection;
        }

        Ok(self)
    }

    pub fn class_names_path(&self) -> PathBuf {
        self.resource_base_path.join(CLASS_NAMES_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.resource_base_path.join(MODEL_DIR)
    }

    /// Path of the liveness alias and predict endpoint under the prefix.
    pub fn prefixed(&self, path: &str) -> String {
        format!("{}{}", self.route_prefix.trim_end_matches('/'), path)
    }
}

/// Comma-separated origin list. Every entry must be a usable header value
/// and a concrete origin; the credentialed allow-list has no wildcard.
fn parse_origins(raw: &str) -> Result<Vec<String>, PredictError> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|origin| {
            if origin == "*" {
                return Err(PredictError::Configuration(
                    "SPORTS_CORS_ORIGINS cannot contain `*` alongside credentials".to_owned(),
                ));
            }
            HeaderValue::from_str(origin).map_err(|_| {
                PredictError::Configuration(format!("invalid CORS origin {:?}", origin))
            })?;
            Ok(origin.to_owned())
        })
        .collect()
}

/// `LAMBDA_TASK_ROOT` when running as a function, else the executable's
/// directory.
fn package_root() -> PathBuf {
    if let Ok(root) = env::var("LAMBDA_TASK_ROOT") {
        return PathBuf::from(root);
    }

    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
