use std::{path::PathBuf, sync::Arc, time::Instant};

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{
    App, HttpServer,
    body::MessageBody,
    dev::{Payload, ServiceRequest, ServiceResponse},
    http::{Method, header::CONTENT_TYPE},
    middleware::{Next, from_fn},
    web,
};
use anyhow::Result;
use log::info;

use crate::api::{devices, readings, uploads};
use crate::db::Database;
use crate::error::ApiError;
use crate::repo::{DeviceRepo, ReadingRepo, new_device_repo, new_reading_repo};
use crate::storage::{PUBLIC_PREFIX, Storage, StorageImpl};

/// Everything a handler can reach; cheap to clone per worker.
#[derive(Clone)]
pub struct AppState {
    pub readings: Arc<dyn ReadingRepo>,
    pub devices: Arc<dyn DeviceRepo>,
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    pub fn new(db: Arc<Database>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            readings: Arc::new(new_reading_repo(db.clone())) as Arc<dyn ReadingRepo>,
            devices: Arc::new(new_device_repo(db)) as Arc<dyn DeviceRepo>,
            storage: Arc::new(StorageImpl::new(uploads_dir)) as Arc<dyn Storage>,
        }
    }
}

/// Logs every `/api` call on the way in (with JSON bodies) and on the way out.
pub async fn log_api_calls(
    mut req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.path().to_owned();
    let query = req.query_string().to_owned();
    if query.is_empty() {
        info!("[API] -> {} {}", method, path);
    } else {
        info!("[API] -> {} {} query={}", method, path, query);
    }

    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if method != Method::GET && is_json {
        if path.starts_with("/api/uploads") {
            info!("[API]    body={{file: <binary>}}");
        } else {
            // buffer the body for the log, then hand it back to the handler
            let body = req.extract::<web::Bytes>().await?;
            info!("[API]    body={}", String::from_utf8_lossy(&body));
            req.set_payload(Payload::from(body));
        }
    }

    let res = next.call(req).await?;
    info!(
        "[API] <- {} {} {} {}ms",
        method,
        path,
        res.status().as_u16(),
        start.elapsed().as_millis()
    );
    Ok(res)
}

/// The `/api` scope. Expects `web::Data<AppState>` to be registered on the app.
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::validation(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .wrap(from_fn(log_api_calls))
            .service(readings::latest_reading)
            .service(readings::create_reading)
            .service(readings::list_readings)
            .service(devices::get_location)
            .service(devices::set_location)
            .service(devices::get_model)
            .service(devices::set_model)
            .service(uploads::list_uploads)
            .service(uploads::upload),
    );
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
}

pub async fn run(config: ServerConfig, db: Arc<Database>) -> Result<()> {
    std::fs::create_dir_all(&config.uploads_dir)?;
    let state = AppState::new(db, config.uploads_dir.clone());
    let uploads_dir = config.uploads_dir.clone();
    let static_dir = config.static_dir.clone();

    info!("Server listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        let mut app = App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(state.clone()))
            .configure(api_routes)
            .service(Files::new(PUBLIC_PREFIX, &uploads_dir));
        if let Some(dir) = &static_dir {
            app = app.service(Files::new("/", dir).index_file("index.html"));
        }
        app
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;
    Ok(())
}
