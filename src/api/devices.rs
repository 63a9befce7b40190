use actix_web::{HttpResponse, get, post, web};
use log::info;
use serde_json::Value;

use crate::api::{number, run_blocking, string};
use crate::error::ApiError;
use crate::server::AppState;

#[get("/device/{device_id}/location")]
pub async fn get_location(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let device_id = path.into_inner();
    let repo = data.devices.clone();
    let lookup = device_id.clone();
    let loc = run_blocking("Failed to get device location", move || {
        repo.get_location(&lookup)
    })
    .await?
    .ok_or(ApiError::NotFound("Location not found"))?;
    info!("[API] location deviceId={} at={:?}", device_id, loc.coordinates());
    Ok(HttpResponse::Ok().json(loc))
}

#[post("/device/{device_id}/location")]
pub async fn set_location(
    path: web::Path<String>,
    body: web::Json<Value>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let device_id = path.into_inner();
    let (Some(lat), Some(lng)) = (number(&body, "lat"), number(&body, "lng")) else {
        return Err(ApiError::validation("lat and lng (numbers) are required"));
    };
    let name = string(&body, "name");
    let repo = data.devices.clone();
    let saved = run_blocking("Failed to set device location", move || {
        repo.set_location(&device_id, lat, lng, name.as_deref())
    })
    .await?;
    info!(
        "[API] device {} located at ({}, {})",
        saved.device_id, lat, lng
    );
    Ok(HttpResponse::Ok().json(saved))
}

#[get("/device/{device_id}/model")]
pub async fn get_model(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let device_id = path.into_inner();
    let repo = data.devices.clone();
    let model = run_blocking("Failed to get device model", move || {
        repo.get_model(&device_id)
    })
    .await?
    .ok_or(ApiError::NotFound("Model not set"))?;
    Ok(HttpResponse::Ok().json(model))
}

#[post("/device/{device_id}/model")]
pub async fn set_model(
    path: web::Path<String>,
    body: web::Json<Value>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let device_id = path.into_inner();
    let Some(model_url) = string(&body, "modelUrl").filter(|u| !u.is_empty()) else {
        return Err(ApiError::validation("modelUrl (string) is required"));
    };
    let model_name = string(&body, "modelName");
    let repo = data.devices.clone();
    let saved = run_blocking("Failed to set device model", move || {
        repo.set_model(&device_id, &model_url, model_name.as_deref())
    })
    .await?;
    info!("[API] device {} model set to {}", saved.device_id, saved.model_url);
    Ok(HttpResponse::Ok().json(saved))
}
