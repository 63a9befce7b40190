use actix_web::{HttpResponse, routes, web};
use log::info;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::{number, run_blocking, string};
use crate::entity::reading::MoistureSample;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsQuery {
    pub limit: Option<String>,
    pub device_id: Option<String>,
}

impl ReadingsQuery {
    /// Empty `deviceId` means no filter.
    fn device_id(&self) -> Option<String> {
        self.device_id.clone().filter(|d| !d.is_empty())
    }
}

/// Lenient `limit` parsing: non-numeric is absent, fractions are truncated.
/// Huge values saturate at `i64::MAX`, which the clamp then caps.
pub fn parse_limit(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
}

fn sample_from_body(body: &Value) -> Result<MoistureSample, ApiError> {
    let value =
        number(body, "value").ok_or_else(|| ApiError::validation("value (number) is required"))?;
    Ok(MoistureSample {
        value,
        source: string(body, "source"),
        device_id: string(body, "deviceId"),
        lat: number(body, "lat"),
        lng: number(body, "lng"),
        humidity: number(body, "humidity"),
        temperature: number(body, "temperature"),
        tilt: number(body, "tilt"),
    })
}

#[routes]
#[post("/readings")]
#[post("/moisture")]
pub async fn create_reading(
    body: web::Json<Value>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let sample = sample_from_body(&body)?;
    let repo = data.readings.clone();
    let saved = run_blocking("Failed to save moisture reading", move || {
        repo.save_moisture(&sample)
    })
    .await?;
    info!(
        "[API] saved reading id={} deviceId={} value={} humidity={:?} temperature={:?} tilt={:?}",
        saved.id, saved.device_id, saved.value, saved.humidity, saved.temperature, saved.tilt
    );
    Ok(HttpResponse::Created().json(saved))
}

#[routes]
#[get("/readings/latest")]
#[get("/moisture/latest")]
pub async fn latest_reading(
    query: web::Query<ReadingsQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let device_id = query.device_id();
    let repo = data.readings.clone();
    let filter = device_id.clone();
    let latest = run_blocking("Failed to get latest reading", move || {
        repo.latest(filter.as_deref())
    })
    .await?;
    info!(
        "[API] latest deviceId={:?} value={:?}",
        device_id,
        latest.as_ref().map(|r| r.value)
    );
    Ok(match latest {
        Some(reading) => HttpResponse::Ok().json(reading),
        None => HttpResponse::Ok().json(json!({})),
    })
}

#[routes]
#[get("/readings")]
#[get("/moisture")]
pub async fn list_readings(
    query: web::Query<ReadingsQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let device_id = query.device_id();
    let limit = parse_limit(query.limit.as_deref());
    let repo = data.readings.clone();
    let filter = device_id.clone();
    let docs = run_blocking("Failed to get readings", move || {
        repo.list(limit, filter.as_deref())
    })
    .await?;
    info!(
        "[API] history deviceId={:?} limit={:?} count={}",
        device_id,
        query.limit,
        docs.len()
    );
    Ok(HttpResponse::Ok().json(docs))
}
