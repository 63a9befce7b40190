use crate::entity::serialize_millis;
use crate::schema::readings;
use diesel::prelude::*;
use serde::Serialize;

pub const DEFAULT_SOURCE: &str = "arduino";
pub const DEFAULT_DEVICE_ID: &str = "default-device";

/// One immutable sensor telemetry record.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = readings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: i32,
    pub value: f64,
    pub source: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(serialize_with = "serialize_millis")]
    pub created_at: i64,
    #[serde(serialize_with = "serialize_millis")]
    pub updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = readings)]
pub struct NewReading<'a> {
    pub value: f64,
    pub source: &'a str,
    pub device_id: &'a str,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub tilt: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input of `save_moisture`; the optional readings are already type-checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoistureSample {
    pub value: f64,
    pub source: Option<String>,
    pub device_id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub tilt: Option<f64>,
}

impl MoistureSample {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or(DEFAULT_SOURCE)
    }

    pub fn device_id(&self) -> &str {
        match self.device_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => DEFAULT_DEVICE_ID,
        }
    }

    /// Both coordinates, only when the sample is geotagged.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }
}
