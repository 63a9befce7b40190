use crate::entity::serialize_millis;
use crate::schema::devices;
use diesel::prelude::*;
use serde::Serialize;

/// Latest known state of one physical sensor unit.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = devices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i32,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(serialize_with = "serialize_millis")]
    pub created_at: i64,
    #[serde(serialize_with = "serialize_millis")]
    pub updated_at: i64,
}

impl Device {
    pub fn model(&self) -> Option<DeviceModel> {
        match self.model_url.as_deref() {
            Some(url) if !url.is_empty() => Some(DeviceModel {
                device_id: self.device_id.clone(),
                model_url: url.to_string(),
                model_name: self.model_name.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = devices)]
pub struct NewDevice<'a> {
    pub device_id: &'a str,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub name: Option<&'a str>,
    pub model_url: Option<&'a str>,
    pub model_name: Option<&'a str>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Field-by-field overwrite; `None` leaves the stored column untouched.
#[derive(Debug, Clone, Copy, AsChangeset)]
#[diesel(table_name = devices)]
pub struct DeviceChanges<'a> {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub name: Option<&'a str>,
    pub model_url: Option<&'a str>,
    pub model_name: Option<&'a str>,
    pub updated_at: i64,
}

impl<'a> DeviceChanges<'a> {
    pub fn new(updated_at: i64) -> Self {
        Self {
            lat: None,
            lng: None,
            name: None,
            model_url: None,
            model_name: None,
            updated_at,
        }
    }

    pub fn insertable(&self, device_id: &'a str) -> NewDevice<'a> {
        NewDevice {
            device_id,
            lat: self.lat,
            lng: self.lng,
            name: self.name,
            model_url: self.model_url,
            model_name: self.model_name,
            created_at: self.updated_at,
            updated_at: self.updated_at,
        }
    }
}

/// 3D model reference attached to a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceModel {
    pub device_id: String,
    pub model_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

/// Where a device is, either from its own record or inferred from its latest geotagged reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceLocation {
    Recorded(Device),
    #[serde(rename_all = "camelCase")]
    Inferred {
        device_id: String,
        lat: f64,
        lng: f64,
        #[serde(serialize_with = "serialize_millis")]
        updated_at: i64,
    },
}

impl DeviceLocation {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match self {
            Self::Recorded(device) => device.lat.zip(device.lng),
            Self::Inferred { lat, lng, .. } => Some((*lat, *lng)),
        }
    }
}
