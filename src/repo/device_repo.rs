use std::sync::Arc;

use anyhow::Result;
use diesel::prelude::*;

use crate::{
    db::Database,
    entity::{
        device::{Device, DeviceChanges, DeviceLocation, DeviceModel},
        now_millis,
    },
    error::ValidationError,
    schema::{devices, readings},
};

/// Upsert a device row keyed by `device_id`, returning the stored state.
///
/// Runs as one immediate transaction so concurrent writers to the same key serialize;
/// the last write wins field by field.
pub fn upsert_device(
    conn: &mut SqliteConnection,
    device_id: &str,
    changes: DeviceChanges<'_>,
) -> QueryResult<Device> {
    conn.immediate_transaction(|c| {
        let updated = diesel::update(devices::table.filter(devices::device_id.eq(device_id)))
            .set(&changes)
            .execute(c)?;
        if updated == 0 {
            diesel::insert_into(devices::table)
                .values(&changes.insertable(device_id))
                .execute(c)?;
        }
        devices::table
            .filter(devices::device_id.eq(device_id))
            .select(Device::as_select())
            .first(c)
    })
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

struct DeviceRepoImpl {
    db: Arc<Database>,
}

impl DeviceRepoImpl {
    fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, device_id: &str) -> Result<Option<Device>> {
        let mut conn = self.db.conn()?;
        Ok(devices::table
            .filter(devices::device_id.eq(device_id))
            .select(Device::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn set_location(
        &self,
        device_id: &str,
        lat: f64,
        lng: f64,
        name: Option<&str>,
    ) -> Result<Device> {
        let mut conn = self.db.conn()?;
        let changes = DeviceChanges {
            lat: Some(lat),
            lng: Some(lng),
            name: non_empty(name),
            ..DeviceChanges::new(now_millis())
        };
        Ok(upsert_device(&mut conn, device_id, changes)?)
    }

    pub fn get_location(&self, device_id: &str) -> Result<Option<DeviceLocation>> {
        if let Some(device) = self.get(device_id)? {
            return Ok(Some(DeviceLocation::Recorded(device)));
        }
        let mut conn = self.db.conn()?;
        let latest = readings::table
            .filter(readings::device_id.eq(device_id))
            .filter(readings::lat.is_not_null())
            .filter(readings::lng.is_not_null())
            .order((readings::created_at.desc(), readings::id.desc()))
            .select((readings::lat, readings::lng, readings::created_at))
            .first::<(Option<f64>, Option<f64>, i64)>(&mut conn)
            .optional()?;
        Ok(latest.and_then(|(lat, lng, created_at)| {
            Some(DeviceLocation::Inferred {
                device_id: device_id.to_string(),
                lat: lat?,
                lng: lng?,
                updated_at: created_at,
            })
        }))
    }

    pub fn set_model(
        &self,
        device_id: &str,
        model_url: &str,
        model_name: Option<&str>,
    ) -> Result<DeviceModel> {
        if model_url.is_empty() {
            return Err(ValidationError::new("modelUrl is required").into());
        }
        let mut conn = self.db.conn()?;
        let changes = DeviceChanges {
            model_url: Some(model_url),
            model_name: non_empty(model_name),
            ..DeviceChanges::new(now_millis())
        };
        let device = upsert_device(&mut conn, device_id, changes)?;
        Ok(DeviceModel {
            device_id: device.device_id,
            model_url: device.model_url.unwrap_or_else(|| model_url.to_string()),
            model_name: device.model_name,
        })
    }

    pub fn get_model(&self, device_id: &str) -> Result<Option<DeviceModel>> {
        Ok(self.get(device_id)?.and_then(|d| d.model()))
    }
}

/// Current-state records for devices, one per `device_id`.
pub trait DeviceRepo: Send + Sync + 'static {
    fn get(&self, device_id: &str) -> Result<Option<Device>>;

    /// Always overwrites the coordinates; `name` only when non-empty.
    fn set_location(
        &self,
        device_id: &str,
        lat: f64,
        lng: f64,
        name: Option<&str>,
    ) -> Result<Device>;

    /// The device record whenever one exists, else its latest geotagged reading.
    fn get_location(&self, device_id: &str) -> Result<Option<DeviceLocation>>;

    /// Fails with [`ValidationError`] on an empty `model_url`.
    fn set_model(
        &self,
        device_id: &str,
        model_url: &str,
        model_name: Option<&str>,
    ) -> Result<DeviceModel>;

    fn get_model(&self, device_id: &str) -> Result<Option<DeviceModel>>;
}

impl DeviceRepo for DeviceRepoImpl {
    fn get(&self, device_id: &str) -> Result<Option<Device>> {
        Self::get(self, device_id)
    }

    fn set_location(
        &self,
        device_id: &str,
        lat: f64,
        lng: f64,
        name: Option<&str>,
    ) -> Result<Device> {
        Self::set_location(self, device_id, lat, lng, name)
    }

    fn get_location(&self, device_id: &str) -> Result<Option<DeviceLocation>> {
        Self::get_location(self, device_id)
    }

    fn set_model(
        &self,
        device_id: &str,
        model_url: &str,
        model_name: Option<&str>,
    ) -> Result<DeviceModel> {
        Self::set_model(self, device_id, model_url, model_name)
    }

    fn get_model(&self, device_id: &str) -> Result<Option<DeviceModel>> {
        Self::get_model(self, device_id)
    }
}

pub fn new_device_repo(db: Arc<Database>) -> impl DeviceRepo {
    DeviceRepoImpl::new(db)
}
