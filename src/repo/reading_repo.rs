use std::sync::Arc;

use anyhow::{Context, Result};
use diesel::prelude::*;
use log::error;

use crate::{
    db::Database,
    entity::{
        device::DeviceChanges,
        now_millis,
        reading::{MoistureSample, NewReading, Reading},
    },
    repo::device_repo::upsert_device,
    schema::readings,
};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 500;

/// Effective page size: 50 when absent, otherwise clamped to `1..=500`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

struct ReadingRepoImpl {
    db: Arc<Database>,
}

impl ReadingRepoImpl {
    fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn save_moisture(&self, sample: &MoistureSample) -> Result<Reading> {
        let mut conn = self.db.conn()?;
        let now = now_millis();
        let device_id = sample.device_id();
        let row = NewReading {
            value: sample.value,
            source: sample.source(),
            device_id,
            humidity: sample.humidity,
            temperature: sample.temperature,
            tilt: sample.tilt,
            lat: sample.lat,
            lng: sample.lng,
            created_at: now,
            updated_at: now,
        };
        let saved = conn
            .immediate_transaction(|c| {
                diesel::insert_into(readings::table).values(&row).execute(c)?;
                readings::table
                    .order(readings::id.desc())
                    .select(Reading::as_select())
                    .first(c)
            })
            .context("insert reading")?;

        // Separate write: a failure here leaves the reading in place.
        if let Some((lat, lng)) = sample.position() {
            let changes = DeviceChanges {
                lat: Some(lat),
                lng: Some(lng),
                ..DeviceChanges::new(now)
            };
            if let Err(e) = upsert_device(&mut conn, device_id, changes) {
                error!("device location update for {device_id} failed: {e}");
            }
        }
        Ok(saved)
    }

    pub fn latest(&self, device_id: Option<&str>) -> Result<Option<Reading>> {
        let mut conn = self.db.conn()?;
        let mut query = readings::table.into_boxed();
        if let Some(id) = device_id {
            query = query.filter(readings::device_id.eq(id));
        }
        Ok(query
            .order((readings::created_at.desc(), readings::id.desc()))
            .select(Reading::as_select())
            .first(&mut conn)
            .optional()?)
    }

    pub fn list(&self, limit: Option<i64>, device_id: Option<&str>) -> Result<Vec<Reading>> {
        let mut conn = self.db.conn()?;
        let mut query = readings::table.into_boxed();
        if let Some(id) = device_id {
            query = query.filter(readings::device_id.eq(id));
        }
        Ok(query
            .order((readings::created_at.desc(), readings::id.desc()))
            .limit(clamp_limit(limit))
            .select(Reading::as_select())
            .load(&mut conn)?)
    }
}

/// Append-only access to sensor readings.
pub trait ReadingRepo: Send + Sync + 'static {
    /// Persist a reading; a geotagged one also moves its device.
    fn save_moisture(&self, sample: &MoistureSample) -> Result<Reading>;

    /// Most recent reading, optionally restricted to one device.
    fn latest(&self, device_id: Option<&str>) -> Result<Option<Reading>>;

    /// Newest first, at most `clamp_limit(limit)` rows.
    fn list(&self, limit: Option<i64>, device_id: Option<&str>) -> Result<Vec<Reading>>;
}

impl ReadingRepo for ReadingRepoImpl {
    fn save_moisture(&self, sample: &MoistureSample) -> Result<Reading> {
        Self::save_moisture(self, sample)
    }

    fn latest(&self, device_id: Option<&str>) -> Result<Option<Reading>> {
        Self::latest(self, device_id)
    }

    fn list(&self, limit: Option<i64>, device_id: Option<&str>) -> Result<Vec<Reading>> {
        Self::list(self, limit, device_id)
    }
}

pub fn new_reading_repo(db: Arc<Database>) -> impl ReadingRepo {
    ReadingRepoImpl::new(db)
}
