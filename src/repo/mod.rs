pub mod device_repo;
pub mod reading_repo;

pub use device_repo::{DeviceRepo, new_device_repo};
pub use reading_repo::{ReadingRepo, new_reading_repo};
