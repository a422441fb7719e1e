//! Nullable status provider: a status tests can flip.

use parking_lot::RwLock;
use weft_types::{PlatformStatus, StatusProvider};

pub struct StaticStatus {
    status: RwLock<PlatformStatus>,
}

impl StaticStatus {
    pub fn new(status: PlatformStatus) -> Self {
        Self {
            status: RwLock::new(status),
        }
    }

    pub fn set(&self, status: PlatformStatus) {
        *self.status.write() = status;
    }
}

impl Default for StaticStatus {
    fn default() -> Self {
        Self::new(PlatformStatus::Active)
    }
}

impl StatusProvider for StaticStatus {
    fn platform_status(&self) -> PlatformStatus {
        *self.status.read()
    }
}
