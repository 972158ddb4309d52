//! Device enumeration — master devices filtered by hierarchy role.
//!
//! Grabs are placed on master keyboards, not physical ones: a master
//! aggregates every attached slave, so one grab covers all keyboards.

use super::backend::{DeviceClass, DeviceId, DeviceInfo, InputBackend};

#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    #[error("cannot get master device list: {0}")]
    QueryFailed(String),

    #[error("cannot allocate device list")]
    AllocationFailed,
}

/// Ordered device ids a grab is applied to. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet(Vec<DeviceId>);

impl DeviceSet {
    pub fn new(ids: Vec<DeviceId>) -> Self {
        Self(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.0.iter().copied()
    }
}

/// Every master device the server reports.
pub fn list_devices(backend: &impl InputBackend) -> Result<Vec<DeviceInfo>, EnumerationError> {
    backend
        .query_devices()
        .map_err(|e| EnumerationError::QueryFailed(e.to_string()))
}

/// Ids of the devices whose role is `class`, in server order.
pub fn enumerate(
    backend: &impl InputBackend,
    class: DeviceClass,
) -> Result<DeviceSet, EnumerationError> {
    let infos = list_devices(backend)?;

    let mut ids: Vec<DeviceId> = Vec::new();
    ids.try_reserve(infos.len())
        .map_err(|_| EnumerationError::AllocationFailed)?;
    ids.extend(infos.iter().filter(|d| d.class == class).map(|d| d.id));

    tracing::debug!(%class, count = ids.len(), total = infos.len(), "devices enumerated");

    Ok(DeviceSet::new(ids))
}
