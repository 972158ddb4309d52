//! Grab manager — passive XI2 keycode grabs across devices and
//! modifier variants, with symmetric release.
//!
//! A grab either holds every variant on every device or holds nothing:
//! when a device refuses any variant, the whole tuple is released again
//! before the error is returned.

use x11rb::protocol::xinput::XIEventMask;
use x11rb::protocol::xproto::Window;

use super::backend::{DeviceId, InputBackend, ModifierFailure};
use super::devices::DeviceSet;
use super::keybinding::{LogicalKey, ModifierSet};

/// Upper bound on devices accepted by one grab.
pub const MAX_DEVICES: usize = 256;
/// Upper bound on modifier variants accepted by one grab.
pub const MAX_MODIFIER_VARIANTS: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum GrabError {
    #[error("keycode {keycode} on device {device}: {} modifier variant(s) already grabbed", .failures.len())]
    ModifierConflict {
        keycode: u8,
        device: DeviceId,
        failures: Vec<ModifierFailure>,
    },

    #[error("invalid grab input: {0}")]
    InvalidInput(String),

    #[error("grab request failed: {0}")]
    Connection(String),
}

/// An established grab, held until [`GrabRecord::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrabRecord {
    pub key: LogicalKey,
    pub window: Window,
    pub devices: DeviceSet,
    pub modifiers: ModifierSet,
}

impl GrabRecord {
    /// Undo the grab with the exact tuple it was made with.
    pub fn release(self, backend: &impl InputBackend) {
        release(
            backend,
            &self.key,
            self.window,
            &self.devices,
            &self.modifiers,
        );
    }
}

/// Grab `key` with every variant in `modifiers` on every device.
///
/// Returns `Ok(None)` for an empty device set: nothing is requested
/// and nothing is held.
pub fn grab(
    backend: &impl InputBackend,
    key: &LogicalKey,
    window: Window,
    devices: &DeviceSet,
    modifiers: &ModifierSet,
) -> Result<Option<GrabRecord>, GrabError> {
    if devices.len() > MAX_DEVICES {
        return Err(GrabError::InvalidInput(format!(
            "{} devices exceeds limit of {MAX_DEVICES}",
            devices.len()
        )));
    }
    if modifiers.len() > MAX_MODIFIER_VARIANTS {
        return Err(GrabError::InvalidInput(format!(
            "{} modifier variants exceeds limit of {MAX_MODIFIER_VARIANTS}",
            modifiers.len()
        )));
    }

    if devices.is_empty() {
        tracing::debug!(keycode = key.keycode, "no devices, nothing to grab");
        return Ok(None);
    }

    // Press must be selected alongside release for the grab to activate.
    let event_mask = u32::from(XIEventMask::KEY_PRESS | XIEventMask::KEY_RELEASE);
    let masks = modifiers.masks();

    for device in devices.iter() {
        let failures =
            match backend.grab_keycode(device, window, key.keycode, event_mask, &masks) {
                Ok(failures) => failures,
                Err(e) => {
                    release(backend, key, window, devices, modifiers);
                    return Err(GrabError::Connection(e.to_string()));
                }
            };

        if !failures.is_empty() {
            for failure in &failures {
                tracing::warn!(
                    keycode = key.keycode,
                    device,
                    modifiers = format_args!("0x{:x}", failure.mask),
                    status = failure.status,
                    "modifier grab refused, shortcut may be owned by another client"
                );
                eprintln!(
                    "modifier 0x{:x} failed with status {} ({})",
                    failure.mask,
                    failure.status,
                    grab_status_name(failure.status)
                );
            }

            release(backend, key, window, devices, modifiers);
            return Err(GrabError::ModifierConflict {
                keycode: key.keycode,
                device,
                failures,
            });
        }

        tracing::debug!(keycode = key.keycode, device, "device grabbed");
    }

    Ok(Some(GrabRecord {
        key: key.clone(),
        window,
        devices: devices.clone(),
        modifiers: modifiers.clone(),
    }))
}

/// Ungrab `key` with every variant on every device. Best-effort:
/// failures are logged and skipped.
pub fn release(
    backend: &impl InputBackend,
    key: &LogicalKey,
    window: Window,
    devices: &DeviceSet,
    modifiers: &ModifierSet,
) {
    let masks = modifiers.masks();

    for device in devices.iter() {
        if let Err(e) = backend.ungrab_keycode(device, window, key.keycode, &masks) {
            tracing::debug!(
                keycode = key.keycode,
                device,
                error = %e,
                "XIUngrabKeycode failed"
            );
        }
    }

    if let Err(e) = backend.flush() {
        tracing::debug!(error = %e, "flush after ungrab failed");
    }
}

/// Human-readable name of a core grab status code.
pub fn grab_status_name(status: u8) -> &'static str {
    match status {
        0 => "Success",
        1 => "AlreadyGrabbed",
        2 => "InvalidTime",
        3 => "NotViewable",
        4 => "Frozen",
        _ => "unknown",
    }
}
