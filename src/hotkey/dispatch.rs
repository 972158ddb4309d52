//! Event dispatcher — blocking receive loop that narrows the event
//! stream to "this hotkey was released".
//!
//! An event is only decoded once it is known to be an XI2 GenericEvent
//! from our extension; its keycode is then mapped through the current
//! keyboard mapping so layout changes at runtime are honoured.

use super::backend::{BackendError, DeviceKeyEvent, InputBackend, KeyEventKind, RawEvent};
use super::keybinding::{LogicalKey, resolve_keycode};
use super::negotiate::ProtocolHandle;

/// What a hotkey does when released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyRole {
    /// Report the hotkey and keep listening.
    Action,
    /// Report the hotkey and stop the loop.
    Exit,
}

/// A grabbed key the loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedKey {
    pub key: LogicalKey,
    pub role: HotkeyRole,
    /// Operator-facing name, e.g. `CTRL + SHIFT + U`.
    pub label: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("event loop: {0}")]
    Connection(#[from] BackendError),
}

/// Counters collected over one run of the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events received from the connection.
    pub events: u64,
    /// XI2 key events from our extension.
    pub key_events: u64,
    /// Hotkey releases reported to the caller.
    pub releases: u64,
}

/// Run until a watched key with [`HotkeyRole::Exit`] is released.
///
/// `on_release` is called for every watched key released, the exit key
/// included. Returns an error only when the connection fails.
pub fn run_loop<B: InputBackend>(
    backend: &B,
    protocol: ProtocolHandle,
    watched: &[WatchedKey],
    mut on_release: impl FnMut(&WatchedKey),
) -> Result<DispatchStats, DispatchError> {
    let mut stats = DispatchStats::default();
    let mut stop = false;

    while !stop {
        let event = backend.next_event()?;
        stats.events += 1;

        let Some(payload) = key_event(backend, protocol, &event) else {
            continue;
        };
        stats.key_events += 1;

        let keycode = match resolve_keycode(backend, payload.detail) {
            Ok(Some(keycode)) => keycode,
            Ok(None) => continue,
            Err(BackendError::X11(e)) => {
                tracing::debug!(detail = payload.detail, error = %e, "keycode resolution failed");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if payload.kind != KeyEventKind::Release {
            continue;
        }

        for hotkey in watched.iter().filter(|w| w.key.keycode == keycode) {
            tracing::debug!(
                keycode,
                device = payload.device,
                label = %hotkey.label,
                "hotkey released"
            );
            stats.releases += 1;
            on_release(hotkey);
            if hotkey.role == HotkeyRole::Exit {
                stop = true;
            }
        }
    }

    Ok(stats)
}

/// Decode the key payload of `event` if, and only if, it is a
/// GenericEvent sent by the negotiated extension.
fn key_event<B: InputBackend>(
    backend: &B,
    protocol: ProtocolHandle,
    event: &RawEvent,
) -> Option<DeviceKeyEvent> {
    match event {
        RawEvent::Generic(generic) if generic.extension == protocol.0 => {
            backend.event_payload(generic)
        }
        _ => None,
    }
}
