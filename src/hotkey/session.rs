//! Hotkey session — owns the backend and every grab made through it.
//!
//! Startup runs negotiation, enumeration and one registration per
//! hotkey. Any failure releases the grabs already made, newest first,
//! before the backend (and with it the connection) is dropped. The same
//! ordering applies on normal shutdown.

use x11rb::protocol::xproto::Window;

use super::HotkeyError;
use super::backend::{DeviceClass, InputBackend};
use super::devices::{self, DeviceSet};
use super::dispatch::{self, DispatchStats, HotkeyRole, WatchedKey};
use super::grab::{self, GrabRecord};
use super::keybinding::{LogicalKey, ModifierSet, shift_control};
use super::negotiate::{self, ProtocolHandle};

/// A hotkey to register: `Ctrl+Shift+<symbol>`.
#[derive(Debug, Clone, Copy)]
pub struct Hotkey {
    pub symbol: &'static str,
    pub role: HotkeyRole,
    pub label: &'static str,
}

pub struct Session<B: InputBackend> {
    backend: B,
    root: Window,
    protocol: ProtocolHandle,
    devices: DeviceSet,
    modifiers: ModifierSet,
    watched: Vec<WatchedKey>,
    /// Active grabs in registration order.
    grabs: Vec<GrabRecord>,
}

impl<B: InputBackend> Session<B> {
    /// Negotiate XI2, enumerate master keyboards and grab every hotkey.
    pub fn start(backend: B, root: Window, hotkeys: &[Hotkey]) -> Result<Self, HotkeyError> {
        let protocol = negotiate::negotiate(&backend)?;

        let devices = devices::enumerate(&backend, DeviceClass::MasterKeyboard)?;
        if devices.is_empty() {
            tracing::warn!("no master keyboards attached, hotkeys will never fire");
        }

        let modifiers = ModifierSet::with_lock_variants(shift_control(), backend.numlock_mask())?;

        let mut session = Self {
            backend,
            root,
            protocol,
            devices,
            modifiers,
            watched: Vec::with_capacity(hotkeys.len()),
            grabs: Vec::with_capacity(hotkeys.len()),
        };

        for hotkey in hotkeys {
            if let Err(e) = session.register_hotkey(hotkey) {
                session.release_all();
                return Err(e);
            }
        }

        Ok(session)
    }

    /// Resolve one hotkey and grab it on every keyboard.
    fn register_hotkey(&mut self, hotkey: &Hotkey) -> Result<(), HotkeyError> {
        let key = LogicalKey::resolve(&self.backend, hotkey.symbol)?;

        tracing::info!(
            keycode = key.keycode,
            keysym = format_args!("0x{:04x}", key.keysym),
            symbol = %key.symbol,
            devices = self.devices.len(),
            "grabbing {}",
            hotkey.label
        );
        eprintln!(
            "Grabbing keycode {} (usually {}) with CTRL + SHIFT modifiers",
            key.keycode, key.symbol
        );

        if let Some(record) = grab::grab(
            &self.backend,
            &key,
            self.root,
            &self.devices,
            &self.modifiers,
        )? {
            self.grabs.push(record);
        }

        self.watched.push(WatchedKey {
            key,
            role: hotkey.role,
            label: hotkey.label.to_string(),
        });

        Ok(())
    }

    /// Block in the dispatcher until the exit hotkey is released.
    pub fn run(&self, on_release: impl FnMut(&WatchedKey)) -> Result<DispatchStats, HotkeyError> {
        self.backend.flush()?;
        Ok(dispatch::run_loop(
            &self.backend,
            self.protocol,
            &self.watched,
            on_release,
        )?)
    }

    /// Release every grab, then close the connection.
    pub fn shutdown(mut self) {
        self.release_all();
        tracing::debug!("session closed");
    }

    /// Release grabs newest first.
    fn release_all(&mut self) {
        while let Some(record) = self.grabs.pop() {
            tracing::debug!(keycode = record.key.keycode, "releasing grab");
            record.release(&self.backend);
        }
    }

    #[cfg(test)]
    pub fn grabs(&self) -> &[GrabRecord] {
        &self.grabs
    }
}
