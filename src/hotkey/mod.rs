//! Hotkey listener — XI2 passive key grabs on every master keyboard.
//!
//! Grabs Ctrl+Shift+U and Ctrl+Shift+G (with every CapsLock/NumLock
//! combination) on the root window, prints each hotkey as it is
//! released, and exits once Ctrl+Shift+G is released.

mod backend;
mod devices;
mod dispatch;
mod grab;
mod keybinding;
mod negotiate;
mod session;
#[cfg(test)]
mod testing;
mod x11;

use backend::BackendError;
use dispatch::HotkeyRole;
use session::{Hotkey, Session};
use x11::X11Backend;

/// Hotkey listener errors.
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("X11: {0}")]
    X11(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Extension(#[from] negotiate::ExtensionError),
    #[error(transparent)]
    Enumeration(#[from] devices::EnumerationError),
    #[error(transparent)]
    Grab(#[from] grab::GrabError),
    #[error(transparent)]
    Dispatch(#[from] dispatch::DispatchError),
    #[error("invalid key: {0}")]
    UnknownKey(String),
}

/// The fixed hotkey table, in registration order.
pub const HOTKEYS: [Hotkey; 2] = [
    Hotkey {
        symbol: "u",
        role: HotkeyRole::Action,
        label: "CTRL + SHIFT + U",
    },
    Hotkey {
        symbol: "g",
        role: HotkeyRole::Exit,
        label: "CTRL + SHIFT + G",
    },
];

/// Run the listener until the exit hotkey is released.
///
/// Grabs are released before the connection closes on every path,
/// including a failed startup.
pub fn run(display: Option<&str>) -> Result<(), HotkeyError> {
    let (backend, root) = X11Backend::connect(display)?;
    tracing::info!(root, "connected to X11 display");

    let session = Session::start(backend, root, &HOTKEYS)?;

    println!("Waiting for input. Press CTRL + SHIFT + G to quit.");

    let result = session.run(|hotkey| println!("{}", hotkey.label));
    session.shutdown();

    let stats = result?;
    tracing::info!(
        events = stats.events,
        key_events = stats.key_events,
        releases = stats.releases,
        "hotkey listener stopped"
    );

    Ok(())
}

/// Print every master device the server reports.
pub fn list_devices(display: Option<&str>) -> Result<(), HotkeyError> {
    let (backend, _root) = X11Backend::connect(display)?;
    negotiate::negotiate(&backend)?;

    for device in devices::list_devices(&backend)? {
        println!(
            "{:>3}  {:<16} {}{}",
            device.id,
            device.class.to_string(),
            device.name,
            if device.enabled { "" } else { " (disabled)" }
        );
    }

    Ok(())
}
