//! Input backend — the window-system capabilities the hotkey core runs on.
//!
//! The negotiator, enumerator, grab manager and dispatcher only talk to
//! the X server through [`InputBackend`]. `X11Backend` implements it over
//! an `x11rb` connection; the unit tests use a recording fake.

use x11rb::protocol::xproto::{self, Keysym, Window};

/// XI2 device identifier.
pub type DeviceId = u16;

/// Errors reported by a backend transport.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Request could not be sent or its reply carried an X11 error.
    #[error("X11: {0}")]
    X11(String),

    /// The connection to the server is gone.
    #[error("connection closed: {0}")]
    Disconnected(String),
}

/// Outcome of an XI version query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionReply {
    /// The server answered `XIQueryVersion` with its negotiated version.
    Negotiated { major: u16, minor: u16 },
    /// The server rejected `XIQueryVersion` (`BadRequest`) and reports
    /// this version through the legacy query instead.
    Rejected { major: u16, minor: u16 },
}

/// Role of an input device in the XI2 device hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    MasterPointer,
    MasterKeyboard,
    SlavePointer,
    SlaveKeyboard,
    FloatingSlave,
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MasterPointer => "master pointer",
            Self::MasterKeyboard => "master keyboard",
            Self::SlavePointer => "slave pointer",
            Self::SlaveKeyboard => "slave keyboard",
            Self::FloatingSlave => "floating slave",
        };
        f.write_str(name)
    }
}

/// One device as reported by `XIQueryDevice`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub class: DeviceClass,
    pub name: String,
    pub enabled: bool,
}

/// A modifier variant the server refused to grant, with its grab status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierFailure {
    pub mask: u32,
    pub status: u8,
}

/// Press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Press,
    Release,
}

/// Payload of an XI2 device key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceKeyEvent {
    pub device: DeviceId,
    /// Raw keycode of the originating device.
    pub detail: u32,
    pub kind: KeyEventKind,
}

/// GenericEvent envelope. `data` is the full wire event; its payload is
/// only decoded by [`InputBackend::event_payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericEvent {
    pub extension: u8,
    pub evtype: u16,
    pub data: Vec<u8>,
}

/// An event as received from the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Generic(GenericEvent),
    /// Any core event, error or reply-less notification.
    Core { response_type: u8 },
}

impl RawEvent {
    /// Classify a wire event by its header.
    ///
    /// GenericEvent layout: byte 0 type (35), byte 1 extension opcode,
    /// bytes 8..10 extension event type. The send-event bit is masked off.
    pub fn from_wire(bytes: &[u8]) -> Self {
        let response_type = bytes.first().copied().unwrap_or(0) & 0x7f;

        if response_type == xproto::GE_GENERIC_EVENT && bytes.len() >= 10 {
            return Self::Generic(GenericEvent {
                extension: bytes[1],
                evtype: u16::from_ne_bytes([bytes[8], bytes[9]]),
                data: bytes.to_vec(),
            });
        }

        Self::Core { response_type }
    }
}

/// Window-system operations needed to negotiate XI2, enumerate devices,
/// grab keys and receive key events.
///
/// All calls are synchronous round-trips except [`next_event`], which
/// blocks until the server delivers something.
///
/// [`next_event`]: InputBackend::next_event
pub trait InputBackend {
    /// Major opcode of the named extension, or `None` if the server
    /// does not register it.
    fn query_extension(&self, name: &str) -> Result<Option<u8>, BackendError>;

    /// Announce the XI version the client supports.
    fn query_version(&self, major: u16, minor: u16) -> Result<VersionReply, BackendError>;

    /// All master devices with their hierarchy role.
    fn query_devices(&self) -> Result<Vec<DeviceInfo>, BackendError>;

    /// Passive keycode grab on one device for every mask in `modifiers`.
    ///
    /// Returns the variants the server could not grant; an empty list
    /// means every variant is now grabbed.
    fn grab_keycode(
        &self,
        device: DeviceId,
        window: Window,
        keycode: u8,
        event_mask: u32,
        modifiers: &[u32],
    ) -> Result<Vec<ModifierFailure>, BackendError>;

    /// Remove a passive keycode grab for every mask in `modifiers`.
    fn ungrab_keycode(
        &self,
        device: DeviceId,
        window: Window,
        keycode: u8,
        modifiers: &[u32],
    ) -> Result<(), BackendError>;

    /// Push buffered requests to the server.
    fn flush(&self) -> Result<(), BackendError>;

    /// Block until the next event arrives.
    fn next_event(&self) -> Result<RawEvent, BackendError>;

    /// Decode the key payload of a GenericEvent, or `None` when the
    /// event carries no device key data.
    fn event_payload(&self, event: &GenericEvent) -> Option<DeviceKeyEvent>;

    /// Keysyms currently mapped to `keycode`, in group/level order.
    fn keyboard_mapping(&self, keycode: u8) -> Result<Vec<Keysym>, BackendError>;

    /// First keycode whose current mapping produces `keysym`.
    fn keysym_to_keycode(&self, keysym: Keysym) -> Result<Option<u8>, BackendError>;

    /// Modifier bit NumLock is bound to.
    fn numlock_mask(&self) -> u16;
}
