//! In-memory `InputBackend` recording every request, for unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;

use x11rb::protocol::xproto::{Keysym, Window};

use super::backend::{
    BackendError, DeviceClass, DeviceId, DeviceInfo, DeviceKeyEvent, GenericEvent, InputBackend,
    KeyEventKind, ModifierFailure, RawEvent, VersionReply,
};

pub const ROOT: Window = 0x1a5;

/// Requests seen by the fake, in order. `Closed` is recorded on drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Grab {
        device: DeviceId,
        keycode: u8,
        event_mask: u32,
        masks: Vec<u32>,
    },
    Ungrab {
        device: DeviceId,
        keycode: u8,
        masks: Vec<u32>,
    },
    Closed,
}

pub struct FakeState {
    pub extension: Option<u8>,
    pub version: Result<VersionReply, String>,
    pub devices: Result<Vec<DeviceInfo>, String>,
    /// (device, keycode, mask) held by some other client.
    pub claimed: HashSet<(DeviceId, u8, u32)>,
    /// (device, keycode, mask) held by us.
    pub grabs: HashSet<(DeviceId, u8, u32)>,
    /// Device whose grab request fails at the transport level.
    pub fail_grab_on: Option<DeviceId>,
    /// Keycode → first keysym.
    pub keymap: BTreeMap<u8, Keysym>,
    pub events: VecDeque<RawEvent>,
    pub calls: Vec<Call>,
    pub payload_calls: usize,
    pub mapping_calls: usize,
}

pub struct FakeBackend {
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeBackend {
    pub const XI_OPCODE: u8 = 131;

    /// One master pointer (2), one master keyboard (3) and their slaves.
    pub fn new() -> Self {
        let backend = Self::with_keyboards(&[3]);
        if let Ok(devices) = &mut backend.state.borrow_mut().devices {
            devices.push(device(6, DeviceClass::SlaveKeyboard, "AT keyboard"));
            devices.push(device(7, DeviceClass::SlavePointer, "touchpad"));
        }
        backend
    }

    /// A master pointer (2) plus master keyboards with the given ids.
    pub fn with_keyboards(ids: &[DeviceId]) -> Self {
        let mut devices = vec![device(2, DeviceClass::MasterPointer, "Virtual core pointer")];
        devices.extend(
            ids.iter()
                .map(|&id| device(id, DeviceClass::MasterKeyboard, "Virtual core keyboard")),
        );

        let keymap = BTreeMap::from([(30, 0x75), (42, 0x67), (55, 0x76)]);

        Self {
            state: Rc::new(RefCell::new(FakeState {
                extension: Some(Self::XI_OPCODE),
                version: Ok(VersionReply::Negotiated { major: 2, minor: 2 }),
                devices: Ok(devices),
                claimed: HashSet::new(),
                grabs: HashSet::new(),
                fail_grab_on: None,
                keymap,
                events: VecDeque::new(),
                calls: Vec::new(),
                payload_calls: 0,
                mapping_calls: 0,
            })),
        }
    }

    /// Handle on the state that outlives the backend.
    pub fn shared(&self) -> Rc<RefCell<FakeState>> {
        Rc::clone(&self.state)
    }

    pub fn claim_by_other_client(&self, device: DeviceId, keycode: u8, mask: u32) {
        self.state
            .borrow_mut()
            .claimed
            .insert((device, keycode, mask));
    }

    /// Queue an XI2 key event from our extension on device 3.
    pub fn push_key(&self, keycode: u8, kind: KeyEventKind) {
        self.push_generic_key(Self::XI_OPCODE, keycode, kind);
    }

    pub fn push_generic_key(&self, extension: u8, keycode: u8, kind: KeyEventKind) {
        let evtype: u16 = match kind {
            KeyEventKind::Press => 2,
            KeyEventKind::Release => 3,
        };
        let mut data = vec![0u8; 80];
        data[0] = 35;
        data[1] = extension;
        data[8..10].copy_from_slice(&evtype.to_ne_bytes());
        data[10..12].copy_from_slice(&3u16.to_ne_bytes());
        data[16..20].copy_from_slice(&u32::from(keycode).to_ne_bytes());
        self.state
            .borrow_mut()
            .events
            .push_back(RawEvent::from_wire(&data));
    }

    pub fn push_generic(&self, extension: u8, evtype: u16) {
        self.state
            .borrow_mut()
            .events
            .push_back(RawEvent::Generic(GenericEvent {
                extension,
                evtype,
                data: vec![0u8; 32],
            }));
    }

    pub fn push_core(&self, response_type: u8) {
        self.state
            .borrow_mut()
            .events
            .push_back(RawEvent::Core { response_type });
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.state.borrow_mut().calls.push(Call::Closed);
    }
}

fn device(id: DeviceId, class: DeviceClass, name: &str) -> DeviceInfo {
    DeviceInfo {
        id,
        class,
        name: name.to_string(),
        enabled: true,
    }
}

impl InputBackend for FakeBackend {
    fn query_extension(&self, _name: &str) -> Result<Option<u8>, BackendError> {
        Ok(self.state.borrow().extension)
    }

    fn query_version(&self, _major: u16, _minor: u16) -> Result<VersionReply, BackendError> {
        self.state
            .borrow()
            .version
            .clone()
            .map_err(BackendError::Disconnected)
    }

    fn query_devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        self.state.borrow().devices.clone().map_err(BackendError::X11)
    }

    fn grab_keycode(
        &self,
        device: DeviceId,
        _window: Window,
        keycode: u8,
        event_mask: u32,
        modifiers: &[u32],
    ) -> Result<Vec<ModifierFailure>, BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Grab {
            device,
            keycode,
            event_mask,
            masks: modifiers.to_vec(),
        });

        if state.fail_grab_on == Some(device) {
            return Err(BackendError::Disconnected("broken pipe".into()));
        }

        let mut failures = Vec::new();
        for &mask in modifiers {
            if state.claimed.contains(&(device, keycode, mask)) {
                failures.push(ModifierFailure { mask, status: 1 });
            } else {
                state.grabs.insert((device, keycode, mask));
            }
        }
        Ok(failures)
    }

    fn ungrab_keycode(
        &self,
        device: DeviceId,
        _window: Window,
        keycode: u8,
        modifiers: &[u32],
    ) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Ungrab {
            device,
            keycode,
            masks: modifiers.to_vec(),
        });
        for &mask in modifiers {
            state.grabs.remove(&(device, keycode, mask));
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn next_event(&self) -> Result<RawEvent, BackendError> {
        self.state
            .borrow_mut()
            .events
            .pop_front()
            .ok_or_else(|| BackendError::Disconnected("event queue exhausted".into()))
    }

    fn event_payload(&self, event: &GenericEvent) -> Option<DeviceKeyEvent> {
        self.state.borrow_mut().payload_calls += 1;

        let kind = match event.evtype {
            2 => KeyEventKind::Press,
            3 => KeyEventKind::Release,
            _ => return None,
        };
        let d = event.data.get(10..20)?;
        Some(DeviceKeyEvent {
            device: u16::from_ne_bytes([d[0], d[1]]),
            detail: u32::from_ne_bytes([d[6], d[7], d[8], d[9]]),
            kind,
        })
    }

    fn keyboard_mapping(&self, keycode: u8) -> Result<Vec<Keysym>, BackendError> {
        let mut state = self.state.borrow_mut();
        state.mapping_calls += 1;
        Ok(state.keymap.get(&keycode).copied().into_iter().collect())
    }

    fn keysym_to_keycode(&self, keysym: Keysym) -> Result<Option<u8>, BackendError> {
        Ok(self
            .state
            .borrow()
            .keymap
            .iter()
            .find(|&(_, &sym)| sym == keysym)
            .map(|(&kc, _)| kc))
    }

    fn numlock_mask(&self) -> u16 {
        0x10
    }
}
