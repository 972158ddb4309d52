//! X11 backend — `InputBackend` over an `x11rb` connection.
//!
//! Wraps `x11rb::rust_connection::RustConnection` for XI2 negotiation,
//! device queries, passive keycode grabs and the blocking event wait.

use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::ErrorKind;
use x11rb::protocol::xinput::{self, Device, DeviceType, GrabMode22, GrabOwner, GrabType};
use x11rb::protocol::xproto::{self, GrabMode, Keysym, Window};
use x11rb::rust_connection::RustConnection;
use x11rb::x11_utils::TryParse;

use super::HotkeyError;
use super::backend::{
    BackendError, DeviceClass, DeviceId, DeviceInfo, DeviceKeyEvent, GenericEvent, InputBackend,
    KeyEventKind, ModifierFailure, RawEvent, VersionReply,
};
use super::keybinding::keycode_in_mapping;

/// XK_Num_Lock keysym for dynamic modifier detection.
const XK_NUM_LOCK: Keysym = 0xff7f;

/// X11 connection plus the NumLock bit detected at connect time.
pub struct X11Backend {
    conn: RustConnection,
    numlock_mask: u16,
}

impl X11Backend {
    /// Connect to `display` (or `$DISPLAY`) and return the backend with
    /// the root window of its default screen.
    pub fn connect(display: Option<&str>) -> Result<(Self, Window), HotkeyError> {
        let (conn, screen_num) = RustConnection::connect(display)
            .map_err(|e| HotkeyError::X11(format!("cannot open display: {e}")))?;

        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| HotkeyError::X11(format!("no screen {screen_num}")))?;

        let numlock_mask = detect_numlock_mask(&conn);
        tracing::debug!(
            screen = screen_num,
            numlock_mask = format_args!("0x{numlock_mask:04x}"),
            "detected NumLock modifier"
        );

        Ok((Self { conn, numlock_mask }, root))
    }

    /// Full keyboard mapping: (min keycode, keysyms per keycode, keysyms).
    fn full_mapping(&self) -> Result<(u8, usize, Vec<Keysym>), BackendError> {
        let setup = self.conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode - min_keycode + 1;

        let reply = xproto::get_keyboard_mapping(&self.conn, min_keycode, count)
            .map_err(send_error)?
            .reply()
            .map_err(reply_error)?;

        Ok((
            min_keycode,
            usize::from(reply.keysyms_per_keycode),
            reply.keysyms,
        ))
    }
}

impl InputBackend for X11Backend {
    fn query_extension(&self, name: &str) -> Result<Option<u8>, BackendError> {
        let reply = xproto::query_extension(&self.conn, name.as_bytes())
            .map_err(send_error)?
            .reply()
            .map_err(reply_error)?;

        Ok(reply.present.then_some(reply.major_opcode))
    }

    fn query_version(&self, major: u16, minor: u16) -> Result<VersionReply, BackendError> {
        let cookie = xinput::xi_query_version(&self.conn, major, minor).map_err(send_error)?;

        match cookie.reply() {
            Ok(reply) => Ok(VersionReply::Negotiated {
                major: reply.major_version,
                minor: reply.minor_version,
            }),
            // XI 1.x servers do not know XIQueryVersion.
            Err(ReplyError::X11Error(e)) if e.error_kind == ErrorKind::Request => {
                let legacy = xinput::get_extension_version(
                    &self.conn,
                    xinput::X11_EXTENSION_NAME.as_bytes(),
                )
                .map_err(send_error)?
                .reply()
                .map_err(reply_error)?;

                Ok(VersionReply::Rejected {
                    major: legacy.server_major,
                    minor: legacy.server_minor,
                })
            }
            Err(e) => Err(reply_error(e)),
        }
    }

    fn query_devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        let reply = xinput::xi_query_device(&self.conn, u16::from(Device::ALL_MASTER))
            .map_err(send_error)?
            .reply()
            .map_err(reply_error)?;

        Ok(reply
            .infos
            .into_iter()
            .filter_map(|info| {
                let class = device_class(info.type_)?;
                Some(DeviceInfo {
                    id: info.deviceid,
                    class,
                    name: String::from_utf8_lossy(&info.name).into_owned(),
                    enabled: info.enabled,
                })
            })
            .collect())
    }

    fn grab_keycode(
        &self,
        device: DeviceId,
        window: Window,
        keycode: u8,
        event_mask: u32,
        modifiers: &[u32],
    ) -> Result<Vec<ModifierFailure>, BackendError> {
        let reply = xinput::xi_passive_grab_device(
            &self.conn,
            x11rb::CURRENT_TIME,
            window,
            x11rb::NONE,
            u32::from(keycode),
            device,
            GrabType::KEYCODE,
            GrabMode22::ASYNC,
            GrabMode::ASYNC,
            GrabOwner::NO_OWNER,
            &[event_mask],
            modifiers,
        )
        .map_err(send_error)?
        .reply()
        .map_err(reply_error)?;

        Ok(reply
            .modifiers
            .iter()
            .map(|m| ModifierFailure {
                mask: m.modifiers,
                status: u8::from(m.status),
            })
            .collect())
    }

    fn ungrab_keycode(
        &self,
        device: DeviceId,
        window: Window,
        keycode: u8,
        modifiers: &[u32],
    ) -> Result<(), BackendError> {
        xinput::xi_passive_ungrab_device(
            &self.conn,
            window,
            u32::from(keycode),
            device,
            GrabType::KEYCODE,
            modifiers,
        )
        .map_err(send_error)?
        .ignore_error();

        Ok(())
    }

    fn flush(&self) -> Result<(), BackendError> {
        self.conn.flush().map_err(send_error)
    }

    fn next_event(&self) -> Result<RawEvent, BackendError> {
        let raw = self
            .conn
            .wait_for_raw_event()
            .map_err(|e| BackendError::Disconnected(e.to_string()))?;

        Ok(RawEvent::from_wire(raw.as_ref()))
    }

    fn event_payload(&self, event: &GenericEvent) -> Option<DeviceKeyEvent> {
        let kind = match event.evtype {
            xinput::KEY_PRESS_EVENT => KeyEventKind::Press,
            xinput::KEY_RELEASE_EVENT => KeyEventKind::Release,
            _ => return None,
        };

        match xinput::KeyPressEvent::try_parse(&event.data) {
            Ok((parsed, _)) => Some(DeviceKeyEvent {
                device: parsed.deviceid,
                detail: parsed.detail,
                kind,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "malformed XI2 key event");
                None
            }
        }
    }

    fn keyboard_mapping(&self, keycode: u8) -> Result<Vec<Keysym>, BackendError> {
        let reply = xproto::get_keyboard_mapping(&self.conn, keycode, 1)
            .map_err(send_error)?
            .reply()
            .map_err(reply_error)?;

        Ok(reply.keysyms)
    }

    fn keysym_to_keycode(&self, keysym: Keysym) -> Result<Option<u8>, BackendError> {
        let (min_keycode, syms_per_code, keysyms) = self.full_mapping()?;
        Ok(keycode_in_mapping(
            min_keycode,
            syms_per_code,
            &keysyms,
            keysym,
        ))
    }

    fn numlock_mask(&self) -> u16 {
        self.numlock_mask
    }
}

fn device_class(use_: DeviceType) -> Option<DeviceClass> {
    Some(match use_ {
        DeviceType::MASTER_POINTER => DeviceClass::MasterPointer,
        DeviceType::MASTER_KEYBOARD => DeviceClass::MasterKeyboard,
        DeviceType::SLAVE_POINTER => DeviceClass::SlavePointer,
        DeviceType::SLAVE_KEYBOARD => DeviceClass::SlaveKeyboard,
        DeviceType::FLOATING_SLAVE => DeviceClass::FloatingSlave,
        _ => return None,
    })
}

fn send_error(e: x11rb::errors::ConnectionError) -> BackendError {
    BackendError::Disconnected(e.to_string())
}

fn reply_error(e: ReplyError) -> BackendError {
    match e {
        ReplyError::ConnectionError(e) => BackendError::Disconnected(e.to_string()),
        ReplyError::X11Error(e) => BackendError::X11(format!("{e:?}")),
    }
}

/// Detect which modifier bit corresponds to NumLock by querying the
/// X11 modifier mapping and keyboard mapping.
///
/// Falls back to Mod2 (0x0010) if detection fails.
fn detect_numlock_mask(conn: &RustConnection) -> u16 {
    const FALLBACK: u16 = 0x0010; // Mod2Mask

    let Ok(Ok(mod_reply)) = xproto::get_modifier_mapping(conn).map(|c| c.reply()) else {
        return FALLBACK;
    };

    let keycodes_per_mod = usize::from(mod_reply.keycodes_per_modifier());
    if keycodes_per_mod == 0 {
        return FALLBACK;
    }

    let setup = conn.setup();
    let min_kc = setup.min_keycode;
    let count = setup.max_keycode - min_kc + 1;

    let Ok(Ok(kb_reply)) = xproto::get_keyboard_mapping(conn, min_kc, count).map(|c| c.reply())
    else {
        return FALLBACK;
    };

    let syms_per_code = usize::from(kb_reply.keysyms_per_keycode);
    if syms_per_code == 0 {
        return FALLBACK;
    }

    let numlock_keycodes: Vec<u8> = kb_reply
        .keysyms
        .chunks(syms_per_code)
        .enumerate()
        .filter(|(_, syms)| syms.contains(&XK_NUM_LOCK))
        .filter_map(|(i, _)| u8::try_from(i).ok().and_then(|i| min_kc.checked_add(i)))
        .collect();

    // 8 rows × keycodes_per_modifier; row i is modifier bit 1 << i.
    mod_reply
        .keycodes
        .chunks(keycodes_per_mod)
        .take(8)
        .position(|row| row.iter().any(|&kc| kc != 0 && numlock_keycodes.contains(&kc)))
        .map_or(FALLBACK, |row| 1u16 << row)
}
