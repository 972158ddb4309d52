//! Key binding helpers — symbol → keysym → keycode, and modifier sets.
//!
//! Hotkeys are fixed at build time; this module turns their symbols
//! into [`LogicalKey`]s against the server's current keyboard mapping
//! and builds the [`ModifierSet`] every grab is made with.

use x11rb::protocol::xproto::{Keysym, ModMask};

use super::HotkeyError;
use super::backend::{BackendError, InputBackend};
use super::grab::GrabError;

/// A key position resolved from a symbol at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalKey {
    /// Keycode the symbol is mapped to.
    pub keycode: u8,
    /// Keysym the symbol names.
    pub keysym: Keysym,
    /// Symbol as written in the hotkey table (e.g. `"u"`).
    pub symbol: String,
}

impl LogicalKey {
    /// Resolve `symbol` to a keycode using the backend's keyboard mapping.
    pub fn resolve(backend: &impl InputBackend, symbol: &str) -> Result<Self, HotkeyError> {
        let keysym = key_name_to_keysym(symbol)
            .ok_or_else(|| HotkeyError::UnknownKey(format!("unknown key name: {symbol:?}")))?;

        let keycode = backend.keysym_to_keycode(keysym)?.ok_or_else(|| {
            HotkeyError::UnknownKey(format!(
                "keysym 0x{keysym:04x} ({symbol}) not found in keyboard mapping"
            ))
        })?;

        Ok(Self {
            keycode,
            keysym,
            symbol: symbol.to_string(),
        })
    }
}

/// One acceptable combination of modifier bits (XI2 modifier mask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModifierVariant(pub u32);

impl std::fmt::Display for ModifierVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Ordered, non-empty, duplicate-free list of modifier variants.
///
/// All variants are grabbed together so lock keys never stop a
/// shortcut from firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierSet(Vec<ModifierVariant>);

impl ModifierSet {
    /// Build a set from explicit variants.
    pub fn new(variants: Vec<ModifierVariant>) -> Result<Self, GrabError> {
        if variants.is_empty() {
            return Err(GrabError::InvalidInput("empty modifier set".into()));
        }
        for (i, v) in variants.iter().enumerate() {
            if variants[..i].contains(v) {
                return Err(GrabError::InvalidInput(format!(
                    "duplicate modifier variant {v}"
                )));
            }
        }
        Ok(Self(variants))
    }

    /// `base` combined with every subset of {CapsLock, NumLock}:
    /// `base`, `base|Lock`, `base|NumLock`, `base|NumLock|Lock`.
    ///
    /// Variants that collapse onto an earlier one (NumLock bound to the
    /// Lock bit, or to nothing) are dropped.
    pub fn with_lock_variants(base: u16, numlock_mask: u16) -> Result<Self, GrabError> {
        let lock = u16::from(ModMask::LOCK);
        let mut variants: Vec<ModifierVariant> = Vec::with_capacity(4);

        for extra in [0, lock, numlock_mask, numlock_mask | lock] {
            let v = ModifierVariant(u32::from(base | extra));
            if !variants.contains(&v) {
                variants.push(v);
            }
        }

        Self::new(variants)
    }

    /// Raw masks in order, as sent on the wire.
    pub fn masks(&self) -> Vec<u32> {
        self.iter().map(|v| v.0).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModifierVariant> {
        self.0.iter()
    }
}

/// Shift + Control, the base of every hotkey.
pub fn shift_control() -> u16 {
    u16::from(ModMask::SHIFT) | u16::from(ModMask::CONTROL)
}

/// Map a key name to an X11 keysym.
///
/// Supports single ASCII letters (A-Z), digits (0-9), function keys
/// (F1-F12), and common named keys.
pub fn key_name_to_keysym(name: &str) -> Option<Keysym> {
    // Single ASCII letter → lowercase keysym.
    if name.len() == 1 {
        let ch = name.chars().next()?;
        if ch.is_ascii_alphabetic() {
            return Some(ch.to_ascii_lowercase() as Keysym);
        }
        if ch.is_ascii_digit() {
            return Some(ch as Keysym);
        }
    }

    if let Some(rest) = name.strip_prefix('F').or_else(|| name.strip_prefix('f'))
        && let Ok(n) = rest.parse::<u32>()
        && (1..=12).contains(&n)
    {
        // XK_F1 = 0xffbe, XK_F2 = 0xffbf, ...
        return Some(0xffbe + n - 1);
    }

    match name.to_ascii_lowercase().as_str() {
        "space" => Some(0x0020),
        "return" | "enter" => Some(0xff0d),
        "escape" | "esc" => Some(0xff1b),
        "tab" => Some(0xff09),
        "backspace" => Some(0xff08),
        "delete" => Some(0xffff),
        "insert" => Some(0xff63),
        "home" => Some(0xff50),
        "end" => Some(0xff57),
        "up" => Some(0xff52),
        "down" => Some(0xff54),
        "left" => Some(0xff51),
        "right" => Some(0xff53),
        _ => None,
    }
}

/// Find the first keycode producing `keysym` in a flattened keyboard
/// mapping (`syms_per_code` keysyms per keycode, starting at
/// `min_keycode`).
pub fn keycode_in_mapping(
    min_keycode: u8,
    syms_per_code: usize,
    keysyms: &[Keysym],
    keysym: Keysym,
) -> Option<u8> {
    if syms_per_code == 0 {
        return None;
    }

    keysyms
        .chunks(syms_per_code)
        .position(|syms| syms.contains(&keysym))
        .and_then(|i| u8::try_from(i).ok())
        .and_then(|i| min_keycode.checked_add(i))
}

/// Resolve a device keycode back to a logical keycode through the
/// current mapping: its first keysym, then that keysym's keycode.
///
/// Returns `None` when the keycode has no symbol.
pub fn resolve_keycode(
    backend: &impl InputBackend,
    detail: u32,
) -> Result<Option<u8>, BackendError> {
    let Ok(keycode) = u8::try_from(detail) else {
        return Ok(None);
    };

    let keysyms = backend.keyboard_mapping(keycode)?;
    match keysyms.first() {
        Some(&keysym) if keysym != 0 => backend.keysym_to_keycode(keysym),
        _ => Ok(None),
    }
}
