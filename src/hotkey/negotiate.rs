//! XI2 negotiation — confirm the X Input Extension is present at 2.0+.

use x11rb::protocol::xinput;

use super::backend::{InputBackend, VersionReply};

/// Minimum XI version the grab and event code relies on.
pub const XI_MAJOR: u16 = 2;
pub const XI_MINOR: u16 = 0;

/// Major opcode of the X Input Extension on this connection.
///
/// Every GenericEvent carries the opcode of the extension that sent
/// it; only events carrying this one are inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolHandle(pub u8);

#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("X Input extension not available")]
    ExtensionUnavailable,

    #[error("XI2 not available, server supports {major}.{minor}")]
    VersionUnsupported { major: u16, minor: u16 },

    #[error("XI2 negotiation failed: {0}")]
    ProtocolInternalError(String),
}

/// Check that XI2 is registered and at least version 2.0.
pub fn negotiate(backend: &impl InputBackend) -> Result<ProtocolHandle, ExtensionError> {
    let opcode = backend
        .query_extension(xinput::X11_EXTENSION_NAME)
        .map_err(|e| ExtensionError::ProtocolInternalError(e.to_string()))?
        .ok_or(ExtensionError::ExtensionUnavailable)?;

    let reply = backend
        .query_version(XI_MAJOR, XI_MINOR)
        .map_err(|e| ExtensionError::ProtocolInternalError(e.to_string()))?;

    match reply {
        VersionReply::Rejected { major, minor } => {
            Err(ExtensionError::VersionUnsupported { major, minor })
        }
        VersionReply::Negotiated { major, minor } if (major, minor) < (XI_MAJOR, XI_MINOR) => {
            Err(ExtensionError::VersionUnsupported { major, minor })
        }
        VersionReply::Negotiated { major, minor } => {
            tracing::debug!(opcode, major, minor, "XI2 negotiated");
            Ok(ProtocolHandle(opcode))
        }
    }
}
