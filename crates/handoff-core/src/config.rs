//! Centralized configuration for the handoff library.
//!
//! Protocol atom names, wire limits, and save-engine constants. These are
//! protocol-level values; changing them breaks interoperability with peers.

/// Property-RPC wire constants.
pub struct ProtocolConfig;

impl ProtocolConfig {
    /// Property carrying the XML-RPC request, replaced in place by the reply.
    pub const MESSAGE_PROPERTY: &'static str = "_XXMLRPC_MESSAGE";
    /// Append-mode accumulator of pending call-window XIDs on the service window.
    pub const ID_PROPERTY: &'static str = "_XXMLRPC_ID";
}

/// Frame codec limits.
pub struct FrameConfig;

impl FrameConfig {
    /// Upper bound on a single frame payload. A length field above this is
    /// treated as a malformed stream, not a large message.
    pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
    /// Maximum digits in the decimal length prefix. More digits than this
    /// without a `:` means the stream is not framed data at all.
    pub const MAX_LENGTH_DIGITS: usize = 10;
    /// Read chunk size for the async frame reader.
    pub const READ_CHUNK_SIZE: usize = 8192;
}

/// XDND Direct Save constants.
pub struct XdsConfig;

impl XdsConfig {
    /// The negotiation property on the drag-source window, and the first
    /// drag target offered.
    pub const PROPERTY: &'static str = "XdndDirectSave0";
    /// Declared type of the negotiation property.
    pub const PROPERTY_TYPE: &'static str = "text/plain";
    /// Generic raw fallback target, offered last.
    pub const OCTET_STREAM: &'static str = "application/octet-stream";
    /// Prefix for the sibling temporary file used by atomic saves.
    pub const TMP_PREFIX: &'static str = "tmp-";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_names_match_protocol() {
        assert_eq!(ProtocolConfig::MESSAGE_PROPERTY, "_XXMLRPC_MESSAGE");
        assert_eq!(ProtocolConfig::ID_PROPERTY, "_XXMLRPC_ID");
        assert_eq!(XdsConfig::PROPERTY, "XdndDirectSave0");
    }

    #[test]
    fn test_frame_limits_are_consistent() {
        // The size cap must be expressible within the digit cap.
        assert!(FrameConfig::MAX_FRAME_SIZE.to_string().len() <= FrameConfig::MAX_LENGTH_DIGITS);
    }
}
