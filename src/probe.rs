//! Byte/code-point probes backing the legacy code page tables
//!
//! A [`ConversionPrimitive`] answers single questions about one legacy
//! encoding: what does this byte sequence decode to, and how is this code
//! point encoded. Tables in [`crate::descriptor`] call it only while they are
//! being filled, so it may be slow.

use std::fmt;

use encoding_rs::Encoding;

/// Probe capability for one single- or double-byte encoding.
///
/// Implementations must be deterministic: the same input always yields the
/// same answer, because every answer is cached for the lifetime of the tables.
pub trait ConversionPrimitive: Send + Sync {
    /// Decode `bytes` as exactly one character.
    ///
    /// Returns `None` when the bytes are malformed, incomplete, or decode to
    /// more than one character.
    fn probe_decode(&self, bytes: &[u8]) -> Option<u32>;

    /// Encode one code point, returning its byte sequence or `None` if the
    /// encoding has no representation for it.
    fn probe_encode(&self, codepoint: u32) -> Option<Vec<u8>>;
}

/// [`ConversionPrimitive`] backed by an `encoding_rs` encoding
#[derive(Clone, Copy)]
pub struct EncodingRsProbe {
    encoding: &'static Encoding,
}

impl EncodingRsProbe {
    /// Wrap an `encoding_rs` encoding
    pub fn new(encoding: &'static Encoding) -> Self {
        Self { encoding }
    }

    /// Look up an encoding by WHATWG label (e.g. "shift_jis", "windows-1252")
    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.as_bytes()).map(Self::new)
    }

    /// The wrapped encoding
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }
}

impl fmt::Debug for EncodingRsProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodingRsProbe")
            .field(&self.encoding.name())
            .finish()
    }
}

impl ConversionPrimitive for EncodingRsProbe {
    fn probe_decode(&self, bytes: &[u8]) -> Option<u32> {
        let decoded = self
            .encoding
            .decode_without_bom_handling_and_without_replacement(bytes)?;
        let mut chars = decoded.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Some(ch as u32),
            _ => None,
        }
    }

    fn probe_encode(&self, codepoint: u32) -> Option<Vec<u8>> {
        let ch = char::from_u32(codepoint)?;
        let mut buf = [0u8; 4];
        let (encoded, _, had_errors) = self.encoding.encode(ch.encode_utf8(&mut buf));
        if had_errors || encoded.is_empty() {
            return None;
        }
        Some(encoded.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_probe() {
        let probe = EncodingRsProbe::new(encoding_rs::WINDOWS_1252);

        assert_eq!(probe.probe_decode(&[0x41]), Some(0x41));
        assert_eq!(probe.probe_decode(&[0x80]), Some(0x20AC)); // Euro sign
        assert_eq!(probe.probe_decode(&[0x41, 0x42]), None); // two characters

        assert_eq!(probe.probe_encode(0x20AC), Some(vec![0x80]));
        assert_eq!(probe.probe_encode(0x4E00), None);
    }

    #[test]
    fn test_double_byte_probe() {
        let probe = EncodingRsProbe::for_label("shift_jis").unwrap();

        // Ideographic space
        assert_eq!(probe.probe_decode(&[0x81, 0x40]), Some(0x3000));
        assert_eq!(probe.probe_encode(0x3000), Some(vec![0x81, 0x40]));

        // Lone lead byte is incomplete
        assert_eq!(probe.probe_decode(&[0x81]), None);
        assert_eq!(probe.probe_decode(&[b'A']), Some(0x41));
    }

    #[test]
    fn test_probe_rejects_surrogates() {
        let probe = EncodingRsProbe::new(encoding_rs::GBK);
        assert_eq!(probe.probe_encode(0xD800), None);
        assert_eq!(probe.probe_encode(0x110000), None);
    }

    #[test]
    fn test_unknown_label() {
        assert!(EncodingRsProbe::for_label("no-such-label").is_none());
    }
}
