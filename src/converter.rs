//! Family-dispatched encode/decode over one encoding descriptor
//!
//! [`EncodingConverter`] is a closed enum: one variant per
//! [`EncodingFamily`], every operation an exhaustive `match`. Converters
//! borrow their descriptor and are cheap to create; legacy tables are built
//! by the first call that needs them, not at creation time.

use std::fmt;
use std::ops::Deref;

use crate::descriptor::EncodingDescriptor;
use crate::multibyte::{DoubleByteConverter, SingleByteConverter};
use crate::unicode::{self, Endian};
use crate::{EncodingFamily, Error, MAX_CODEPOINT, Result};

/// Encoded form of one code point: 0 to 4 bytes, empty when unmappable
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ByteSequence {
    bytes: [u8; 4],
    len: u8,
}

impl ByteSequence {
    /// The empty sequence, returned for unmappable code points
    pub const fn empty() -> Self {
        Self {
            bytes: [0; 4],
            len: 0,
        }
    }

    /// Copy up to four bytes. Longer input is truncated to four bytes.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let len = bytes.len().min(4);
        let mut buf = [0u8; 4];
        buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            bytes: buf,
            len: len as u8,
        }
    }

    /// The encoded bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

impl Deref for ByteSequence {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for ByteSequence {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for ByteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X?}", self.as_slice())
    }
}

/// Outcome of decoding the sequence at the start of a byte slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoded {
    /// A code point and the number of bytes it occupied
    Mapped { codepoint: u32, len: usize },
    /// `len` bytes form a sequence with no code point
    Unmappable { len: usize },
    /// Input ended before the sequence was complete
    Incomplete,
}

/// Codec for one encoding, bound to its descriptor
#[derive(Clone, Copy)]
pub enum EncodingConverter<'a> {
    /// UTF-8
    Utf8(&'a EncodingDescriptor),
    /// UTF-16 little endian
    Utf16Le(&'a EncodingDescriptor),
    /// UTF-16 big endian
    Utf16Be(&'a EncodingDescriptor),
    /// UTF-32 little endian
    Utf32Le(&'a EncodingDescriptor),
    /// UTF-32 big endian
    Utf32Be(&'a EncodingDescriptor),
    /// Table-backed single-byte code page
    SingleByte(SingleByteConverter<'a>),
    /// Table-backed double-byte code page
    DoubleByte(DoubleByteConverter<'a>),
}

impl<'a> EncodingConverter<'a> {
    /// Create the converter matching the descriptor's family
    pub fn new(descriptor: &'a EncodingDescriptor) -> Self {
        match descriptor.family() {
            EncodingFamily::Utf8 => EncodingConverter::Utf8(descriptor),
            EncodingFamily::Utf16Le => EncodingConverter::Utf16Le(descriptor),
            EncodingFamily::Utf16Be => EncodingConverter::Utf16Be(descriptor),
            EncodingFamily::Utf32Le => EncodingConverter::Utf32Le(descriptor),
            EncodingFamily::Utf32Be => EncodingConverter::Utf32Be(descriptor),
            EncodingFamily::SingleByte => {
                EncodingConverter::SingleByte(SingleByteConverter::new(descriptor))
            }
            EncodingFamily::DoubleByte => {
                EncodingConverter::DoubleByte(DoubleByteConverter::new(descriptor))
            }
        }
    }

    /// The descriptor this converter is bound to
    pub fn descriptor(&self) -> &'a EncodingDescriptor {
        match self {
            EncodingConverter::Utf8(d)
            | EncodingConverter::Utf16Le(d)
            | EncodingConverter::Utf16Be(d)
            | EncodingConverter::Utf32Le(d)
            | EncodingConverter::Utf32Be(d) => d,
            EncodingConverter::SingleByte(c) => c.descriptor(),
            EncodingConverter::DoubleByte(c) => c.descriptor(),
        }
    }

    /// Codec family
    pub fn family(&self) -> EncodingFamily {
        self.descriptor().family()
    }

    /// Maximum number of bytes one code point can occupy
    pub fn max_bytes_per_char(&self) -> usize {
        self.family().max_bytes_per_char()
    }

    /// Encode one code point.
    ///
    /// Returns an empty sequence when the code point is out of range or has
    /// no mapping in this encoding.
    ///
    /// # Panics
    ///
    /// UTF-32 converters panic when `codepoint` is above U+10FFFF; that
    /// family has no unmappable path. Use [`Self::try_encode`] for unchecked input.
    pub fn encode(&self, codepoint: u32) -> ByteSequence {
        match self {
            EncodingConverter::Utf8(_) => unicode::encode_utf8(codepoint),
            EncodingConverter::Utf16Le(_) => unicode::encode_utf16(codepoint, Endian::Little),
            EncodingConverter::Utf16Be(_) => unicode::encode_utf16(codepoint, Endian::Big),
            EncodingConverter::Utf32Le(_) => unicode::encode_utf32(codepoint, Endian::Little),
            EncodingConverter::Utf32Be(_) => unicode::encode_utf32(codepoint, Endian::Big),
            EncodingConverter::SingleByte(c) => c.encode(codepoint),
            EncodingConverter::DoubleByte(c) => c.encode(codepoint),
        }
    }

    /// Decode the sequence at the start of `bytes`.
    ///
    /// Returns `(codepoint, consumed)`. A code point of 0 means no mapping
    /// (a decoded NUL also reads as 0). Truncated input consumes 0 bytes;
    /// malformed input consumes the rejected unit so the caller can move on.
    pub fn decode(&self, bytes: &[u8]) -> (u32, usize) {
        match self.decode_next(bytes) {
            Decoded::Mapped { codepoint, len } => (codepoint, len),
            Decoded::Unmappable { len } => (0, len),
            Decoded::Incomplete => (0, 0),
        }
    }

    /// Encode one code point, reporting why it failed.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfRange`] above U+10FFFF (above U+FFFF for single- and
    /// double-byte code pages), [`Error::UnmappableCodepoint`] when the
    /// encoding has no bytes for it.
    pub fn try_encode(&self, codepoint: u32) -> Result<ByteSequence> {
        let limit = if self.family().is_legacy() {
            0xFFFF
        } else {
            MAX_CODEPOINT
        };
        if codepoint > limit {
            return Err(Error::OutOfRange { codepoint });
        }

        let bytes = self.encode(codepoint);
        if bytes.is_empty() {
            return Err(Error::UnmappableCodepoint { codepoint });
        }
        Ok(bytes)
    }

    /// Decode the sequence at the start of `bytes`, reporting failures.
    ///
    /// # Errors
    ///
    /// [`Error::UnmappableByteSequence`] with the rejected bytes, or with no
    /// bytes when the input ends mid-sequence.
    pub fn try_decode(&self, bytes: &[u8]) -> Result<(u32, usize)> {
        match self.decode_next(bytes) {
            Decoded::Mapped { codepoint, len } => Ok((codepoint, len)),
            Decoded::Unmappable { len } => Err(Error::UnmappableByteSequence {
                bytes: bytes[..len.min(bytes.len())].to_vec(),
            }),
            Decoded::Incomplete => Err(Error::UnmappableByteSequence { bytes: Vec::new() }),
        }
    }

    /// Check if `byte` starts a multi-byte sequence.
    ///
    /// Runs lead-byte discovery for double-byte code pages.
    pub fn is_lead_byte(&self, byte: u8) -> bool {
        match self {
            EncodingConverter::DoubleByte(c) => c.is_lead_byte(byte),
            EncodingConverter::Utf8(_) => (0xC2..=0xF4).contains(&byte),
            EncodingConverter::Utf16Le(_)
            | EncodingConverter::Utf16Be(_)
            | EncodingConverter::Utf32Le(_)
            | EncodingConverter::Utf32Be(_)
            | EncodingConverter::SingleByte(_) => false,
        }
    }

    pub(crate) fn decode_next(&self, bytes: &[u8]) -> Decoded {
        match self {
            EncodingConverter::Utf8(_) => unicode::decode_utf8(bytes),
            EncodingConverter::Utf16Le(_) => unicode::decode_utf16(bytes, Endian::Little),
            EncodingConverter::Utf16Be(_) => unicode::decode_utf16(bytes, Endian::Big),
            EncodingConverter::Utf32Le(_) => unicode::decode_utf32(bytes, Endian::Little),
            EncodingConverter::Utf32Be(_) => unicode::decode_utf32(bytes, Endian::Big),
            EncodingConverter::SingleByte(c) => c.decode(bytes),
            EncodingConverter::DoubleByte(c) => c.decode(bytes),
        }
    }
}

impl fmt::Debug for EncodingConverter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodingConverter")
            .field("encoding", &self.descriptor().name())
            .field("family", &self.family())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CandidateEncoding;
    use crate::{EncodingId, EncodingRsProbe};
    use std::sync::Arc;

    fn unicode_descriptor(family: EncodingFamily) -> EncodingDescriptor {
        EncodingDescriptor::new(CandidateEncoding::unicode(
            EncodingId(1),
            family.name(),
            family.name(),
            family,
        ))
        .unwrap()
    }

    #[test]
    fn test_byte_sequence_basics() {
        assert!(ByteSequence::empty().is_empty());
        assert_eq!(ByteSequence::from_slice(&[1, 2]).len(), 2);
        assert_eq!(ByteSequence::from_slice(&[1, 2, 3, 4, 5]).as_slice(), &[1, 2, 3, 4]);
        assert_eq!(format!("{:?}", ByteSequence::from_slice(&[0xD8, 0x3D])), "[D8, 3D]");
    }

    #[test]
    fn test_dispatch_matches_family() {
        for family in EncodingFamily::ALL.into_iter().filter(|f| !f.is_legacy()) {
            let descriptor = unicode_descriptor(family);
            let converter = EncodingConverter::new(&descriptor);
            assert_eq!(converter.family(), family);
        }
    }

    #[test]
    fn test_utf32_encode_both_orders() {
        let be = unicode_descriptor(EncodingFamily::Utf32Be);
        let le = unicode_descriptor(EncodingFamily::Utf32Le);

        assert_eq!(
            EncodingConverter::new(&be).encode(0x41).as_slice(),
            &[0x00, 0x00, 0x00, 0x41]
        );
        assert_eq!(
            EncodingConverter::new(&le).encode(0x41).as_slice(),
            &[0x41, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_utf32_try_encode_reports_out_of_range() {
        let le = unicode_descriptor(EncodingFamily::Utf32Le);
        let converter = EncodingConverter::new(&le);
        assert_eq!(
            converter.try_encode(0x110000),
            Err(Error::OutOfRange { codepoint: 0x110000 })
        );
    }

    #[test]
    #[should_panic(expected = "above U+10FFFF")]
    fn test_utf32_encode_out_of_range_is_contract_violation() {
        let be = unicode_descriptor(EncodingFamily::Utf32Be);
        EncodingConverter::new(&be).encode(0x110000);
    }

    #[test]
    fn test_decode_tuple_contract() {
        let utf8 = unicode_descriptor(EncodingFamily::Utf8);
        let converter = EncodingConverter::new(&utf8);

        assert_eq!(converter.decode(&[0xE2, 0x82, 0xAC, b'x']), (0x20AC, 3));
        assert_eq!(converter.decode(&[0xE2, 0x82]), (0, 0));
        assert_eq!(converter.decode(&[0xFF, b'x']), (0, 1));
    }

    #[test]
    fn test_try_decode_errors() {
        let utf16 = unicode_descriptor(EncodingFamily::Utf16Le);
        let converter = EncodingConverter::new(&utf16);

        assert_eq!(converter.try_decode(&[0x41, 0x00]), Ok((0x41, 2)));
        assert_eq!(
            converter.try_decode(&[0x00, 0xDC, 0x41, 0x00]),
            Err(Error::UnmappableByteSequence {
                bytes: vec![0x00, 0xDC]
            })
        );
        assert_eq!(
            converter.try_decode(&[0x41]),
            Err(Error::UnmappableByteSequence { bytes: vec![] })
        );
    }

    #[test]
    fn test_legacy_try_encode_limits_to_bmp() {
        let probe = Arc::new(EncodingRsProbe::new(encoding_rs::WINDOWS_1252));
        let descriptor = EncodingDescriptor::new(CandidateEncoding::legacy(
            EncodingId(1252),
            "WINDOWS-1252",
            "Western European (Windows)",
            EncodingFamily::SingleByte,
            probe,
        ))
        .unwrap();
        let converter = EncodingConverter::new(&descriptor);

        assert_eq!(
            converter.try_encode(0x1F600),
            Err(Error::OutOfRange { codepoint: 0x1F600 })
        );
        assert_eq!(
            converter.try_encode(0x4E00),
            Err(Error::UnmappableCodepoint { codepoint: 0x4E00 })
        );
        assert_eq!(converter.try_encode(0x20AC).map(|b| b.to_vec()), Ok(vec![0x80]));
    }

    #[test]
    fn test_is_lead_byte_per_family() {
        let utf8 = unicode_descriptor(EncodingFamily::Utf8);
        let converter = EncodingConverter::new(&utf8);
        assert!(converter.is_lead_byte(0xE2));
        assert!(!converter.is_lead_byte(b'a'));
        assert!(!converter.is_lead_byte(0x80));
    }
}
