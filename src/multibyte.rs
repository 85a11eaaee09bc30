//! Table-backed single-byte and double-byte code page converters
//!
//! Both converters read the descriptor's shared [`ConversionTables`]; the
//! first call builds them. Single-byte tables are probed in full at that
//! point. Double-byte tables fill one lead-byte row at a time as input
//! reaches it.
//!
//! [`ConversionTables`]: crate::descriptor::ConversionTables

use crate::converter::{ByteSequence, Decoded};
use crate::descriptor::{EncodingDescriptor, TableEntry};

/// Converter for one-byte-per-character code pages
#[derive(Debug, Clone, Copy)]
pub struct SingleByteConverter<'a> {
    descriptor: &'a EncodingDescriptor,
}

impl<'a> SingleByteConverter<'a> {
    pub(crate) fn new(descriptor: &'a EncodingDescriptor) -> Self {
        Self { descriptor }
    }

    /// The descriptor this converter is bound to
    pub fn descriptor(&self) -> &'a EncodingDescriptor {
        self.descriptor
    }

    pub(crate) fn encode(&self, codepoint: u32) -> ByteSequence {
        let Some((tables, primitive)) = self.descriptor.legacy_tables() else {
            return ByteSequence::empty();
        };
        tables
            .encode_or_probe(codepoint, primitive)
            .unwrap_or_default()
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> Decoded {
        let Some(&byte) = bytes.first() else {
            return Decoded::Incomplete;
        };
        let Some((tables, _)) = self.descriptor.legacy_tables() else {
            return Decoded::Unmappable { len: 1 };
        };
        match tables.decoded(usize::from(byte)) {
            TableEntry::Mapped(codepoint) => Decoded::Mapped { codepoint, len: 1 },
            TableEntry::Invalid | TableEntry::Unprobed => Decoded::Unmappable { len: 1 },
        }
    }
}

/// Converter for code pages mixing one- and two-byte characters
#[derive(Debug, Clone, Copy)]
pub struct DoubleByteConverter<'a> {
    descriptor: &'a EncodingDescriptor,
}

impl<'a> DoubleByteConverter<'a> {
    pub(crate) fn new(descriptor: &'a EncodingDescriptor) -> Self {
        Self { descriptor }
    }

    /// The descriptor this converter is bound to
    pub fn descriptor(&self) -> &'a EncodingDescriptor {
        self.descriptor
    }

    pub(crate) fn is_lead_byte(&self, byte: u8) -> bool {
        self.descriptor
            .legacy_tables()
            .is_some_and(|(tables, primitive)| tables.discover_lead_byte(byte, primitive))
    }

    pub(crate) fn encode(&self, codepoint: u32) -> ByteSequence {
        let Some((tables, primitive)) = self.descriptor.legacy_tables() else {
            return ByteSequence::empty();
        };
        tables
            .encode_or_probe(codepoint, primitive)
            .unwrap_or_default()
    }

    /// Lead bytes consume two bytes keyed `(lead << 8) | trail`; any other
    /// byte consumes one, keyed `byte << 8`.
    ///
    /// An unmapped pair whose trail is ASCII reports a width of 1 so the
    /// trail byte is decoded on its own.
    pub(crate) fn decode(&self, bytes: &[u8]) -> Decoded {
        let Some(&lead) = bytes.first() else {
            return Decoded::Incomplete;
        };
        let Some((tables, primitive)) = self.descriptor.legacy_tables() else {
            return Decoded::Unmappable { len: 1 };
        };

        if !tables.discover_lead_byte(lead, primitive) {
            return match tables.decoded(usize::from(lead) << 8) {
                TableEntry::Mapped(codepoint) => Decoded::Mapped { codepoint, len: 1 },
                TableEntry::Invalid | TableEntry::Unprobed => Decoded::Unmappable { len: 1 },
            };
        }

        let Some(&trail) = bytes.get(1) else {
            return Decoded::Incomplete;
        };
        match tables.decoded((usize::from(lead) << 8) | usize::from(trail)) {
            TableEntry::Mapped(codepoint) => Decoded::Mapped { codepoint, len: 2 },
            TableEntry::Invalid | TableEntry::Unprobed if trail.is_ascii() => {
                Decoded::Unmappable { len: 1 }
            }
            TableEntry::Invalid | TableEntry::Unprobed => Decoded::Unmappable { len: 2 },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use crate::catalog::CandidateEncoding;
    use crate::converter::EncodingConverter;
    use crate::descriptor::tests::CountingProbe;
    use crate::descriptor::{EncodingDescriptor, LeadByteState};
    use crate::{ConversionPrimitive, EncodingFamily, EncodingId, EncodingRsProbe};

    fn descriptor(
        family: EncodingFamily,
        primitive: Arc<dyn ConversionPrimitive>,
    ) -> EncodingDescriptor {
        EncodingDescriptor::new(CandidateEncoding::legacy(
            EncodingId(9999),
            "TEST",
            "Test code page",
            family,
            primitive,
        ))
        .unwrap()
    }

    #[test]
    fn test_single_byte_round_trip_with_identity_fallback() {
        let windows_1252 = descriptor(
            EncodingFamily::SingleByte,
            Arc::new(EncodingRsProbe::new(encoding_rs::WINDOWS_1252)),
        );
        let converter = EncodingConverter::new(&windows_1252);

        for byte in 0..=u8::MAX {
            let (codepoint, consumed) = converter.decode(&[byte]);
            assert_eq!(consumed, 1);
            let encoded = converter.encode(codepoint);
            let (again, _) = converter.decode(&encoded);
            assert_eq!(again, codepoint, "byte 0x{:02X}", byte);
        }

        assert_eq!(converter.decode(&[0x80]), (0x20AC, 1));
        assert_eq!(converter.encode(0x20AC).as_slice(), &[0x80]);
    }

    #[test]
    fn test_single_byte_fallback_when_probe_fails() {
        // Only 0x01..=0x7F decode; everything else falls back to identity
        let ascii_only = descriptor(EncodingFamily::SingleByte, Arc::new(CountingProbe::dbcs()));
        let converter = EncodingConverter::new(&ascii_only);

        assert_eq!(converter.decode(&[0xE9]), (0xE9, 1));
        assert_eq!(converter.encode(0xE9).as_slice(), &[0xE9]);
        assert_eq!(converter.decode(&[b'A', b'B']), (0x41, 1));
    }

    #[test]
    fn test_single_byte_encode_reprobes_once() {
        let probe = Arc::new(CountingProbe::dbcs());
        let shared: Arc<dyn ConversionPrimitive> = probe.clone();
        let desc = descriptor(EncodingFamily::SingleByte, shared);
        let converter = EncodingConverter::new(&desc);

        // U+3000 is a two-byte sequence in the probe, too long for this family
        assert!(converter.encode(0x3000).is_empty());
        assert!(converter.encode(0x3000).is_empty());
        assert_eq!(probe.encode_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tables_build_lazily() {
        let desc = descriptor(EncodingFamily::DoubleByte, Arc::new(CountingProbe::dbcs()));
        let converter = EncodingConverter::new(&desc);
        assert!(desc.tables().is_none());

        converter.decode(b"A");
        assert!(desc.tables().is_some());
    }

    #[test]
    fn test_lead_byte_discovery_runs_once() {
        let probe = Arc::new(CountingProbe::dbcs());
        let shared: Arc<dyn ConversionPrimitive> = probe.clone();
        let desc = descriptor(EncodingFamily::DoubleByte, shared);

        let first = EncodingConverter::new(&desc);
        assert_eq!(first.decode(&[0x81, 0x40]), (0x3000, 2));
        assert_eq!(probe.decode_calls(), 256);

        // A second converter for the same descriptor sees the cached row
        let second = EncodingConverter::new(&desc);
        assert_eq!(second.decode(&[0x81, 0x42]), (0x3002, 2));
        assert_eq!(probe.decode_calls(), 256);
    }

    #[test]
    fn test_double_byte_decode_mixed() {
        let desc = descriptor(EncodingFamily::DoubleByte, Arc::new(CountingProbe::dbcs()));
        let converter = EncodingConverter::new(&desc);

        assert_eq!(converter.decode(b"AB"), (0x41, 1));
        assert_eq!(converter.decode(&[0x81, 0x41, b'A']), (0x3001, 2));
        // Lead byte without its trail byte
        assert_eq!(converter.decode(&[0x81]), (0, 0));
        // Valid lead byte, unmapped trail byte
        assert_eq!(converter.decode(&[0x81, 0xFF]), (0, 2));
        // An unmapped ASCII trail is left for the next call
        assert_eq!(converter.decode(&[0x81, 0x20]), (0, 1));
        assert_eq!(converter.decode(&[0x20]), (0x20, 1));
        // Byte that is neither a character nor a lead byte
        assert_eq!(converter.decode(&[0xFE, 0x40]), (0, 1));
        assert_eq!(
            desc.tables().map(|t| t.lead_byte_state(0xFE)),
            Some(LeadByteState::NotLead)
        );
    }

    #[test]
    fn test_double_byte_encode() {
        let desc = descriptor(EncodingFamily::DoubleByte, Arc::new(CountingProbe::dbcs()));
        let converter = EncodingConverter::new(&desc);

        assert_eq!(converter.encode(0x3001).as_slice(), &[0x81, 0x41]);
        assert_eq!(converter.encode(u32::from(b'z')).as_slice(), b"z");
        assert_eq!(converter.encode(0x0000).as_slice(), &[0x00]);
        assert!(converter.encode(0x4E00).is_empty());
        assert!(converter.encode(0x1F600).is_empty());
    }

    #[test]
    fn test_shift_jis_via_encoding_rs() {
        let sjis = descriptor(
            EncodingFamily::DoubleByte,
            Arc::new(EncodingRsProbe::new(encoding_rs::SHIFT_JIS)),
        );
        let converter = EncodingConverter::new(&sjis);

        // "日本" = 93 FA 96 7B
        assert_eq!(converter.decode(&[0x93, 0xFA, 0x96, 0x7B]), (0x65E5, 2));
        assert_eq!(converter.decode(&[0x96, 0x7B]), (0x672C, 2));
        assert_eq!(converter.encode(0x65E5).as_slice(), &[0x93, 0xFA]);
        // Half-width katakana is a single byte
        assert_eq!(converter.decode(&[0xB1]), (0xFF71, 1));
        assert!(converter.is_lead_byte(0x81));
        assert!(!converter.is_lead_byte(b'A'));
        // Lead byte followed by a space: only the lead byte is rejected
        assert_eq!(converter.decode(&[0x81, b' ']), (0, 1));
        assert_eq!(converter.decode(&[0x81, 0xFF]), (0, 2));
    }

    #[test]
    fn test_concurrent_first_use_is_idempotent() {
        let probe = Arc::new(CountingProbe::dbcs());
        let shared: Arc<dyn ConversionPrimitive> = probe.clone();
        let desc = descriptor(EncodingFamily::DoubleByte, shared);

        let results: Vec<(u32, usize)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| EncodingConverter::new(&desc).decode(&[0x81, 0x40])))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.iter().all(|&r| r == (0x3000, 2)));
        assert_eq!(probe.decode_calls(), 256);
    }
}
