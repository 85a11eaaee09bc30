//! Arithmetic codecs for the Unicode transformation formats
//!
//! Nothing here is cached: UTF-8, UTF-16 and UTF-32 are pure bit packing.

use crate::MAX_CODEPOINT;
use crate::converter::{ByteSequence, Decoded};

/// Byte order of a 16- or 32-bit code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16_bytes(self, unit: u16) -> [u8; 2] {
        match self {
            Endian::Little => unit.to_le_bytes(),
            Endian::Big => unit.to_be_bytes(),
        }
    }

    fn u16_from(self, bytes: [u8; 2]) -> u16 {
        match self {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        }
    }

    fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        }
    }
}

fn is_surrogate(codepoint: u32) -> bool {
    (0xD800..=0xDFFF).contains(&codepoint)
}

/// Encode per RFC 3629:
///
/// ```text
/// 0000 0000-0000 007F | 0xxxxxxx
/// 0000 0080-0000 07FF | 110xxxxx 10xxxxxx
/// 0000 0800-0000 FFFF | 1110xxxx 10xxxxxx 10xxxxxx
/// 0001 0000-0010 FFFF | 11110xxx 10xxxxxx 10xxxxxx 10xxxxxx
/// ```
pub(crate) fn encode_utf8(codepoint: u32) -> ByteSequence {
    let cont = |shift: u32| 0x80 | ((codepoint >> shift) & 0x3F) as u8;
    match codepoint {
        0..=0x7F => ByteSequence::from_slice(&[codepoint as u8]),
        0x80..=0x7FF => ByteSequence::from_slice(&[0xC0 | (codepoint >> 6) as u8, cont(0)]),
        0x800..=0xFFFF => {
            ByteSequence::from_slice(&[0xE0 | (codepoint >> 12) as u8, cont(6), cont(0)])
        }
        0x10000..=MAX_CODEPOINT => ByteSequence::from_slice(&[
            0xF0 | (codepoint >> 18) as u8,
            cont(12),
            cont(6),
            cont(0),
        ]),
        _ => ByteSequence::empty(),
    }
}

/// Decode one UTF-8 sequence, rejecting overlong forms, surrogates and
/// values above U+10FFFF.
pub(crate) fn decode_utf8(bytes: &[u8]) -> Decoded {
    let Some(&lead) = bytes.first() else {
        return Decoded::Incomplete;
    };

    // Valid range of the second byte narrows for E0, ED, F0 and F4
    let (len, initial, second) = match lead {
        0x00..=0x7F => {
            return Decoded::Mapped {
                codepoint: u32::from(lead),
                len: 1,
            };
        }
        0xC2..=0xDF => (2, u32::from(lead & 0x1F), 0x80..=0xBF),
        0xE0 => (3, 0, 0xA0..=0xBF),
        0xE1..=0xEC | 0xEE..=0xEF => (3, u32::from(lead & 0x0F), 0x80..=0xBF),
        0xED => (3, 0x0D, 0x80..=0x9F),
        0xF0 => (4, 0, 0x90..=0xBF),
        0xF1..=0xF3 => (4, u32::from(lead & 0x07), 0x80..=0xBF),
        0xF4 => (4, 0x04, 0x80..=0x8F),
        _ => return Decoded::Unmappable { len: 1 },
    };

    let mut codepoint = initial;
    for index in 1..len {
        let Some(&byte) = bytes.get(index) else {
            return Decoded::Incomplete;
        };
        let allowed = if index == 1 {
            second.contains(&byte)
        } else {
            (0x80..=0xBF).contains(&byte)
        };
        if !allowed {
            return Decoded::Unmappable { len: index };
        }
        codepoint = (codepoint << 6) | u32::from(byte & 0x3F);
    }

    Decoded::Mapped { codepoint, len }
}

/// Encode as one UTF-16 unit, or a surrogate pair above the BMP
pub(crate) fn encode_utf16(codepoint: u32, endian: Endian) -> ByteSequence {
    if codepoint > MAX_CODEPOINT {
        return ByteSequence::empty();
    }
    if codepoint < 0x10000 {
        return ByteSequence::from_slice(&endian.u16_bytes(codepoint as u16));
    }

    let value = codepoint - 0x10000;
    let high = endian.u16_bytes(((value >> 10) + 0xD800) as u16);
    let low = endian.u16_bytes(((value & 0x3FF) + 0xDC00) as u16);
    ByteSequence::from_slice(&[high[0], high[1], low[0], low[1]])
}

pub(crate) fn decode_utf16(bytes: &[u8], endian: Endian) -> Decoded {
    let [b0, b1, rest @ ..] = bytes else {
        return Decoded::Incomplete;
    };
    let unit = u32::from(endian.u16_from([*b0, *b1]));

    match unit {
        0xD800..=0xDBFF => {
            let [b2, b3, ..] = rest else {
                return Decoded::Incomplete;
            };
            let low = u32::from(endian.u16_from([*b2, *b3]));
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Decoded::Unmappable { len: 2 };
            }
            Decoded::Mapped {
                codepoint: 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00),
                len: 4,
            }
        }
        0xDC00..=0xDFFF => Decoded::Unmappable { len: 2 },
        _ => Decoded::Mapped {
            codepoint: unit,
            len: 2,
        },
    }
}

/// Encode as four bytes in the requested byte order.
///
/// # Panics
///
/// Panics if `codepoint` is above U+10FFFF. Callers must range-check first.
pub(crate) fn encode_utf32(codepoint: u32, endian: Endian) -> ByteSequence {
    assert!(
        codepoint <= MAX_CODEPOINT,
        "UTF-32 code point 0x{codepoint:X} is above U+10FFFF"
    );
    ByteSequence::from_slice(&endian.u32_bytes(codepoint))
}

pub(crate) fn decode_utf32(bytes: &[u8], endian: Endian) -> Decoded {
    let [b0, b1, b2, b3, ..] = bytes else {
        return Decoded::Incomplete;
    };
    let codepoint = endian.u32_from([*b0, *b1, *b2, *b3]);
    if codepoint > MAX_CODEPOINT || is_surrogate(codepoint) {
        return Decoded::Unmappable { len: 4 };
    }
    Decoded::Mapped { codepoint, len: 4 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8(codepoint: u32) -> Vec<u8> {
        encode_utf8(codepoint).to_vec()
    }

    #[test]
    fn test_utf8_boundaries() {
        assert_eq!(utf8(0x7F), [0x7F]);
        assert_eq!(utf8(0x80), [0xC2, 0x80]);
        assert_eq!(utf8(0x7FF), [0xDF, 0xBF]);
        assert_eq!(utf8(0x800), [0xE0, 0xA0, 0x80]);
        assert_eq!(utf8(0xFFFF), [0xEF, 0xBF, 0xBF]);
        assert_eq!(utf8(0x10000), [0xF0, 0x90, 0x80, 0x80]);
        assert_eq!(utf8(0x10FFFF), [0xF4, 0x8F, 0xBF, 0xBF]);
        assert!(utf8(0x110000).is_empty());
        assert!(utf8(u32::MAX).is_empty());
    }

    #[test]
    fn test_utf8_matches_std() {
        for ch in ['A', 'é', '€', '世', '😀'] {
            let mut buf = [0u8; 4];
            assert_eq!(utf8(ch as u32), ch.encode_utf8(&mut buf).as_bytes());
            assert_eq!(
                decode_utf8(ch.encode_utf8(&mut buf).as_bytes()),
                Decoded::Mapped {
                    codepoint: ch as u32,
                    len: ch.len_utf8()
                }
            );
        }
    }

    #[test]
    fn test_utf8_decode_rejects_malformed() {
        // Overlong '/'
        assert_eq!(decode_utf8(&[0xC0, 0xAF]), Decoded::Unmappable { len: 1 });
        // Overlong three-byte form
        assert_eq!(decode_utf8(&[0xE0, 0x80, 0x80]), Decoded::Unmappable { len: 1 });
        // Encoded surrogate U+D800
        assert_eq!(decode_utf8(&[0xED, 0xA0, 0x80]), Decoded::Unmappable { len: 1 });
        // Above U+10FFFF
        assert_eq!(decode_utf8(&[0xF4, 0x90, 0x80, 0x80]), Decoded::Unmappable { len: 1 });
        // Bad third byte
        assert_eq!(decode_utf8(&[0xE4, 0xB8, 0x41]), Decoded::Unmappable { len: 2 });
        // Stray continuation byte
        assert_eq!(decode_utf8(&[0x80]), Decoded::Unmappable { len: 1 });
    }

    #[test]
    fn test_utf8_decode_incomplete() {
        assert_eq!(decode_utf8(&[]), Decoded::Incomplete);
        assert_eq!(decode_utf8(&[0xF0, 0x9F, 0x98]), Decoded::Incomplete);
    }

    #[test]
    fn test_utf16_surrogate_pairs() {
        assert_eq!(
            encode_utf16(0x1F600, Endian::Little).to_vec(),
            [0x3D, 0xD8, 0x00, 0xDE]
        );
        assert_eq!(
            encode_utf16(0x1F600, Endian::Big).to_vec(),
            [0xD8, 0x3D, 0xDE, 0x00]
        );
        assert_eq!(
            decode_utf16(&[0x3D, 0xD8, 0x00, 0xDE], Endian::Little),
            Decoded::Mapped {
                codepoint: 0x1F600,
                len: 4
            }
        );
        assert_eq!(
            decode_utf16(&[0xD8, 0x3D, 0xDE, 0x00], Endian::Big),
            Decoded::Mapped {
                codepoint: 0x1F600,
                len: 4
            }
        );
    }

    #[test]
    fn test_utf16_bmp_and_range() {
        assert_eq!(encode_utf16(0x20AC, Endian::Little).to_vec(), [0xAC, 0x20]);
        assert_eq!(encode_utf16(0x20AC, Endian::Big).to_vec(), [0x20, 0xAC]);
        assert!(encode_utf16(0x110000, Endian::Little).is_empty());
    }

    #[test]
    fn test_utf16_decode_lone_surrogates() {
        // High surrogate followed by 'A'
        assert_eq!(
            decode_utf16(&[0x3D, 0xD8, 0x41, 0x00], Endian::Little),
            Decoded::Unmappable { len: 2 }
        );
        // Low surrogate first
        assert_eq!(
            decode_utf16(&[0x00, 0xDE], Endian::Little),
            Decoded::Unmappable { len: 2 }
        );
        // High surrogate at end of input
        assert_eq!(
            decode_utf16(&[0x3D, 0xD8], Endian::Little),
            Decoded::Incomplete
        );
        assert_eq!(decode_utf16(&[0x41], Endian::Little), Decoded::Incomplete);
    }

    #[test]
    fn test_utf32_byte_order() {
        assert_eq!(encode_utf32(0x41, Endian::Big).to_vec(), [0x00, 0x00, 0x00, 0x41]);
        assert_eq!(encode_utf32(0x41, Endian::Little).to_vec(), [0x41, 0x00, 0x00, 0x00]);
        assert_eq!(
            decode_utf32(&[0x00, 0xF6, 0x01, 0x00], Endian::Little),
            Decoded::Mapped {
                codepoint: 0x1F600,
                len: 4
            }
        );
    }

    #[test]
    fn test_utf32_decode_rejects_out_of_range() {
        assert_eq!(
            decode_utf32(&[0x00, 0x11, 0x00, 0x00], Endian::Big),
            Decoded::Unmappable { len: 4 }
        );
        assert_eq!(
            decode_utf32(&[0x00, 0xD8, 0x00, 0x00], Endian::Little),
            Decoded::Unmappable { len: 4 }
        );
        assert_eq!(decode_utf32(&[0x41, 0x00], Endian::Little), Decoded::Incomplete);
    }

    #[test]
    #[should_panic(expected = "above U+10FFFF")]
    fn test_utf32_encode_out_of_range_panics() {
        encode_utf32(0x110000, Endian::Little);
    }
}
