//! Whole-buffer conversion between two encodings
//!
//! A [`Translator`] pairs a source and a target converter and walks the
//! input one code point at a time. Everything goes through the per-code-point
//! converter API, so legacy tables fill in as the input touches them.

use crate::converter::{Decoded, EncodingConverter};
use crate::descriptor::EncodingDescriptor;
use crate::{Error, Result};

const FALLBACK_REPLACEMENT: u32 = '?' as u32;

/// Converts byte buffers from one encoding to another
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    source: EncodingConverter<'a>,
    target: EncodingConverter<'a>,
}

impl<'a> Translator<'a> {
    /// Create a translator from `from` to `to`
    pub fn new(from: &'a EncodingDescriptor, to: &'a EncodingDescriptor) -> Self {
        Self {
            source: EncodingConverter::new(from),
            target: EncodingConverter::new(to),
        }
    }

    /// Source converter
    pub fn source(&self) -> EncodingConverter<'a> {
        self.source
    }

    /// Target converter
    pub fn target(&self) -> EncodingConverter<'a> {
        self.target
    }

    /// Convert `input`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// [`Error::UnmappableSource`] when a sequence cannot be decoded (including
    /// a sequence cut off by the end of input), [`Error::UnmappableTarget`]
    /// when a decoded code point has no bytes in the target encoding.
    pub fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len());
        let mut position = 0;

        while position < input.len() {
            let rest = &input[position..];
            match self.source.decode_next(rest) {
                Decoded::Mapped { codepoint, len } => {
                    let bytes = self
                        .target
                        .try_encode(codepoint)
                        .map_err(|_| Error::UnmappableTarget { position, codepoint })?;
                    output.extend_from_slice(&bytes);
                    position += len;
                }
                Decoded::Unmappable { len } => {
                    return Err(Error::UnmappableSource {
                        position,
                        bytes: rest[..len.clamp(1, rest.len())].to_vec(),
                    });
                }
                Decoded::Incomplete => {
                    return Err(Error::UnmappableSource {
                        position,
                        bytes: rest.to_vec(),
                    });
                }
            }
        }

        tracing::trace!(
            from = %self.source.descriptor().name(),
            to = %self.target.descriptor().name(),
            input = input.len(),
            output = output.len(),
            "converted buffer"
        );
        Ok(output)
    }

    /// Convert `input`, substituting `replacement` for anything that fails.
    ///
    /// The replacement is encoded with the target; if the target cannot
    /// represent it, `?` is used instead. Undecodable input is skipped one
    /// rejected unit at a time, and a truncated tail is replaced once.
    pub fn convert_lossy(&self, input: &[u8], replacement: u32) -> Vec<u8> {
        let substitute = self
            .target
            .try_encode(replacement)
            .or_else(|_| self.target.try_encode(FALLBACK_REPLACEMENT))
            .unwrap_or_default();

        let mut output = Vec::with_capacity(input.len());
        let mut position = 0;
        let mut replaced = 0usize;

        while position < input.len() {
            let rest = &input[position..];
            let len = match self.source.decode_next(rest) {
                Decoded::Mapped { codepoint, len } => {
                    match self.target.try_encode(codepoint) {
                        Ok(bytes) => output.extend_from_slice(&bytes),
                        Err(_) => {
                            output.extend_from_slice(&substitute);
                            replaced += 1;
                        }
                    }
                    len
                }
                Decoded::Unmappable { len } => {
                    output.extend_from_slice(&substitute);
                    replaced += 1;
                    len.max(1)
                }
                Decoded::Incomplete => {
                    output.extend_from_slice(&substitute);
                    replaced += 1;
                    rest.len()
                }
            };
            position += len;
        }

        if replaced > 0 {
            tracing::debug!(
                from = %self.source.descriptor().name(),
                to = %self.target.descriptor().name(),
                replaced,
                "lossy conversion substituted characters"
            );
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CandidateEncoding;
    use crate::{EncodingFamily, EncodingId, EncodingRsProbe};
    use std::sync::Arc;

    fn unicode(family: EncodingFamily) -> EncodingDescriptor {
        EncodingDescriptor::new(CandidateEncoding::unicode(
            EncodingId(1),
            family.name(),
            family.name(),
            family,
        ))
        .unwrap()
    }

    fn legacy(
        encoding: &'static encoding_rs::Encoding,
        family: EncodingFamily,
    ) -> EncodingDescriptor {
        EncodingDescriptor::new(CandidateEncoding::legacy(
            EncodingId(2),
            encoding.name(),
            encoding.name(),
            family,
            Arc::new(EncodingRsProbe::new(encoding)),
        ))
        .unwrap()
    }

    #[test]
    fn test_utf8_to_utf16le() {
        let utf8 = unicode(EncodingFamily::Utf8);
        let utf16 = unicode(EncodingFamily::Utf16Le);
        let translator = Translator::new(&utf8, &utf16);

        let output = translator.convert("A€😀".as_bytes()).unwrap();
        assert_eq!(
            output,
            [0x41, 0x00, 0xAC, 0x20, 0x3D, 0xD8, 0x00, 0xDE]
        );
    }

    #[test]
    fn test_shift_jis_to_utf8() {
        let sjis = legacy(encoding_rs::SHIFT_JIS, EncodingFamily::DoubleByte);
        let utf8 = unicode(EncodingFamily::Utf8);

        let output = Translator::new(&sjis, &utf8)
            .convert(&[0x93, 0xFA, 0x96, 0x7B, b'!', 0xB1])
            .unwrap();
        assert_eq!(output, "日本!ｱ".as_bytes());

        let back = Translator::new(&utf8, &sjis).convert(&output).unwrap();
        assert_eq!(back, [0x93, 0xFA, 0x96, 0x7B, b'!', 0xB1]);
    }

    #[test]
    fn test_convert_reports_unmappable_target() {
        let utf8 = unicode(EncodingFamily::Utf8);
        let latin = legacy(encoding_rs::WINDOWS_1252, EncodingFamily::SingleByte);

        let err = Translator::new(&utf8, &latin)
            .convert("ab日".as_bytes())
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnmappableTarget {
                position: 2,
                codepoint: 0x65E5
            }
        );
    }

    #[test]
    fn test_convert_reports_unmappable_source() {
        let utf8 = unicode(EncodingFamily::Utf8);
        let utf16 = unicode(EncodingFamily::Utf16Be);
        let translator = Translator::new(&utf8, &utf16);

        assert_eq!(
            translator.convert(&[b'a', 0xFF, b'b']).unwrap_err(),
            Error::UnmappableSource {
                position: 1,
                bytes: vec![0xFF]
            }
        );
        // Input cut off mid-sequence
        assert_eq!(
            translator.convert(&[b'a', 0xE2, 0x82]).unwrap_err(),
            Error::UnmappableSource {
                position: 1,
                bytes: vec![0xE2, 0x82]
            }
        );
    }

    #[test]
    fn test_convert_lossy_substitutes() {
        let utf8 = unicode(EncodingFamily::Utf8);
        let latin = legacy(encoding_rs::WINDOWS_1252, EncodingFamily::SingleByte);

        // U+FFFD is not in windows-1252, so '?' is used
        let output = Translator::new(&utf8, &latin).convert_lossy("a日b".as_bytes(), 0xFFFD);
        assert_eq!(output, b"a?b");

        let utf16 = unicode(EncodingFamily::Utf16Le);
        let output =
            Translator::new(&utf8, &utf16).convert_lossy(&[b'a', 0xFF, 0xE2, 0x82], 0xFFFD);
        assert_eq!(output, [0x61, 0x00, 0xFD, 0xFF, 0xFD, 0xFF]);
    }

    #[test]
    fn test_convert_lossy_keeps_ascii_after_bad_lead_byte() {
        let sjis = legacy(encoding_rs::SHIFT_JIS, EncodingFamily::DoubleByte);
        let utf8 = unicode(EncodingFamily::Utf8);
        let translator = Translator::new(&sjis, &utf8);

        let output = translator.convert_lossy(&[b'x', 0x81, b' ', b'A'], 0xFFFD);
        assert_eq!(output, "x\u{FFFD} A".as_bytes());

        assert_eq!(
            translator.convert(&[b'x', 0x81, b' ', b'A']).unwrap_err(),
            Error::UnmappableSource {
                position: 1,
                bytes: vec![0x81]
            }
        );
    }

    #[test]
    fn test_convert_empty_input() {
        let utf8 = unicode(EncodingFamily::Utf8);
        let utf32 = unicode(EncodingFamily::Utf32Be);
        assert!(Translator::new(&utf8, &utf32).convert(&[]).unwrap().is_empty());
    }
}
