//! # MultiEncode - Multi-Encoding Text Conversion Engine
//!
//! Translates between Unicode code points and a family of legacy and Unicode
//! byte encodings, caching per-encoding lookup tables on first use.
//!
//! ## Features
//!
//! - **Unicode transformation formats**: UTF-8, UTF-16LE/BE, UTF-32LE/BE by pure arithmetic
//! - **Single-byte code pages** with tables probed eagerly on first use
//! - **Double-byte code pages** (Shift-JIS, GBK, Big5, EUC-KR, ...) with lazy
//!   per-lead-byte discovery
//! - **Thread-safe** table construction: every table entry is probed at most once
//! - **Explicit catalog** value instead of process-wide registries
//!
//! ## Quick Start
//!
//! ```rust
//! use multi_encode::host;
//!
//! let catalog = host::default_catalog().unwrap();
//!
//! let utf16 = catalog.converter_by_name("utf-16le");
//! assert_eq!(utf16.encode(0x1F600).as_slice(), &[0x3D, 0xD8, 0x00, 0xDE]);
//!
//! // Unknown names fall back to the system default instead of failing
//! let fallback = catalog.find_by_name("NO-SUCH-ENCODING");
//! assert_eq!(fallback.id(), catalog.system_default().id());
//! ```

#![deny(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod converter;
pub mod descriptor;
pub mod host;
mod multibyte;
pub mod probe;
pub mod translator;
mod unicode;

pub use catalog::{CandidateEncoding, CatalogBuilder, EncodingCatalog, EncodingInfo, Registration};
pub use converter::{ByteSequence, EncodingConverter};
pub use descriptor::{ConversionTables, EncodingDescriptor, LeadByteState};
pub use multibyte::{DoubleByteConverter, SingleByteConverter};
pub use probe::{ConversionPrimitive, EncodingRsProbe};
pub use translator::Translator;

/// Largest code point representable in any Unicode transformation format.
pub const MAX_CODEPOINT: u32 = 0x10FFFF;

/// Result type for encoding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during encoding operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Code point has no byte representation in the target encoding
    UnmappableCodepoint {
        /// The unmappable code point
        codepoint: u32,
    },
    /// Byte sequence has no code point in the source encoding
    UnmappableByteSequence {
        /// The rejected bytes (empty when the input ended mid-sequence)
        bytes: Vec<u8>,
    },
    /// Code point is outside the domain the encoding family can represent
    OutOfRange {
        /// The offending code point
        codepoint: u32,
    },
    /// No encoding with this name is registered
    UnknownEncodingName(String),
    /// No encoding with this id is registered
    UnknownEncodingId(EncodingId),
    /// A catalog was built without any registered encoding
    EmptyCatalog,
    /// A single- or double-byte encoding was registered without a conversion primitive
    MissingPrimitive {
        /// Name of the rejected candidate
        name: String,
    },
    /// Source data could not be decoded during a buffer conversion
    UnmappableSource {
        /// Byte offset of the rejected sequence in the input
        position: usize,
        /// The rejected bytes
        bytes: Vec<u8>,
    },
    /// A decoded code point could not be encoded during a buffer conversion
    UnmappableTarget {
        /// Byte offset in the input of the sequence that produced the code point
        position: usize,
        /// The unmappable code point
        codepoint: u32,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnmappableCodepoint { codepoint } => {
                write!(f, "Cannot encode code point U+{:04X}", codepoint)
            }
            Error::UnmappableByteSequence { bytes } if bytes.is_empty() => {
                write!(f, "Incomplete byte sequence")
            }
            Error::UnmappableByteSequence { bytes } => {
                write!(f, "Unmappable byte sequence {:02X?}", bytes)
            }
            Error::OutOfRange { codepoint } => {
                write!(f, "Code point 0x{:X} is out of range", codepoint)
            }
            Error::UnknownEncodingName(name) => write!(f, "Unknown encoding name: {}", name),
            Error::UnknownEncodingId(id) => write!(f, "Unknown encoding id: {}", id),
            Error::EmptyCatalog => write!(f, "Encoding catalog has no registered encodings"),
            Error::MissingPrimitive { name } => {
                write!(f, "Encoding {} requires a conversion primitive", name)
            }
            Error::UnmappableSource { position, bytes } => {
                write!(
                    f,
                    "Unmappable source bytes {:02X?} at position {}",
                    bytes, position
                )
            }
            Error::UnmappableTarget {
                position,
                codepoint,
            } => {
                write!(
                    f,
                    "Cannot encode code point U+{:04X} decoded at position {}",
                    codepoint, position
                )
            }
        }
    }
}

impl std::error::Error for Error {}

/// Opaque, stable identifier of an encoding (a platform code page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingId(pub u32);

impl EncodingId {
    /// UTF-8
    pub const UTF8: EncodingId = EncodingId(65001);
    /// UTF-16 little endian
    pub const UTF16LE: EncodingId = EncodingId(1200);
    /// UTF-16 big endian
    pub const UTF16BE: EncodingId = EncodingId(1201);
    /// UTF-32 little endian
    pub const UTF32LE: EncodingId = EncodingId(12000);
    /// UTF-32 big endian
    pub const UTF32BE: EncodingId = EncodingId(12001);
}

impl fmt::Display for EncodingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoding category that determines which codec rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingFamily {
    /// One byte per character, table backed
    SingleByte,
    /// One or two bytes per character, table backed with lead-byte discovery
    DoubleByte,
    /// UTF-8 (1-4 bytes)
    Utf8,
    /// UTF-16 little endian (2 or 4 bytes)
    Utf16Le,
    /// UTF-16 big endian (2 or 4 bytes)
    Utf16Be,
    /// UTF-32 little endian (4 bytes)
    Utf32Le,
    /// UTF-32 big endian (4 bytes)
    Utf32Be,
}

impl EncodingFamily {
    /// All families, in declaration order
    pub const ALL: [EncodingFamily; 7] = [
        EncodingFamily::SingleByte,
        EncodingFamily::DoubleByte,
        EncodingFamily::Utf8,
        EncodingFamily::Utf16Le,
        EncodingFamily::Utf16Be,
        EncodingFamily::Utf32Le,
        EncodingFamily::Utf32Be,
    ];

    /// Get the display name of this family
    pub fn name(self) -> &'static str {
        match self {
            EncodingFamily::SingleByte => "single-byte",
            EncodingFamily::DoubleByte => "double-byte",
            EncodingFamily::Utf8 => "utf-8",
            EncodingFamily::Utf16Le => "utf-16le",
            EncodingFamily::Utf16Be => "utf-16be",
            EncodingFamily::Utf32Le => "utf-32le",
            EncodingFamily::Utf32Be => "utf-32be",
        }
    }

    /// Parse a family from its display name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(name))
    }

    /// Check if this family converts through probed tables rather than arithmetic
    pub fn is_legacy(self) -> bool {
        matches!(self, EncodingFamily::SingleByte | EncodingFamily::DoubleByte)
    }

    /// Check if this family uses variable-length character representation
    pub fn is_multibyte(self) -> bool {
        matches!(
            self,
            EncodingFamily::DoubleByte
                | EncodingFamily::Utf8
                | EncodingFamily::Utf16Le
                | EncodingFamily::Utf16Be
        )
    }

    /// Maximum number of bytes a single code point can occupy
    pub fn max_bytes_per_char(self) -> usize {
        match self {
            EncodingFamily::SingleByte => 1,
            EncodingFamily::DoubleByte => 2,
            EncodingFamily::Utf8
            | EncodingFamily::Utf16Le
            | EncodingFamily::Utf16Be
            | EncodingFamily::Utf32Le
            | EncodingFamily::Utf32Be => 4,
        }
    }

    /// Get the byte order mark (BOM) for this family if it has one
    pub fn bom(self) -> Option<&'static [u8]> {
        match self {
            EncodingFamily::Utf8 => Some(&[0xEF, 0xBB, 0xBF]),
            EncodingFamily::Utf16Le => Some(&[0xFF, 0xFE]),
            EncodingFamily::Utf16Be => Some(&[0xFE, 0xFF]),
            EncodingFamily::Utf32Le => Some(&[0xFF, 0xFE, 0x00, 0x00]),
            EncodingFamily::Utf32Be => Some(&[0x00, 0x00, 0xFE, 0xFF]),
            EncodingFamily::SingleByte | EncodingFamily::DoubleByte => None,
        }
    }

    /// Detect a leading BOM, returning the family and the BOM length.
    ///
    /// UTF-32LE is checked before UTF-16LE since their marks share a prefix.
    pub fn sniff_bom(data: &[u8]) -> Option<(EncodingFamily, usize)> {
        [
            EncodingFamily::Utf32Le,
            EncodingFamily::Utf32Be,
            EncodingFamily::Utf8,
            EncodingFamily::Utf16Le,
            EncodingFamily::Utf16Be,
        ]
        .into_iter()
        .find_map(|family| {
            let bom = family.bom()?;
            data.starts_with(bom).then_some((family, bom.len()))
        })
    }
}

impl fmt::Display for EncodingFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
