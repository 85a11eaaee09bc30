//! Encoding descriptors and their lazily built conversion tables
//!
//! A descriptor owns its [`ConversionTables`]. Converters borrow the
//! descriptor, so every converter created for the same encoding shares one
//! set of tables and nothing is ever probed twice.
//!
//! Table cells are atomics holding either a value or one of two sentinels
//! ([`UNPROBED`], [`INVALID`]). Lookups never lock. Anything that probes the
//! [`ConversionPrimitive`] after the tables exist (lead-byte discovery, encode
//! side re-probing) runs under the tables' lock and re-checks the sentinel
//! first, so concurrent first use resolves each cell exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::catalog::CandidateEncoding;
use crate::converter::ByteSequence;
use crate::probe::ConversionPrimitive;
use crate::{EncodingFamily, EncodingId, Error, MAX_CODEPOINT, Result};

/// Cell value: not probed yet
pub const UNPROBED: u32 = u32::MAX;
/// Cell value: probed, no mapping exists
pub const INVALID: u32 = u32::MAX - 1;

/// Number of code points covered by the reverse table of legacy encodings
const REVERSE_TABLE_LEN: usize = 0x10000;

const LEAD_UNKNOWN: u8 = 0;
const LEAD_YES: u8 = 1;
const LEAD_NO: u8 = 2;

/// Decoded state of one table cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEntry<T> {
    /// Not probed yet
    Unprobed,
    /// Probed, no mapping exists
    Invalid,
    /// Probed and mapped
    Mapped(T),
}

/// Whether a byte starts a two-byte sequence in a double-byte encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadByteState {
    /// Discovery has not run for this byte
    Unknown,
    /// At least one trailing byte forms a valid character
    Lead,
    /// No trailing byte forms a valid character
    NotLead,
}

/// Cached lookup structures of one legacy encoding
pub struct ConversionTables {
    family: EncodingFamily,
    /// Single-byte: keyed by byte. Double-byte: keyed by `(lead << 8) | trail`,
    /// with `lead << 8` holding the lone-byte mapping.
    byte_to_codepoint: Box<[AtomicU32]>,
    /// Keyed by code point (0..=0xFFFF), values packed by [`pack_bytes`]
    codepoint_to_bytes: Box<[AtomicU32]>,
    /// Double-byte only; empty for single-byte tables
    lead_byte: Box<[AtomicU8]>,
    probe_lock: Mutex<()>,
}

fn filled(len: usize, value: u32) -> Box<[AtomicU32]> {
    (0..len).map(|_| AtomicU32::new(value)).collect()
}

/// Pack 1 or 2 bytes with their length so that `[0x00]` differs from the sentinels
fn pack_bytes(bytes: &[u8]) -> u32 {
    match *bytes {
        [b0] => (1 << 16) | (u32::from(b0) << 8),
        [b0, b1] => (2 << 16) | (u32::from(b0) << 8) | u32::from(b1),
        _ => INVALID,
    }
}

fn unpack_bytes(packed: u32) -> ByteSequence {
    let b0 = (packed >> 8) as u8;
    let b1 = packed as u8;
    if packed >> 16 == 2 {
        ByteSequence::from_slice(&[b0, b1])
    } else {
        ByteSequence::from_slice(&[b0])
    }
}

fn entry<T>(raw: u32, map: impl FnOnce(u32) -> T) -> TableEntry<T> {
    match raw {
        UNPROBED => TableEntry::Unprobed,
        INVALID => TableEntry::Invalid,
        value => TableEntry::Mapped(map(value)),
    }
}

impl ConversionTables {
    /// Build single-byte tables, probing all 256 byte values up front.
    ///
    /// A byte the primitive cannot decode maps to the code point with the same
    /// value (Latin-1 style identity).
    pub(crate) fn single_byte(primitive: &dyn ConversionPrimitive) -> Self {
        let tables = Self {
            family: EncodingFamily::SingleByte,
            byte_to_codepoint: filled(256, UNPROBED),
            codepoint_to_bytes: filled(REVERSE_TABLE_LEN, UNPROBED),
            lead_byte: Box::new([]),
            probe_lock: Mutex::new(()),
        };

        let mut fallbacks = 0usize;
        for byte in 0..=u8::MAX {
            let codepoint = match primitive
                .probe_decode(&[byte])
                .filter(|&cp| cp <= MAX_CODEPOINT)
            {
                Some(cp) => cp,
                None => {
                    fallbacks += 1;
                    u32::from(byte)
                }
            };
            tables.byte_to_codepoint[usize::from(byte)].store(codepoint, Ordering::Release);
            tables.record_reverse(codepoint, &[byte]);
        }

        tracing::debug!(fallbacks, "built single-byte tables");
        tables
    }

    /// Allocate double-byte tables. Rows are filled by lead-byte discovery.
    pub(crate) fn double_byte() -> Self {
        let tables = Self {
            family: EncodingFamily::DoubleByte,
            byte_to_codepoint: filled(0x10000, UNPROBED),
            codepoint_to_bytes: filled(REVERSE_TABLE_LEN, UNPROBED),
            lead_byte: (0..256).map(|_| AtomicU8::new(LEAD_UNKNOWN)).collect(),
            probe_lock: Mutex::new(()),
        };

        // 0x00 is never a lead byte; only the lone NUL maps
        for cell in &tables.byte_to_codepoint[1..256] {
            cell.store(INVALID, Ordering::Release);
        }
        tables.byte_to_codepoint[0].store(0, Ordering::Release);
        tables.codepoint_to_bytes[0].store(pack_bytes(&[0]), Ordering::Release);
        tables.lead_byte[0].store(LEAD_NO, Ordering::Release);

        tracing::debug!("allocated double-byte tables");
        tables
    }

    /// Family these tables were built for
    pub fn family(&self) -> EncodingFamily {
        self.family
    }

    /// Look up the code point stored for a byte key.
    ///
    /// Keys are a byte for single-byte tables and `(lead << 8) | trail` for
    /// double-byte tables. Out-of-range keys read as [`TableEntry::Invalid`].
    pub fn decoded(&self, key: usize) -> TableEntry<u32> {
        match self.byte_to_codepoint.get(key) {
            Some(cell) => entry(cell.load(Ordering::Acquire), |cp| cp),
            None => TableEntry::Invalid,
        }
    }

    /// Look up the bytes stored for a code point
    pub fn encoded(&self, codepoint: u32) -> TableEntry<ByteSequence> {
        match self.codepoint_to_bytes.get(codepoint as usize) {
            Some(cell) => entry(cell.load(Ordering::Acquire), unpack_bytes),
            None => TableEntry::Invalid,
        }
    }

    /// Current discovery state of a lead byte. Single-byte tables have no lead bytes.
    pub fn lead_byte_state(&self, byte: u8) -> LeadByteState {
        match self.lead_byte.get(usize::from(byte)) {
            Some(cell) => match cell.load(Ordering::Acquire) {
                LEAD_UNKNOWN => LeadByteState::Unknown,
                LEAD_YES => LeadByteState::Lead,
                _ => LeadByteState::NotLead,
            },
            None => LeadByteState::NotLead,
        }
    }

    /// Number of lead bytes whose discovery has completed
    pub fn discovered_lead_bytes(&self) -> usize {
        (0..=u8::MAX)
            .filter(|&b| self.lead_byte_state(b) != LeadByteState::Unknown)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // Cells always hold a sentinel or a final value, so a poisoned lock is still usable
        self.probe_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First mapping wins; later duplicates of a code point keep the earlier bytes.
    fn record_reverse(&self, codepoint: u32, bytes: &[u8]) {
        if let Some(cell) = self.codepoint_to_bytes.get(codepoint as usize) {
            let _ = cell.compare_exchange(
                UNPROBED,
                pack_bytes(bytes),
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    /// Resolve whether `lead` is a lead byte, running discovery on first use.
    ///
    /// Discovery probes the lone byte and all 255 non-zero trailing bytes,
    /// 256 probes in total, and happens at most once per lead byte.
    pub(crate) fn discover_lead_byte(&self, lead: u8, primitive: &dyn ConversionPrimitive) -> bool {
        match self.lead_byte_state(lead) {
            LeadByteState::Lead => return true,
            LeadByteState::NotLead => return false,
            LeadByteState::Unknown => {}
        }

        let _guard = self.lock();
        match self.lead_byte_state(lead) {
            LeadByteState::Lead => return true,
            LeadByteState::NotLead => return false,
            LeadByteState::Unknown => {}
        }

        let row = usize::from(lead) << 8;
        let valid = |cp: &u32| *cp <= MAX_CODEPOINT;

        match primitive.probe_decode(&[lead]).filter(valid) {
            Some(cp) => {
                self.byte_to_codepoint[row].store(cp, Ordering::Release);
                self.record_reverse(cp, &[lead]);
            }
            None => self.byte_to_codepoint[row].store(INVALID, Ordering::Release),
        }

        let mut trails = 0usize;
        for trail in 1..=u8::MAX {
            let key = row | usize::from(trail);
            match primitive.probe_decode(&[lead, trail]).filter(valid) {
                Some(cp) => {
                    self.byte_to_codepoint[key].store(cp, Ordering::Release);
                    self.record_reverse(cp, &[lead, trail]);
                    trails += 1;
                }
                None => self.byte_to_codepoint[key].store(INVALID, Ordering::Release),
            }
        }

        let is_lead = trails > 0;
        let state = if is_lead { LEAD_YES } else { LEAD_NO };
        self.lead_byte[usize::from(lead)].store(state, Ordering::Release);

        tracing::trace!(lead = format_args!("0x{:02X}", lead), trails, "lead byte discovered");
        is_lead
    }

    /// Reverse lookup, probing the primitive once for code points not seen yet.
    ///
    /// The probe result is cached, including failures. Results longer than the
    /// family allows (1 byte single-byte, 2 bytes double-byte) count as failures.
    pub(crate) fn encode_or_probe(
        &self,
        codepoint: u32,
        primitive: &dyn ConversionPrimitive,
    ) -> Option<ByteSequence> {
        match self.encoded(codepoint) {
            TableEntry::Mapped(bytes) => return Some(bytes),
            TableEntry::Invalid => return None,
            TableEntry::Unprobed => {}
        }

        let _guard = self.lock();
        match self.encoded(codepoint) {
            TableEntry::Mapped(bytes) => return Some(bytes),
            TableEntry::Invalid => return None,
            TableEntry::Unprobed => {}
        }

        let max_len = self.family.max_bytes_per_char();
        let packed = primitive
            .probe_encode(codepoint)
            .filter(|bytes| !bytes.is_empty() && bytes.len() <= max_len)
            .map_or(INVALID, |bytes| pack_bytes(&bytes));
        self.codepoint_to_bytes[codepoint as usize].store(packed, Ordering::Release);

        tracing::trace!(
            codepoint = format_args!("U+{:04X}", codepoint),
            mapped = packed != INVALID,
            "code point probed"
        );
        (packed != INVALID).then(|| unpack_bytes(packed))
    }
}

impl fmt::Debug for ConversionTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionTables")
            .field("family", &self.family)
            .field("discovered_lead_bytes", &self.discovered_lead_bytes())
            .finish_non_exhaustive()
    }
}

/// Identity, metadata and cached tables of one encoding
pub struct EncodingDescriptor {
    id: EncodingId,
    canonical_name: String,
    description: String,
    family: EncodingFamily,
    suggested_font: String,
    primitive: Option<Arc<dyn ConversionPrimitive>>,
    tables: OnceLock<ConversionTables>,
}

impl EncodingDescriptor {
    /// Create a descriptor from a host-provided candidate.
    ///
    /// The name is uppercased. Unicode families drop any primitive they were
    /// given; legacy families require one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPrimitive`] for a single- or double-byte
    /// candidate without a conversion primitive.
    pub fn new(candidate: CandidateEncoding) -> Result<Self> {
        let CandidateEncoding {
            id,
            name,
            description,
            family,
            suggested_font,
            primitive,
        } = candidate;

        let primitive = if family.is_legacy() {
            Some(primitive.ok_or_else(|| Error::MissingPrimitive { name: name.clone() })?)
        } else {
            None
        };

        Ok(Self {
            id,
            canonical_name: name.to_uppercase(),
            description,
            family,
            suggested_font,
            primitive,
            tables: OnceLock::new(),
        })
    }

    /// Stable identifier
    pub fn id(&self) -> EncodingId {
        self.id
    }

    /// Uppercase canonical name, unique within a catalog
    pub fn name(&self) -> &str {
        &self.canonical_name
    }

    /// Human-readable label
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Codec family
    pub fn family(&self) -> EncodingFamily {
        self.family
    }

    /// Advisory font for displaying text in this encoding
    pub fn suggested_font(&self) -> &str {
        &self.suggested_font
    }

    /// Tables, if a conversion has already built them
    pub fn tables(&self) -> Option<&ConversionTables> {
        self.tables.get()
    }

    /// Tables and primitive of a legacy encoding, building the tables on first call.
    ///
    /// Returns `None` for Unicode families, which convert by arithmetic.
    pub(crate) fn legacy_tables(&self) -> Option<(&ConversionTables, &dyn ConversionPrimitive)> {
        let primitive = self.primitive.as_deref()?;
        let tables = self.tables.get_or_init(|| {
            tracing::debug!(
                encoding = %self.canonical_name,
                family = %self.family,
                "building conversion tables"
            );
            match self.family {
                EncodingFamily::DoubleByte => ConversionTables::double_byte(),
                _ => ConversionTables::single_byte(primitive),
            }
        });
        Some((tables, primitive))
    }
}

impl fmt::Debug for EncodingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodingDescriptor")
            .field("id", &self.id)
            .field("name", &self.canonical_name)
            .field("family", &self.family)
            .field("tables", &self.tables.get())
            .finish_non_exhaustive()
    }
}
