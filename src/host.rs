//! Built-in host enumeration backed by `encoding_rs`
//!
//! Supplies the candidate encodings and the system encoding id a catalog is
//! built from. Legacy code pages are probed through [`EncodingRsProbe`].

use std::sync::Arc;

use encoding_rs::Encoding;

use crate::catalog::{CandidateEncoding, EncodingCatalog};
use crate::probe::EncodingRsProbe;
use crate::{EncodingFamily, EncodingId, Result};

/// Locale variables consulted for the system encoding, highest priority first
pub const LOCALE_VARIABLES: [&str; 3] = ["LC_ALL", "LC_CTYPE", "LANG"];

const CJK_FONT: &str = "Noto Sans Mono CJK";

struct Legacy {
    id: u32,
    name: &'static str,
    description: &'static str,
    family: EncodingFamily,
    encoding: &'static Encoding,
}

fn single(
    id: u32,
    name: &'static str,
    description: &'static str,
    encoding: &'static Encoding,
) -> Legacy {
    Legacy {
        id,
        name,
        description,
        family: EncodingFamily::SingleByte,
        encoding,
    }
}

fn double(
    id: u32,
    name: &'static str,
    description: &'static str,
    encoding: &'static Encoding,
) -> Legacy {
    Legacy {
        id,
        name,
        description,
        family: EncodingFamily::DoubleByte,
        encoding,
    }
}

fn legacy_encodings() -> Vec<Legacy> {
    vec![
        single(28592, "ISO-8859-2", "Central European (ISO-8859-2)", encoding_rs::ISO_8859_2),
        single(28593, "ISO-8859-3", "South European (ISO-8859-3)", encoding_rs::ISO_8859_3),
        single(28594, "ISO-8859-4", "Baltic (ISO-8859-4)", encoding_rs::ISO_8859_4),
        single(28595, "ISO-8859-5", "Cyrillic (ISO-8859-5)", encoding_rs::ISO_8859_5),
        single(28596, "ISO-8859-6", "Arabic (ISO-8859-6)", encoding_rs::ISO_8859_6),
        single(28597, "ISO-8859-7", "Greek (ISO-8859-7)", encoding_rs::ISO_8859_7),
        single(28598, "ISO-8859-8", "Hebrew (ISO-8859-8)", encoding_rs::ISO_8859_8),
        single(28600, "ISO-8859-10", "Nordic (ISO-8859-10)", encoding_rs::ISO_8859_10),
        single(28603, "ISO-8859-13", "Baltic (ISO-8859-13)", encoding_rs::ISO_8859_13),
        single(28604, "ISO-8859-14", "Celtic (ISO-8859-14)", encoding_rs::ISO_8859_14),
        single(28605, "ISO-8859-15", "Western European (ISO-8859-15)", encoding_rs::ISO_8859_15),
        single(
            28606,
            "ISO-8859-16",
            "South-Eastern European (ISO-8859-16)",
            encoding_rs::ISO_8859_16,
        ),
        single(874, "WINDOWS-874", "Thai (Windows-874)", encoding_rs::WINDOWS_874),
        single(1250, "WINDOWS-1250", "Central European (Windows-1250)", encoding_rs::WINDOWS_1250),
        single(1251, "WINDOWS-1251", "Cyrillic (Windows-1251)", encoding_rs::WINDOWS_1251),
        single(1252, "WINDOWS-1252", "Western European (Windows-1252)", encoding_rs::WINDOWS_1252),
        single(1253, "WINDOWS-1253", "Greek (Windows-1253)", encoding_rs::WINDOWS_1253),
        single(1254, "WINDOWS-1254", "Turkish (Windows-1254)", encoding_rs::WINDOWS_1254),
        single(1255, "WINDOWS-1255", "Hebrew (Windows-1255)", encoding_rs::WINDOWS_1255),
        single(1256, "WINDOWS-1256", "Arabic (Windows-1256)", encoding_rs::WINDOWS_1256),
        single(1257, "WINDOWS-1257", "Baltic (Windows-1257)", encoding_rs::WINDOWS_1257),
        single(1258, "WINDOWS-1258", "Vietnamese (Windows-1258)", encoding_rs::WINDOWS_1258),
        single(20866, "KOI8-R", "Cyrillic (KOI8-R)", encoding_rs::KOI8_R),
        single(21866, "KOI8-U", "Ukrainian (KOI8-U)", encoding_rs::KOI8_U),
        single(866, "IBM866", "Cyrillic (DOS 866)", encoding_rs::IBM866),
        single(10000, "MACINTOSH", "Western European (Mac Roman)", encoding_rs::MACINTOSH),
        double(932, "SHIFT-JIS", "Japanese (Shift-JIS)", encoding_rs::SHIFT_JIS),
        double(936, "GBK", "Chinese Simplified (GBK)", encoding_rs::GBK),
        double(949, "EUC-KR", "Korean (EUC-KR)", encoding_rs::EUC_KR),
        double(950, "BIG5", "Chinese Traditional (Big5)", encoding_rs::BIG5),
        double(51932, "EUC-JP", "Japanese (EUC-JP)", encoding_rs::EUC_JP),
        // Same code page under a second id; the catalog keeps the first
        double(10932, "SHIFT-JIS", "Japanese (Shift-JIS, Mac)", encoding_rs::SHIFT_JIS),
    ]
}

/// Encodings this host offers, in enumeration order
pub fn candidates() -> Vec<CandidateEncoding> {
    use crate::EncodingFamily::{Utf8, Utf16Be, Utf16Le, Utf32Be, Utf32Le};

    let unicode = [
        (EncodingId::UTF8, "UTF-8", "Unicode (UTF-8)", Utf8),
        (EncodingId::UTF16LE, "UTF-16LE", "Unicode (UTF-16 Little Endian)", Utf16Le),
        (EncodingId::UTF16BE, "UTF-16BE", "Unicode (UTF-16 Big Endian)", Utf16Be),
        (EncodingId::UTF32LE, "UTF-32LE", "Unicode (UTF-32 Little Endian)", Utf32Le),
        (EncodingId::UTF32BE, "UTF-32BE", "Unicode (UTF-32 Big Endian)", Utf32Be),
    ]
    .into_iter()
    .map(|(id, name, description, family)| {
        CandidateEncoding::unicode(id, name, description, family)
    });

    let legacy = legacy_encodings().into_iter().map(|entry| {
        let candidate = CandidateEncoding::legacy(
            EncodingId(entry.id),
            entry.name,
            entry.description,
            entry.family,
            Arc::new(EncodingRsProbe::new(entry.encoding)),
        );
        match entry.family {
            EncodingFamily::DoubleByte => candidate.with_font(CJK_FONT),
            _ => candidate,
        }
    });

    unicode.chain(legacy).collect()
}

/// Map a POSIX locale string such as `ja_JP.SJIS@mod` to an encoding id.
///
/// Returns `None` when the locale names no codeset or an unknown one.
pub fn encoding_id_for_locale(locale: &str) -> Option<EncodingId> {
    let (_, codeset) = locale.split_once('.')?;
    let codeset = codeset.split('@').next().unwrap_or(codeset);
    let normalized: String = codeset
        .chars()
        .filter(|c| !matches!(c, '-' | '_'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let id = match normalized.as_str() {
        "UTF8" => EncodingId::UTF8.0,
        "SJIS" | "SHIFTJIS" | "CP932" => 932,
        "GBK" | "GB2312" | "CP936" => 936,
        "EUCKR" | "CP949" => 949,
        "BIG5" | "CP950" => 950,
        "EUCJP" => 51932,
        "KOI8R" => 20866,
        "KOI8U" => 21866,
        other => {
            if let Some(part) = other.strip_prefix("ISO8859") {
                let part: u32 = part.parse().ok()?;
                if !(1..=16).contains(&part) {
                    return None;
                }
                28590 + part
            } else if let Some(page) = other
                .strip_prefix("CP")
                .or_else(|| other.strip_prefix("WINDOWS"))
            {
                let page: u32 = page.parse().ok()?;
                if !(1250..=1258).contains(&page) && page != 874 {
                    return None;
                }
                page
            } else {
                return None;
            }
        }
    };
    Some(EncodingId(id))
}

/// Resolve the system encoding from a variable lookup.
///
/// The first non-empty variable of [`LOCALE_VARIABLES`] decides; an
/// unrecognized codeset means UTF-8.
pub fn system_encoding_id_from(lookup: impl Fn(&str) -> Option<String>) -> EncodingId {
    let locale = LOCALE_VARIABLES
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.is_empty());

    match locale {
        Some(locale) => encoding_id_for_locale(&locale).unwrap_or_else(|| {
            tracing::debug!(%locale, "unrecognized locale codeset, assuming UTF-8");
            EncodingId::UTF8
        }),
        None => EncodingId::UTF8,
    }
}

/// The encoding id of the current process locale
pub fn system_encoding_id() -> EncodingId {
    system_encoding_id_from(|name| std::env::var(name).ok())
}

/// Build a catalog from [`candidates`] with [`system_encoding_id`] as default
///
/// # Errors
///
/// Propagates registration failures from the catalog builder.
pub fn default_catalog() -> Result<EncodingCatalog> {
    let mut builder = EncodingCatalog::builder(system_encoding_id());
    builder.register_all(candidates())?;
    builder.build()
}
