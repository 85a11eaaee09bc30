//! # MultiEncode CLI - Code Page Conversion Tool
//!
//! Command-line front end over the encoding catalog: list encodings, probe
//! single code points or byte sequences, and convert whole files.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::Level;

use multi_encode::{
    EncodingCatalog, EncodingConverter, EncodingDescriptor, EncodingFamily, EncodingId,
    EncodingInfo, Translator, host,
};

/// MultiEncode: convert text between Unicode and legacy code pages
#[derive(Parser)]
#[command(name = "multi-encode")]
#[command(version, long_about = None)]
#[command(author = "MultiEncode Contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Fail on unknown encodings instead of using the system default
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a file between encodings
    Convert(ConvertArgs),

    /// List all registered encodings
    List(ListArgs),

    /// Display information about an encoding
    Info(InfoArgs),

    /// Encode code points to bytes
    Encode(EncodeArgs),

    /// Decode a hex byte string to code points
    Decode(DecodeArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Source encoding (name or id)
    #[arg(short = 'f', long = "from")]
    from: String,

    /// Target encoding (name or id)
    #[arg(short = 't', long = "to")]
    to: String,

    /// Input file (stdin if not specified)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Convert in-place (overwrite input file)
    #[arg(long, conflicts_with = "output")]
    in_place: bool,

    /// Replace unconvertible characters instead of failing
    #[arg(long)]
    lossy: bool,

    /// Replacement character for lossy conversion
    #[arg(long, default_value = "?")]
    replacement: char,

    /// Strip a byte order mark from the input
    #[arg(long)]
    strip_bom: bool,

    /// Add a byte order mark to the output
    #[arg(long)]
    add_bom: bool,
}

#[derive(Args)]
struct ListArgs {
    /// Only show one family (single-byte, double-byte, utf-8, utf-16le, ...)
    #[arg(long, value_parser = parse_family)]
    family: Option<EncodingFamily>,
}

#[derive(Args)]
struct InfoArgs {
    /// Encoding to describe (name or id)
    encoding: String,
}

#[derive(Args)]
struct EncodeArgs {
    /// Encoding (name or id)
    encoding: String,

    /// Code points as U+XXXX, 0xXXXX or decimal
    #[arg(required = true, value_parser = parse_codepoint)]
    codepoints: Vec<u32>,
}

#[derive(Args)]
struct DecodeArgs {
    /// Encoding (name or id)
    encoding: String,

    /// Bytes as hex digits, optionally separated by spaces
    hex: Vec<String>,
}

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ConversionResult {
    from: String,
    to: String,
    bytes_processed: usize,
    bytes_written: usize,
    lossy: bool,
    processing_time_ms: u64,
}

#[derive(Serialize)]
struct EncodingDetails {
    #[serde(flatten)]
    info: EncodingInfo,
    system_default: bool,
    max_bytes_per_char: usize,
    bom: Option<String>,
}

#[derive(Serialize)]
struct EncodedCodepoint {
    codepoint: String,
    bytes: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct DecodedSequence {
    offset: usize,
    bytes: String,
    codepoint: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let catalog = host::default_catalog().context("Failed to build encoding catalog")?;

    match cli.command {
        Commands::Convert(ref args) => convert_command(args, &cli, &catalog)?,
        Commands::List(ref args) => list_command(args, &cli, &catalog)?,
        Commands::Info(ref args) => info_command(args, &cli, &catalog)?,
        Commands::Encode(ref args) => encode_command(args, &cli, &catalog)?,
        Commands::Decode(ref args) => decode_command(args, &cli, &catalog)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn parse_family(s: &str) -> std::result::Result<EncodingFamily, String> {
    EncodingFamily::from_name(s).ok_or_else(|| {
        let known: Vec<_> = EncodingFamily::ALL.iter().map(|f| f.name()).collect();
        format!("unknown family '{}' (expected one of: {})", s, known.join(", "))
    })
}

fn parse_codepoint(s: &str) -> std::result::Result<u32, String> {
    let parsed = if let Some(hex) = s.strip_prefix("U+").or_else(|| s.strip_prefix("u+")) {
        u32::from_str_radix(hex, 16)
    } else if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid code point '{}': {}", s, e))
}

fn parse_hex(parts: &[String]) -> Result<Vec<u8>> {
    let digits: String = parts
        .iter()
        .flat_map(|part| part.chars())
        .filter(|c| !c.is_whitespace())
        .collect();
    anyhow::ensure!(
        digits.chars().all(|c| c.is_ascii_hexdigit()),
        "Hex input contains non-hex characters: {}",
        digits
    );
    anyhow::ensure!(
        digits.len() % 2 == 0,
        "Hex input has an odd number of digits: {}",
        digits
    );

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("Invalid hex byte '{}'", &digits[i..i + 2]))
        })
        .collect()
}

fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a name or numeric id against the catalog
fn resolve<'a>(
    catalog: &'a EncodingCatalog,
    requested: &str,
    strict: bool,
) -> Result<&'a EncodingDescriptor> {
    let descriptor = match requested.parse::<u32>() {
        Ok(id) if strict => catalog.lookup_by_id(EncodingId(id))?,
        Ok(id) => catalog.find_by_id(EncodingId(id)),
        Err(_) if strict => catalog.lookup_by_name(requested)?,
        Err(_) => catalog.find_by_name(requested),
    };
    tracing::debug!(%requested, resolved = %descriptor.name(), "resolved encoding");
    Ok(descriptor)
}

fn read_input(input: Option<&PathBuf>) -> Result<Vec<u8>> {
    match input {
        Some(path) => {
            tracing::debug!(path = %path.display(), "reading input file");
            fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

fn convert_command(args: &ConvertArgs, cli: &Cli, catalog: &EncodingCatalog) -> Result<()> {
    let start_time = Instant::now();

    let from = resolve(catalog, &args.from, cli.strict)?;
    let to = resolve(catalog, &args.to, cli.strict)?;
    tracing::debug!(from = %from.name(), to = %to.name(), "converting");

    if args.in_place && args.input.is_none() {
        anyhow::bail!("Cannot use --in-place without input file");
    }

    let input_data = read_input(args.input.as_ref())?;
    let mut source: &[u8] = &input_data;

    if args.strip_bom
        && let Some(bom) = from.family().bom()
        && let Some(rest) = source.strip_prefix(bom)
    {
        tracing::debug!(len = bom.len(), "stripped BOM");
        source = rest;
    }

    let translator = Translator::new(from, to);
    let converted = if args.lossy {
        translator.convert_lossy(source, u32::from(args.replacement))
    } else {
        translator
            .convert(source)
            .with_context(|| format!("Conversion from {} to {} failed", from.name(), to.name()))?
    };

    let mut output_data = Vec::with_capacity(converted.len() + 4);
    if args.add_bom
        && let Some(bom) = to.family().bom()
    {
        output_data.extend_from_slice(bom);
    }
    output_data.extend_from_slice(&converted);

    let destination = if args.in_place {
        args.input.as_ref()
    } else {
        args.output.as_ref()
    };
    match destination {
        Some(path) => {
            fs::write(path, &output_data)
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "wrote output");
        }
        None => io::stdout()
            .write_all(&output_data)
            .context("Failed to write to stdout")?,
    }

    let processing_time = start_time.elapsed();
    tracing::debug!(
        input = input_data.len(),
        output = output_data.len(),
        elapsed = ?processing_time,
        "conversion finished"
    );

    if let OutputFormat::Json = cli.format {
        let result = ConversionResult {
            from: from.name().to_string(),
            to: to.name().to_string(),
            bytes_processed: input_data.len(),
            bytes_written: output_data.len(),
            lossy: args.lossy,
            processing_time_ms: processing_time.as_millis() as u64,
        };
        // Keep stdout clean when it carries the converted bytes
        let summary = serde_json::to_string_pretty(&result)?;
        if destination.is_some() {
            println!("{}", summary);
        } else {
            eprintln!("{}", summary);
        }
    }

    Ok(())
}

fn list_command(args: &ListArgs, cli: &Cli, catalog: &EncodingCatalog) -> Result<()> {
    let infos: Vec<EncodingInfo> = catalog
        .iter()
        .filter(|d| args.family.is_none_or(|family| d.family() == family))
        .map(EncodingInfo::from)
        .collect();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&infos)?),
        OutputFormat::Text => {
            let default_id = catalog.system_default().id();
            println!("Registered Encodings ({} total):", infos.len());
            println!();
            for info in &infos {
                let marker = if info.id == default_id { "*" } else { " " };
                println!(
                    "{} {:>6} {:15} {:13} {}",
                    marker,
                    info.id,
                    info.name,
                    format!("[{}]", info.family),
                    info.description
                );
            }
        }
    }

    Ok(())
}

fn info_command(args: &InfoArgs, cli: &Cli, catalog: &EncodingCatalog) -> Result<()> {
    let descriptor = resolve(catalog, &args.encoding, cli.strict)?;
    let family = descriptor.family();
    let details = EncodingDetails {
        info: EncodingInfo::from(descriptor),
        system_default: descriptor.id() == catalog.system_default().id(),
        max_bytes_per_char: family.max_bytes_per_char(),
        bom: family.bom().map(hex_string),
    };

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&details)?),
        OutputFormat::Text => {
            println!("Encoding Information: {}", details.info.name);
            println!("Id: {}", details.info.id);
            println!("Description: {}", details.info.description);
            println!("Family: {}", details.info.family);
            println!("Font: {}", details.info.font);
            println!("Max Bytes Per Char: {}", details.max_bytes_per_char);
            println!("BOM: {}", details.bom.as_deref().unwrap_or("None"));
            println!(
                "System Default: {}",
                if details.system_default { "Yes" } else { "No" }
            );
        }
    }

    Ok(())
}

fn encode_command(args: &EncodeArgs, cli: &Cli, catalog: &EncodingCatalog) -> Result<()> {
    let descriptor = resolve(catalog, &args.encoding, cli.strict)?;
    let converter = EncodingConverter::new(descriptor);

    let results: Vec<EncodedCodepoint> = args
        .codepoints
        .iter()
        .map(|&codepoint| {
            let (bytes, error) = match converter.try_encode(codepoint) {
                Ok(bytes) => (Some(hex_string(&bytes)), None),
                Err(e) => (None, Some(e.to_string())),
            };
            EncodedCodepoint {
                codepoint: format!("U+{:04X}", codepoint),
                bytes,
                error,
            }
        })
        .collect();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            for result in &results {
                match (&result.bytes, &result.error) {
                    (Some(bytes), _) => println!("{:10} {}", result.codepoint, bytes),
                    (None, Some(error)) => println!("{:10} ✗ {}", result.codepoint, error),
                    (None, None) => println!("{:10} ✗", result.codepoint),
                }
            }
        }
    }

    let failed = results.iter().filter(|r| r.bytes.is_none()).count();
    anyhow::ensure!(
        failed == 0,
        "{} code point(s) could not be encoded in {}",
        failed,
        descriptor.name()
    );
    Ok(())
}

fn decode_command(args: &DecodeArgs, cli: &Cli, catalog: &EncodingCatalog) -> Result<()> {
    let descriptor = resolve(catalog, &args.encoding, cli.strict)?;
    let converter = EncodingConverter::new(descriptor);
    let bytes = parse_hex(&args.hex)?;

    let mut sequences = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let (len, codepoint) = match converter.try_decode(rest) {
            Ok((codepoint, len)) => (len, Some(format!("U+{:04X}", codepoint))),
            Err(multi_encode::Error::UnmappableByteSequence { bytes: rejected })
                if !rejected.is_empty() =>
            {
                (rejected.len(), None)
            }
            Err(_) => (rest.len(), None),
        };
        sequences.push(DecodedSequence {
            offset,
            bytes: hex_string(&rest[..len]),
            codepoint,
        });
        offset += len;
    }

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sequences)?),
        OutputFormat::Text => {
            for sequence in &sequences {
                println!(
                    "{:>4}  {:12} {}",
                    sequence.offset,
                    sequence.bytes,
                    sequence.codepoint.as_deref().unwrap_or("✗ unmappable")
                );
            }
        }
    }

    let failed = sequences.iter().filter(|s| s.codepoint.is_none()).count();
    anyhow::ensure!(
        failed == 0,
        "{} byte sequence(s) could not be decoded from {}",
        failed,
        descriptor.name()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codepoint_forms() {
        assert_eq!(parse_codepoint("U+20AC"), Ok(0x20AC));
        assert_eq!(parse_codepoint("u+1f600"), Ok(0x1F600));
        assert_eq!(parse_codepoint("0x41"), Ok(0x41));
        assert_eq!(parse_codepoint("65"), Ok(65));
        assert!(parse_codepoint("U+XYZ").is_err());
    }

    #[test]
    fn test_parse_hex() {
        let parts = vec!["93 FA".to_string(), "967b".to_string()];
        assert_eq!(parse_hex(&parts).unwrap(), vec![0x93, 0xFA, 0x96, 0x7B]);
        assert!(parse_hex(&["ABC".to_string()]).is_err());
        assert!(parse_hex(&["ZZ".to_string()]).is_err());
    }

    #[test]
    fn test_parse_family() {
        assert_eq!(parse_family("double-byte"), Ok(EncodingFamily::DoubleByte));
        assert!(parse_family("utf-7").is_err());
    }
}
