// Decode failure taxonomy.
//
// Every way a delta can fail to decode maps to exactly one variant.
// Messages carry the byte offset within the delta or the logical field
// name, so malformed inputs can be diagnosed without a hex editor.
// Failures are never recovered internally: any error aborts the whole
// decode and partial output is discarded.

use std::fmt;

/// Error returned by the decoder and the structural parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The first three bytes are not `D6 C3 C4`.
    BadMagic { found: [u8; 3] },
    /// The version byte is not zero.
    UnsupportedVersion { version: u8 },
    /// A header or window indicator has reserved bits set.
    ReservedBits {
        field: &'static str,
        value: u8,
        offset: usize,
    },
    /// The delta requires a capability this decoder does not provide
    /// (secondary compression, custom code tables, application headers,
    /// or VCD_TARGET windows).
    Unsupported { feature: &'static str },
    /// Input ran out in the middle of a field.
    UnexpectedEof { field: &'static str, offset: usize },
    /// A varint continuation bit was still set after five bytes.
    VarintOverflow { field: &'static str, offset: usize },
    /// A declared length exceeds the bytes actually available.
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
        offset: usize,
    },
    /// A window's delta-encoding region was not consumed exactly.
    MalformedWindow {
        reason: &'static str,
        offset: usize,
    },
    /// A single COPY straddles the source/target boundary.
    SpanningCopy {
        addr: u64,
        size: u32,
        source_len: u64,
    },
    /// An instruction reads outside its section, the source segment,
    /// or the target decoded so far.
    OutOfBounds {
        what: &'static str,
        offset: u64,
        size: u64,
        limit: u64,
    },
    /// A COPY address mode outside the nine defined modes.
    InvalidMode { mode: u8 },
    /// A COPY address could not be resolved.
    InvalidAddress { reason: &'static str, value: u64 },
    /// The reconstructed window disagrees with its declared length.
    LengthMismatch { expected: u32, actual: usize },
    /// The stored Adler-32 disagrees with the reconstructed window.
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BadMagic { found } => write!(
                f,
                "invalid VCDIFF magic: expected D6 C3 C4, got {:02X} {:02X} {:02X}",
                found[0], found[1], found[2]
            ),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported VCDIFF version {version:#04X}")
            }
            Self::ReservedBits {
                field,
                value,
                offset,
            } => write!(
                f,
                "reserved bits set in {field} at offset {offset}: {value:#04X}"
            ),
            Self::Unsupported { feature } => write!(f, "unsupported: {feature}"),
            Self::UnexpectedEof { field, offset } => write!(
                f,
                "unexpected end of input while reading {field} at offset {offset}"
            ),
            Self::VarintOverflow { field, offset } => write!(
                f,
                "varint for {field} at offset {offset} exceeds the 5-byte maximum"
            ),
            Self::Truncated {
                field,
                needed,
                available,
                offset,
            } => write!(
                f,
                "{field} at offset {offset} declares {needed} bytes but only {available} remain"
            ),
            Self::MalformedWindow { reason, offset } => {
                write!(f, "malformed window at offset {offset}: {reason}")
            }
            Self::SpanningCopy {
                addr,
                size,
                source_len,
            } => write!(
                f,
                "COPY range [{addr}, {addr}+{size}) straddles the source/target boundary at {source_len}"
            ),
            Self::OutOfBounds {
                what,
                offset,
                size,
                limit,
            } => write!(
                f,
                "{what}: range [{offset}, {offset}+{size}) exceeds limit {limit}"
            ),
            Self::InvalidMode { mode } => {
                write!(f, "invalid COPY address mode {mode}: valid modes are 0-8")
            }
            Self::InvalidAddress { reason, value } => {
                write!(f, "invalid COPY address: {reason} ({value})")
            }
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "target window length mismatch: declared {expected}, reconstructed {actual}"
            ),
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch: expected {expected:#010X}, got {actual:#010X}"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}
