//! `vcdec`: a VCDIFF (RFC 3284) delta decoder.
//!
//! A delta expresses a *target* byte stream as edits against a *source*
//! byte stream: copies out of the source, copies into the target being
//! built, literal inserts, and byte runs. This crate decodes such deltas
//! and can pretty-parse them for inspection; it does not produce them.
//!
//! The decoder is a pure function over byte slices. It never panics on
//! malformed input, holds no shared state, and does not mutate the
//! source, so one [`Decoder`] may be used from many threads.
//!
//! # Quick start
//!
//! ```
//! // A delta with a single window that ADDs eleven literal bytes.
//! let delta = [
//!     0xD6, 0xC3, 0xC4, 0x00, 0x00, // magic, version, header indicator
//!     0x00, 0x12, 0x0B, 0x00, 0x0B, 0x02, 0x00, // window preamble
//!     b'h', b'e', b'l', b'l', b'o', b' ', b'r', b'u', b's', b't', b'!',
//!     0x01, 0x0B, // ADD, size 11
//! ];
//! let target = vcdec::decode(b"", &delta)?;
//! assert_eq!(target, b"hello rust!");
//! # Ok::<(), vcdec::DecodeError>(())
//! ```
//!
//! Supported profile: the RFC 3284 baseline plus the Adler-32 per-window
//! checksum extension. Secondary compression, custom code tables,
//! application headers, and VCD_TARGET windows are rejected as
//! unsupported.

pub mod address_cache;
pub mod adler32;
pub mod code_table;
pub mod decoder;
pub mod error;
pub mod header;
pub mod varint;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod io;

pub use adler32::compute_adler32;
pub use decoder::{Decoder, Instruction, InstructionIterator, ParsedDelta, decode, parse_delta};
pub use error::DecodeError;
pub use header::{FileHeader, Window, parse_windows};
pub use varint::read_u32 as read_varint;
