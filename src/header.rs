// VCDIFF container parsing (RFC 3284, Sections 4.1-4.3).
//
// Validates the file header, then carves each window out of the delta.
// A window's fields past the delta-encoding length all live inside a
// subregion of exactly that many bytes, which must be consumed exactly.
// The three sections are borrowed from the delta buffer, never copied.

use crate::error::DecodeError;
use crate::varint::{self, VarIntError};

// ---------------------------------------------------------------------------
// Magic and indicator flags
// ---------------------------------------------------------------------------

pub const VCDIFF_MAGIC: [u8; 3] = [0xD6, 0xC3, 0xC4];
pub const VCDIFF_VERSION: u8 = 0x00;

// Header indicator (hdr_indicator) flags.
pub const VCD_DECOMPRESS: u8 = 1 << 0;
pub const VCD_CODETABLE: u8 = 1 << 1;
pub const VCD_APPHEADER: u8 = 1 << 2;
const VCD_INVHDR: u8 = !(VCD_DECOMPRESS | VCD_CODETABLE | VCD_APPHEADER);

// Window indicator (win_indicator) flags.
pub const VCD_SOURCE: u8 = 1 << 0;
pub const VCD_TARGET: u8 = 1 << 1;
pub const VCD_ADLER32: u8 = 1 << 2;
const VCD_INVWIN: u8 = !(VCD_SOURCE | VCD_TARGET | VCD_ADLER32);

/// Hard cap on a single window's declared target length (16 MiB).
/// Rejecting larger declarations bounds memory against hostile input.
pub const MAX_WINDOW_SIZE: u32 = 1 << 24;

// ---------------------------------------------------------------------------
// Parsed structures
// ---------------------------------------------------------------------------

/// Parsed file header. The magic and version are validated during
/// parsing; the indicator is recorded for inspection tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub indicator: u8,
}

/// One parsed window: header fields plus its three raw sections,
/// borrowed from the delta buffer.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    pub win_indicator: u8,
    /// Source segment length (zero unless VCD_SOURCE is set).
    pub source_segment_size: u32,
    /// Source segment position (zero unless VCD_SOURCE is set).
    pub source_segment_position: u32,
    /// Declared length of the delta-encoding region.
    pub delta_encoding_len: u32,
    /// Length the reconstructed target window must have.
    pub target_window_len: u32,
    pub delta_indicator: u8,
    /// Stored Adler-32 of the target window, when VCD_ADLER32 is set.
    pub checksum: Option<u32>,
    /// Literal bytes for ADD and RUN instructions.
    pub data: &'a [u8],
    /// Opcodes and explicit sizes.
    pub inst: &'a [u8],
    /// Encoded COPY addresses.
    pub addr: &'a [u8],
}

impl Window<'_> {
    #[inline]
    pub fn has_source(&self) -> bool {
        self.win_indicator & VCD_SOURCE != 0
    }

    #[inline]
    pub fn has_checksum(&self) -> bool {
        self.win_indicator & VCD_ADLER32 != 0
    }
}

// ---------------------------------------------------------------------------
// Slice reader
// ---------------------------------------------------------------------------

/// Cursor over a byte slice that reports absolute delta offsets, so
/// subregion readers produce the same offsets as the outer reader.
struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> SliceReader<'a> {
    fn new(buf: &'a [u8], base: usize) -> Self {
        Self { buf, pos: 0, base }
    }

    #[inline]
    fn offset(&self) -> usize {
        self.base + self.pos
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        match self.buf.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(DecodeError::UnexpectedEof {
                field,
                offset: self.offset(),
            }),
        }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                field,
                needed: n,
                available: self.remaining(),
                offset: self.offset(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_varint(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let at = self.offset();
        let (val, used) = varint::read_u32(&self.buf[self.pos..]).map_err(|e| match e {
            VarIntError::Underflow => DecodeError::UnexpectedEof { field, offset: at },
            VarIntError::Overflow => DecodeError::VarintOverflow { field, offset: at },
        })?;
        self.pos += used;
        Ok(val)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a complete delta into its file header and windows.
///
/// Sections inside each [`Window`] borrow from `delta`. Instructions are
/// not interpreted here; see the decoder for execution and
/// [`crate::decoder::parse_delta`] for a fully resolved view.
pub fn parse_windows(delta: &[u8]) -> Result<(FileHeader, Vec<Window<'_>>), DecodeError> {
    let mut r = SliceReader::new(delta, 0);
    let header = parse_file_header(&mut r)?;

    let mut windows = Vec::new();
    while r.remaining() > 0 {
        windows.push(parse_window(&mut r)?);
    }
    Ok((header, windows))
}

fn parse_file_header(r: &mut SliceReader<'_>) -> Result<FileHeader, DecodeError> {
    if r.remaining() < 3 {
        return Err(DecodeError::UnexpectedEof {
            field: "VCDIFF magic",
            offset: r.offset(),
        });
    }
    let magic = r.take(3, "VCDIFF magic")?;
    if magic != VCDIFF_MAGIC {
        return Err(DecodeError::BadMagic {
            found: [magic[0], magic[1], magic[2]],
        });
    }

    let version = r.read_u8("version")?;
    if version != VCDIFF_VERSION {
        return Err(DecodeError::UnsupportedVersion { version });
    }

    let at = r.offset();
    let indicator = r.read_u8("header indicator")?;
    if indicator & VCD_INVHDR != 0 {
        return Err(DecodeError::ReservedBits {
            field: "header indicator",
            value: indicator,
            offset: at,
        });
    }
    // The baseline profile recognizes the three flags but supports none
    // of them, so they are rejected as soon as their bits are read.
    if indicator & VCD_DECOMPRESS != 0 {
        return Err(DecodeError::Unsupported {
            feature: "VCD_DECOMPRESS (secondary compression)",
        });
    }
    if indicator & VCD_CODETABLE != 0 {
        return Err(DecodeError::Unsupported {
            feature: "VCD_CODETABLE (application-defined code table)",
        });
    }
    if indicator & VCD_APPHEADER != 0 {
        return Err(DecodeError::Unsupported {
            feature: "VCD_APPHEADER (application header)",
        });
    }

    Ok(FileHeader { indicator })
}

fn parse_window<'a>(r: &mut SliceReader<'a>) -> Result<Window<'a>, DecodeError> {
    let at = r.offset();
    let win_indicator = r.read_u8("window indicator")?;
    if win_indicator & VCD_INVWIN != 0 {
        return Err(DecodeError::ReservedBits {
            field: "window indicator",
            value: win_indicator,
            offset: at,
        });
    }
    if win_indicator & VCD_SOURCE != 0 && win_indicator & VCD_TARGET != 0 {
        return Err(DecodeError::MalformedWindow {
            reason: "VCD_SOURCE and VCD_TARGET are mutually exclusive",
            offset: at,
        });
    }
    if win_indicator & VCD_TARGET != 0 {
        return Err(DecodeError::Unsupported {
            feature: "VCD_TARGET windows",
        });
    }

    let (source_segment_size, source_segment_position) = if win_indicator & VCD_SOURCE != 0 {
        (
            r.read_varint("source segment size")?,
            r.read_varint("source segment position")?,
        )
    } else {
        (0, 0)
    };

    let delta_encoding_len = r.read_varint("delta encoding length")?;
    let region = r.take(delta_encoding_len as usize, "delta encoding")?;

    // Everything below reads from the carved-out region only.
    let mut sr = SliceReader::new(region, r.offset() - region.len());

    let target_window_len = sr.read_varint("target window length")?;
    if target_window_len > MAX_WINDOW_SIZE {
        return Err(DecodeError::OutOfBounds {
            what: "target window length",
            offset: 0,
            size: u64::from(target_window_len),
            limit: u64::from(MAX_WINDOW_SIZE),
        });
    }

    let delta_indicator = sr.read_u8("delta indicator")?;
    if delta_indicator != 0 {
        return Err(DecodeError::Unsupported {
            feature: "secondary-compressed sections (non-zero delta indicator)",
        });
    }

    let data_len = sr.read_varint("data section length")?;
    let inst_len = sr.read_varint("instructions section length")?;
    let addr_len = sr.read_varint("address section length")?;

    let checksum = if win_indicator & VCD_ADLER32 != 0 {
        let bytes = sr.take(4, "adler32 checksum")?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    } else {
        None
    };

    let data = sr.take(data_len as usize, "data section")?;
    let inst = sr.take(inst_len as usize, "instructions section")?;
    let addr = sr.take(addr_len as usize, "address section")?;

    if sr.remaining() != 0 {
        return Err(DecodeError::MalformedWindow {
            reason: "delta encoding region has trailing bytes",
            offset: sr.offset(),
        });
    }

    Ok(Window {
        win_indicator,
        source_segment_size,
        source_segment_position,
        delta_encoding_len,
        target_window_len,
        delta_indicator,
        checksum,
        data,
        inst,
        addr,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble a delta with one window around the given sections.
    fn one_window_delta(
        win_indicator: u8,
        source: Option<(u32, u32)>,
        target_len: u32,
        checksum: Option<u32>,
        data: &[u8],
        inst: &[u8],
        addr: &[u8],
    ) -> Vec<u8> {
        let mut out = VCDIFF_MAGIC.to_vec();
        out.push(VCDIFF_VERSION);
        out.push(0x00); // header indicator

        out.push(win_indicator);
        if let Some((size, pos)) = source {
            varint::push_u32(&mut out, size);
            varint::push_u32(&mut out, pos);
        }

        let mut region = Vec::new();
        varint::push_u32(&mut region, target_len);
        region.push(0x00); // delta indicator
        varint::push_u32(&mut region, data.len() as u32);
        varint::push_u32(&mut region, inst.len() as u32);
        varint::push_u32(&mut region, addr.len() as u32);
        if let Some(ck) = checksum {
            region.extend_from_slice(&ck.to_be_bytes());
        }
        region.extend_from_slice(data);
        region.extend_from_slice(inst);
        region.extend_from_slice(addr);

        varint::push_u32(&mut out, region.len() as u32);
        out.extend_from_slice(&region);
        out
    }

    #[test]
    fn header_only_delta_has_no_windows() {
        let (header, windows) = parse_windows(&[0xD6, 0xC3, 0xC4, 0x00, 0x00]).unwrap();
        assert_eq!(header.indicator, 0);
        assert!(windows.is_empty());
    }

    #[test]
    fn window_fields_and_sections_are_extracted() {
        let delta = one_window_delta(
            VCD_SOURCE,
            Some((16, 4)),
            10,
            None,
            b"lit",
            &[0x02, 0x14],
            &[0x00],
        );
        let (_, windows) = parse_windows(&delta).unwrap();
        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert!(w.has_source());
        assert!(!w.has_checksum());
        assert_eq!(w.source_segment_size, 16);
        assert_eq!(w.source_segment_position, 4);
        assert_eq!(w.target_window_len, 10);
        assert_eq!(w.data, b"lit");
        assert_eq!(w.inst, &[0x02, 0x14]);
        assert_eq!(w.addr, &[0x00]);
    }

    #[test]
    fn checksum_is_big_endian() {
        let delta = one_window_delta(VCD_ADLER32, None, 0, Some(0xAABBCCDD), b"", b"", b"");
        let (_, windows) = parse_windows(&delta).unwrap();
        assert_eq!(windows[0].checksum, Some(0xAABBCCDD));
    }

    #[test]
    fn truncated_magic() {
        let err = parse_windows(&[0xD6, 0xC3]).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn wrong_magic() {
        let err = parse_windows(&[0xFF, 0xC3, 0xC4, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadMagic {
                found: [0xFF, 0xC3, 0xC4]
            }
        );
    }

    #[test]
    fn wrong_version() {
        let err = parse_windows(&[0xD6, 0xC3, 0xC4, 0x99, 0x00]).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedVersion { version: 0x99 });
    }

    #[test]
    fn reserved_header_bits() {
        let err = parse_windows(&[0xD6, 0xC3, 0xC4, 0x00, 0x80]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ReservedBits {
                field: "header indicator",
                value: 0x80,
                offset: 4
            }
        ));
    }

    #[test]
    fn recognized_header_flags_are_unsupported() {
        for flag in [VCD_DECOMPRESS, VCD_CODETABLE, VCD_APPHEADER] {
            let err = parse_windows(&[0xD6, 0xC3, 0xC4, 0x00, flag]).unwrap_err();
            assert!(matches!(err, DecodeError::Unsupported { .. }), "flag {flag}");
        }
    }

    #[test]
    fn reserved_window_bits() {
        let err = parse_windows(&[0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x08]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ReservedBits {
                field: "window indicator",
                ..
            }
        ));
    }

    #[test]
    fn source_and_target_are_mutually_exclusive() {
        let err = parse_windows(&[0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x03]).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedWindow { .. }));
    }

    #[test]
    fn target_windows_are_unsupported() {
        let err = parse_windows(&[0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x02]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Unsupported {
                feature: "VCD_TARGET windows"
            }
        );
    }

    #[test]
    fn varint_overflow_in_window_preamble() {
        let mut delta = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x00];
        delta.extend_from_slice(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]);
        let err = parse_windows(&delta).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::VarintOverflow {
                field: "delta encoding length",
                offset: 6
            }
        ));
    }

    #[test]
    fn region_longer_than_input_is_truncated() {
        // Window declares a 100-byte delta encoding but only 2 bytes follow.
        let delta = [0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x00, 0x64, 0x01, 0x02];
        let err = parse_windows(&delta).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                field: "delta encoding",
                needed: 100,
                ..
            }
        ));
    }

    #[test]
    fn region_with_trailing_bytes_is_malformed() {
        let mut delta = one_window_delta(0, None, 0, None, b"", b"", b"");
        // Grow the declared region by one byte and append a stray byte
        // inside it.
        let enc_len_at = 6;
        delta[enc_len_at] += 1;
        delta.push(0xEE);
        let err = parse_windows(&delta).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MalformedWindow {
                reason: "delta encoding region has trailing bytes",
                ..
            }
        ));
    }

    #[test]
    fn section_overrunning_region_is_truncated() {
        // data_len claims 8 bytes but the region only carries 3.
        let mut out = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x00];
        let region = [0x00, 0x00, 0x08, 0x00, 0x00, b'a', b'b', b'c'];
        varint::push_u32(&mut out, region.len() as u32);
        out.extend_from_slice(&region);
        let err = parse_windows(&out).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                field: "data section",
                needed: 8,
                available: 3,
                ..
            }
        ));
    }

    #[test]
    fn nonzero_delta_indicator_is_unsupported() {
        let mut out = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x00];
        let region = [0x00, 0x01, 0x00, 0x00, 0x00];
        varint::push_u32(&mut out, region.len() as u32);
        out.extend_from_slice(&region);
        let err = parse_windows(&out).unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported { .. }));
    }

    #[test]
    fn oversized_target_window_is_rejected() {
        let delta = one_window_delta(0, None, MAX_WINDOW_SIZE + 1, None, b"", b"", b"");
        let err = parse_windows(&delta).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::OutOfBounds {
                what: "target window length",
                ..
            }
        ));
    }

    #[test]
    fn offsets_are_absolute_inside_subregions() {
        // Second field of the region (delta indicator) is missing; the
        // reported offset must point into the delta, not the region.
        let mut out = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00, 0x00];
        varint::push_u32(&mut out, 1); // region of 1 byte
        out.push(0x00); // target window length, then EOF inside region
        let err = parse_windows(&out).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedEof {
                field: "delta indicator",
                offset: 8,
            }
        );
    }
}
