// Instruction execution and the public decode surface.
//
// A window decodes by walking its instruction section under the default
// code table: ADD and RUN pull literal bytes from the data section, COPY
// resolves an address through the per-window cache and reads either the
// source segment or the target produced so far. Target self-copies may
// overlap the write position; reads observe bytes appended by the same
// instruction, which is what makes run-length expansion work.

use crate::address_cache::{AddressCache, AddressCacheError};
use crate::adler32::compute_adler32;
use crate::code_table::{self, InstKind};
use crate::error::DecodeError;
use crate::header::{self, FileHeader, Window};
use crate::varint::{self, VarIntError};

// ---------------------------------------------------------------------------
// One-shot and reusable entry points
// ---------------------------------------------------------------------------

/// Apply `delta` to `source`, returning the reconstructed target.
pub fn decode(source: &[u8], delta: &[u8]) -> Result<Vec<u8>, DecodeError> {
    Decoder::new(source).decode(delta)
}

/// Reusable decoder over one source buffer.
///
/// The source is borrowed and never mutated, so a single `Decoder` can
/// apply any number of deltas, from any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'s> {
    source: &'s [u8],
}

impl<'s> Decoder<'s> {
    pub fn new(source: &'s [u8]) -> Self {
        Self { source }
    }

    /// The borrowed source buffer.
    pub fn source(&self) -> &'s [u8] {
        self.source
    }

    /// Apply one delta, concatenating every window's target.
    pub fn decode(&self, delta: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let (_, windows) = header::parse_windows(delta)?;
        let mut output = Vec::new();
        for window in &windows {
            decode_window_into(window, self.source, &mut output)?;
        }
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Window execution
// ---------------------------------------------------------------------------

/// Decode one window, appending its target to `output`.
///
/// Self-copy addresses are window-relative, so the window's bytes start
/// at `output.len()` on entry and that base offsets every target read.
pub(crate) fn decode_window_into(
    window: &Window<'_>,
    source: &[u8],
    output: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    let source_segment: &[u8] = if window.has_source() {
        let start = window.source_segment_position as usize;
        let len = window.source_segment_size as usize;
        match start.checked_add(len) {
            Some(end) if end <= source.len() => &source[start..end],
            _ => {
                return Err(DecodeError::OutOfBounds {
                    what: "source segment",
                    offset: start as u64,
                    size: len as u64,
                    limit: source.len() as u64,
                });
            }
        }
    } else {
        &[]
    };
    let src_len = source_segment.len() as u64;

    let base = output.len();
    let target_len = window.target_window_len as usize;
    output.reserve(target_len);

    let table = code_table::default_code_table();
    let mut cache = AddressCache::new(window.addr);
    let data = window.data;
    let inst = window.inst;
    let mut data_pos = 0usize;
    let mut inst_pos = 0usize;

    while inst_pos < inst.len() {
        let op = inst[inst_pos];
        inst_pos += 1;

        for (kind, table_size, mode) in table[op as usize].slots() {
            if kind == InstKind::NoOp {
                continue;
            }

            let size = if table_size == 0 {
                read_size(inst, &mut inst_pos)?
            } else {
                u32::from(table_size)
            };

            // The window may not grow past its declared length; checking
            // up front also bounds memory against hostile sizes.
            let written = output.len() - base;
            if size as usize > target_len - written {
                return Err(DecodeError::LengthMismatch {
                    expected: window.target_window_len,
                    actual: written.saturating_add(size as usize),
                });
            }

            match kind {
                InstKind::Add => {
                    let n = size as usize;
                    match data_pos.checked_add(n) {
                        Some(end) if end <= data.len() => {
                            output.extend_from_slice(&data[data_pos..end]);
                            data_pos = end;
                        }
                        _ => {
                            return Err(DecodeError::OutOfBounds {
                                what: "ADD data",
                                offset: data_pos as u64,
                                size: u64::from(size),
                                limit: data.len() as u64,
                            });
                        }
                    }
                }
                InstKind::Run => {
                    let Some(&byte) = data.get(data_pos) else {
                        return Err(DecodeError::OutOfBounds {
                            what: "RUN data",
                            offset: data_pos as u64,
                            size: 1,
                            limit: data.len() as u64,
                        });
                    };
                    data_pos += 1;
                    output.resize(output.len() + size as usize, byte);
                }
                InstKind::Copy => {
                    let here = src_len + (output.len() - base) as u64;
                    let addr = match cache.decode(here, mode) {
                        Ok(addr) => addr,
                        Err(e) => return Err(cache_error(e, cache.consumed())),
                    };
                    copy_into(output, base, source_segment, src_len, addr, size)?;
                }
                InstKind::NoOp => unreachable!(),
            }
        }
    }

    let written = output.len() - base;
    if written != target_len {
        return Err(DecodeError::LengthMismatch {
            expected: window.target_window_len,
            actual: written,
        });
    }

    if let Some(expected) = window.checksum {
        let actual = compute_adler32(1, &output[base..]);
        if actual != expected {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }
    }

    Ok(())
}

fn read_size(inst: &[u8], inst_pos: &mut usize) -> Result<u32, DecodeError> {
    let at = *inst_pos;
    let (val, used) = varint::read_u32(&inst[at..]).map_err(|e| match e {
        VarIntError::Underflow => DecodeError::UnexpectedEof {
            field: "instruction size",
            offset: at,
        },
        VarIntError::Overflow => DecodeError::VarintOverflow {
            field: "instruction size",
            offset: at,
        },
    })?;
    *inst_pos = at + used;
    Ok(val)
}

/// Execute one COPY against the concatenated source+target address space.
fn copy_into(
    output: &mut Vec<u8>,
    base: usize,
    source_segment: &[u8],
    src_len: u64,
    addr: u64,
    size: u32,
) -> Result<(), DecodeError> {
    let size_usize = size as usize;

    if addr + u64::from(size) <= src_len {
        // Entirely inside the source segment.
        let start = addr as usize;
        output.extend_from_slice(&source_segment[start..start + size_usize]);
    } else if addr >= src_len {
        // Entirely inside the target window produced so far.
        let t = addr - src_len;
        let written = output.len() - base;
        if t >= written as u64 {
            return Err(DecodeError::OutOfBounds {
                what: "COPY target",
                offset: t,
                size: u64::from(size),
                limit: written as u64,
            });
        }
        let abs = base + t as usize;
        if abs + size_usize <= output.len() {
            output.extend_from_within(abs..abs + size_usize);
        } else {
            // Overlaps the write position: copy byte-at-a-time so each
            // read observes bytes this same instruction appended.
            for i in 0..size_usize {
                let byte = output[abs + i];
                output.push(byte);
            }
        }
    } else {
        return Err(DecodeError::SpanningCopy {
            addr,
            size,
            source_len: src_len,
        });
    }

    Ok(())
}

fn cache_error(e: AddressCacheError, consumed: usize) -> DecodeError {
    match e {
        AddressCacheError::SectionUnderflow => DecodeError::UnexpectedEof {
            field: "COPY address",
            offset: consumed,
        },
        AddressCacheError::VarintOverflow => DecodeError::VarintOverflow {
            field: "COPY address",
            offset: consumed,
        },
        AddressCacheError::InvalidMode { mode } => DecodeError::InvalidMode { mode },
        AddressCacheError::HereUnderflow { offset, .. } => DecodeError::InvalidAddress {
            reason: "HERE offset exceeds current position",
            value: offset,
        },
        AddressCacheError::DeadNearSlot { slot } => DecodeError::InvalidAddress {
            reason: "near cache slot never populated",
            value: u64::from(slot),
        },
        AddressCacheError::AddressOverflow { base, .. } => DecodeError::InvalidAddress {
            reason: "near-relative address overflows the address space",
            value: base,
        },
    }
}

// ---------------------------------------------------------------------------
// Structural parsing: resolved instructions without producing a target
// ---------------------------------------------------------------------------

/// One resolved instruction.
///
/// ADD and RUN own their payload bytes, sliced out of the window's data
/// section; COPY carries its resolved absolute address in the
/// concatenated source+target space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Add { data: Vec<u8> },
    Run { len: u32, byte: u8 },
    Copy { len: u32, addr: u64, mode: u8 },
}

impl Instruction {
    /// Number of target bytes this instruction produces.
    pub fn size(&self) -> u32 {
        match self {
            Instruction::Add { data } => data.len() as u32,
            Instruction::Run { len, .. } | Instruction::Copy { len, .. } => *len,
        }
    }
}

/// Walks one window's instruction stream, resolving sizes, payloads,
/// and COPY addresses exactly as the executor would, without building
/// the target. Fuses after the first error.
pub struct InstructionIterator<'a> {
    data: &'a [u8],
    inst: &'a [u8],
    data_pos: usize,
    inst_pos: usize,
    cache: AddressCache<'a>,
    source_len: u64,
    target_pos: u64,
    /// Buffered second half of a double opcode.
    pending: Option<(InstKind, u8, u8)>,
    failed: bool,
}

impl<'a> InstructionIterator<'a> {
    pub fn new(window: &Window<'a>) -> Self {
        let source_len = if window.has_source() {
            u64::from(window.source_segment_size)
        } else {
            0
        };
        Self {
            data: window.data,
            inst: window.inst,
            data_pos: 0,
            inst_pos: 0,
            cache: AddressCache::new(window.addr),
            source_len,
            target_pos: 0,
            pending: None,
            failed: false,
        }
    }

    fn resolve(&mut self, kind: InstKind, table_size: u8, mode: u8) -> Result<Instruction, DecodeError> {
        let size = if table_size == 0 {
            read_size(self.inst, &mut self.inst_pos)?
        } else {
            u32::from(table_size)
        };

        let inst = match kind {
            InstKind::Add => {
                let n = size as usize;
                match self.data_pos.checked_add(n) {
                    Some(end) if end <= self.data.len() => {
                        let data = self.data[self.data_pos..end].to_vec();
                        self.data_pos = end;
                        Instruction::Add { data }
                    }
                    _ => {
                        return Err(DecodeError::OutOfBounds {
                            what: "ADD data",
                            offset: self.data_pos as u64,
                            size: u64::from(size),
                            limit: self.data.len() as u64,
                        });
                    }
                }
            }
            InstKind::Run => {
                let Some(&byte) = self.data.get(self.data_pos) else {
                    return Err(DecodeError::OutOfBounds {
                        what: "RUN data",
                        offset: self.data_pos as u64,
                        size: 1,
                        limit: self.data.len() as u64,
                    });
                };
                self.data_pos += 1;
                Instruction::Run { len: size, byte }
            }
            InstKind::Copy => {
                let here = self.source_len + self.target_pos;
                let addr = match self.cache.decode(here, mode) {
                    Ok(addr) => addr,
                    Err(e) => return Err(cache_error(e, self.cache.consumed())),
                };
                Instruction::Copy {
                    len: size,
                    addr,
                    mode,
                }
            }
            InstKind::NoOp => unreachable!("NoOp slots are filtered before resolve"),
        };

        self.target_pos += u64::from(size);
        Ok(inst)
    }
}

impl Iterator for InstructionIterator<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if let Some((kind, size, mode)) = self.pending.take() {
            let result = self.resolve(kind, size, mode);
            self.failed = result.is_err();
            return Some(result);
        }

        if self.inst_pos >= self.inst.len() {
            return None;
        }

        let op = self.inst[self.inst_pos];
        self.inst_pos += 1;
        let entry = &code_table::default_code_table()[op as usize];

        if entry.kind2 != InstKind::NoOp {
            self.pending = Some((entry.kind2, entry.size2, entry.mode2));
        }

        let result = self.resolve(entry.kind1, entry.size1, entry.mode1);
        self.failed = result.is_err();
        Some(result)
    }
}

/// Structural view of a delta: the header, every window with its raw
/// sections, and the resolved instructions of all windows in order.
#[derive(Debug, Clone)]
pub struct ParsedDelta<'a> {
    pub header: FileHeader,
    pub windows: Vec<Window<'a>>,
    pub instructions: Vec<Instruction>,
}

/// Parse a delta into its structural parts without producing a target.
///
/// No source is consulted, so source-segment bounds are not checked
/// here; only the container structure and the instruction streams are
/// validated.
pub fn parse_delta(delta: &[u8]) -> Result<ParsedDelta<'_>, DecodeError> {
    let (header, windows) = header::parse_windows(delta)?;
    let mut instructions = Vec::new();
    for window in &windows {
        for inst in InstructionIterator::new(window) {
            instructions.push(inst?);
        }
    }
    Ok(ParsedDelta {
        header,
        windows,
        instructions,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
