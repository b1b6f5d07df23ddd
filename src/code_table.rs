// RFC 3284 default instruction code table (Section 5.6, Appendix A).
//
// A single opcode byte selects one row of a 256-entry table; each row
// packs one or two instructions. A table size of 0 means the actual size
// follows as a varint in the instruction stream.

use std::sync::LazyLock;

/// Instruction kind stored in a code-table slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstKind {
    #[default]
    NoOp,
    Add,
    Run,
    Copy,
}

/// Number of COPY address modes in the default profile
/// (SELF + HERE + 4 near + 3 same).
pub const COPY_MODES: u8 = 9;

/// One row of the code table. Slot 1 executes before slot 2; a row with
/// `kind2 == NoOp` encodes a single instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableEntry {
    pub kind1: InstKind,
    pub size1: u8,
    pub mode1: u8,
    pub kind2: InstKind,
    pub size2: u8,
    pub mode2: u8,
}

impl TableEntry {
    const fn single(kind: InstKind, size: u8, mode: u8) -> Self {
        Self {
            kind1: kind,
            size1: size,
            mode1: mode,
            kind2: InstKind::NoOp,
            size2: 0,
            mode2: 0,
        }
    }

    const fn pair(k1: InstKind, s1: u8, m1: u8, k2: InstKind, s2: u8, m2: u8) -> Self {
        Self {
            kind1: k1,
            size1: s1,
            mode1: m1,
            kind2: k2,
            size2: s2,
            mode2: m2,
        }
    }

    /// Both slots in execution order.
    #[inline]
    pub fn slots(&self) -> [(InstKind, u8, u8); 2] {
        [
            (self.kind1, self.size1, self.mode1),
            (self.kind2, self.size2, self.mode2),
        ]
    }
}

/// The complete 256-entry table.
pub type CodeTable = [TableEntry; 256];

/// Build the default RFC 3284 code table.
pub fn build_default_code_table() -> CodeTable {
    let mut table = [TableEntry::default(); 256];
    let mut idx = 0usize;

    // Opcode 0: RUN, size read from the instruction stream.
    table[idx] = TableEntry::single(InstKind::Run, 0, 0);
    idx += 1;

    // Opcodes 1..=18: ADD with size 0 (varint) then 1..=17.
    for size in 0..=17u8 {
        table[idx] = TableEntry::single(InstKind::Add, size, 0);
        idx += 1;
    }

    // Opcodes 19..=162: per mode, COPY with size 0 then 4..=18.
    for mode in 0..COPY_MODES {
        table[idx] = TableEntry::single(InstKind::Copy, 0, mode);
        idx += 1;
        for size in 4..=18u8 {
            table[idx] = TableEntry::single(InstKind::Copy, size, mode);
            idx += 1;
        }
    }

    // Opcodes 163..=234: ADD(1..=4) + COPY(4..=6) for modes 0..=5.
    for mode in 0..6u8 {
        for add_size in 1..=4u8 {
            for copy_size in 4..=6u8 {
                table[idx] =
                    TableEntry::pair(InstKind::Add, add_size, 0, InstKind::Copy, copy_size, mode);
                idx += 1;
            }
        }
    }

    // Opcodes 235..=246: ADD(1..=4) + COPY(4) for the same-cache modes 6..=8.
    for mode in 6..COPY_MODES {
        for add_size in 1..=4u8 {
            table[idx] = TableEntry::pair(InstKind::Add, add_size, 0, InstKind::Copy, 4, mode);
            idx += 1;
        }
    }

    // Opcodes 247..=255: COPY(4) + ADD(1) for every mode.
    for mode in 0..COPY_MODES {
        table[idx] = TableEntry::pair(InstKind::Copy, 4, mode, InstKind::Add, 1, 0);
        idx += 1;
    }

    debug_assert_eq!(idx, 256, "code table must have exactly 256 entries");
    table
}

/// The lazily-built default code table.
pub fn default_code_table() -> &'static CodeTable {
    static TABLE: LazyLock<CodeTable> = LazyLock::new(build_default_code_table);
    &TABLE
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
