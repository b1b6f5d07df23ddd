// NEAR/SAME address cache for COPY instructions (RFC 3284, Section 5.3).
//
// COPY addresses are encoded against two small caches that mutate on
// every resolved address. The cache owns the cursor into the window's
// address section and is created fresh (zeroed) for each window.
//
// Default profile, 9 modes:
//   0      SELF — absolute varint
//   1      HERE — here minus a varint offset
//   2..=5  NEAR — near[mode-2] plus a varint offset
//   6..=8  SAME — same[(mode-6)*256 + byte]

use std::fmt;

use crate::varint::{self, VarIntError};

/// Absolute-address mode.
pub const VCD_SELF: u8 = 0;
/// Offset-from-here mode.
pub const VCD_HERE: u8 = 1;

/// Slots in the near ring.
pub const NEAR_SLOTS: usize = 4;
/// 256-entry groups in the same table.
pub const SAME_GROUPS: usize = 3;

const SAME_SIZE: usize = SAME_GROUPS * 256;
const MODE_COUNT: u8 = 2 + NEAR_SLOTS as u8 + SAME_GROUPS as u8;

/// Per-window address resolver.
pub struct AddressCache<'a> {
    near: [u64; NEAR_SLOTS],
    next_near: usize,
    same: [u64; SAME_SIZE],
    addr: &'a [u8],
    pos: usize,
}

impl<'a> AddressCache<'a> {
    /// Fresh cache over one window's address section. Both tables start
    /// zeroed and the cursor at the section's first byte.
    pub fn new(addr_section: &'a [u8]) -> Self {
        Self {
            near: [0; NEAR_SLOTS],
            next_near: 0,
            same: [0; SAME_SIZE],
            addr: addr_section,
            pos: 0,
        }
    }

    /// Bytes of the address section consumed so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    fn read_varint(&mut self) -> Result<u64, AddressCacheError> {
        let (val, used) = varint::read_u32(&self.addr[self.pos..]).map_err(|e| match e {
            VarIntError::Underflow => AddressCacheError::SectionUnderflow,
            VarIntError::Overflow => AddressCacheError::VarintOverflow,
        })?;
        self.pos += used;
        Ok(u64::from(val))
    }

    fn read_byte(&mut self) -> Result<u8, AddressCacheError> {
        match self.addr.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(AddressCacheError::SectionUnderflow),
        }
    }

    /// Resolve one COPY address.
    ///
    /// `here` is the current position in the concatenated address space
    /// (source segment length plus target bytes produced so far). Every
    /// successful resolution pushes the address into both caches.
    pub fn decode(&mut self, here: u64, mode: u8) -> Result<u64, AddressCacheError> {
        if mode >= MODE_COUNT {
            return Err(AddressCacheError::InvalidMode { mode });
        }

        let addr = match mode {
            VCD_SELF => self.read_varint()?,
            VCD_HERE => {
                let offset = self.read_varint()?;
                here.checked_sub(offset)
                    .ok_or(AddressCacheError::HereUnderflow { offset, here })?
            }
            m if usize::from(m) < 2 + NEAR_SLOTS => {
                let slot = usize::from(m) - 2;
                // A zero slot has never been written this window; using it
                // cannot name a real address.
                if self.near[slot] == 0 {
                    return Err(AddressCacheError::DeadNearSlot { slot: m - 2 });
                }
                let base = self.near[slot];
                let offset = self.read_varint()?;
                base.checked_add(offset)
                    .ok_or(AddressCacheError::AddressOverflow { base, offset })?
            }
            m => {
                let group = usize::from(m) - (2 + NEAR_SLOTS);
                let byte = self.read_byte()?;
                self.same[group * 256 + usize::from(byte)]
            }
        };

        self.update(addr);
        Ok(addr)
    }

    /// Push a resolved address into the near ring and the same table.
    fn update(&mut self, addr: u64) {
        self.near[self.next_near] = addr;
        self.next_near = (self.next_near + 1) % NEAR_SLOTS;
        self.same[(addr % SAME_SIZE as u64) as usize] = addr;
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCacheError {
    /// The address section ran out of bytes.
    SectionUnderflow,
    /// An address varint exceeded five bytes.
    VarintOverflow,
    /// Mode outside 0..=8.
    InvalidMode { mode: u8 },
    /// HERE offset reaches before the start of the address space.
    HereUnderflow { offset: u64, here: u64 },
    /// A near slot that was never populated this window.
    DeadNearSlot { slot: u8 },
    /// A near-relative address left the address space.
    AddressOverflow { base: u64, offset: u64 },
}

impl fmt::Display for AddressCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SectionUnderflow => write!(f, "address section underflow"),
            Self::VarintOverflow => write!(f, "address varint exceeds 5 bytes"),
            Self::InvalidMode { mode } => write!(f, "invalid address mode {mode}"),
            Self::HereUnderflow { offset, here } => {
                write!(f, "HERE offset {offset} exceeds current position {here}")
            }
            Self::DeadNearSlot { slot } => {
                write!(f, "near cache slot {slot} never populated")
            }
            Self::AddressOverflow { base, offset } => {
                write!(f, "near address {base} + {offset} overflows")
            }
        }
    }
}

impl std::error::Error for AddressCacheError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_mode_reads_an_absolute_varint() {
        let mut cache = AddressCache::new(&[0x2A]);
        let addr = cache.decode(1000, VCD_SELF).unwrap();
        assert_eq!(addr, 42);
        assert_eq!(cache.consumed(), 1);
    }

    #[test]
    fn here_mode_subtracts_from_here() {
        let mut cache = AddressCache::new(&[0x0A]);
        assert_eq!(cache.decode(1000, VCD_HERE).unwrap(), 990);
    }

    #[test]
    fn here_mode_rejects_offsets_past_the_origin() {
        let mut cache = AddressCache::new(&[0x0B]);
        assert_eq!(
            cache.decode(10, VCD_HERE),
            Err(AddressCacheError::HereUnderflow {
                offset: 11,
                here: 10
            })
        );
    }

    #[test]
    fn near_mode_offsets_a_cached_address() {
        // SELF 100 populates near[0]; mode 2 with offset 5 gives 105.
        let mut cache = AddressCache::new(&[0x64, 0x05]);
        assert_eq!(cache.decode(1000, VCD_SELF).unwrap(), 100);
        assert_eq!(cache.decode(1000, 2).unwrap(), 105);
    }

    #[test]
    fn near_mode_rejects_unpopulated_slots() {
        let mut cache = AddressCache::new(&[0x05]);
        assert_eq!(
            cache.decode(1000, 3),
            Err(AddressCacheError::DeadNearSlot { slot: 1 })
        );
    }

    #[test]
    fn same_mode_reads_one_raw_byte() {
        // SELF 100 writes same[100]; mode 6 with byte 100 reads it back.
        let mut cache = AddressCache::new(&[0x64, 0x64]);
        assert_eq!(cache.decode(1000, VCD_SELF).unwrap(), 100);
        assert_eq!(cache.decode(1000, 6).unwrap(), 100);
        assert_eq!(cache.consumed(), 2);
    }

    #[test]
    fn same_groups_partition_by_modulo() {
        // 300 % 768 = 300, which lives in group 1 (300 = 1*256 + 44).
        let mut cache = AddressCache::new(&[0x82, 0x2C, 0x2C]);
        assert_eq!(cache.decode(1000, VCD_SELF).unwrap(), 300);
        assert_eq!(cache.decode(1000, 7).unwrap(), 300);
    }

    #[test]
    fn near_ring_is_circular() {
        let mut cache = AddressCache::new(&[]);
        for i in 1..=5u64 {
            cache.update(i * 100);
        }
        assert_eq!(cache.near, [500, 200, 300, 400]);
    }

    #[test]
    fn mode_9_is_invalid() {
        let mut cache = AddressCache::new(&[0x00]);
        assert_eq!(
            cache.decode(100, 9),
            Err(AddressCacheError::InvalidMode { mode: 9 })
        );
        assert_eq!(
            cache.decode(100, 0xFF),
            Err(AddressCacheError::InvalidMode { mode: 0xFF })
        );
    }

    #[test]
    fn exhausted_section_underflows() {
        let mut cache = AddressCache::new(&[]);
        assert_eq!(
            cache.decode(100, VCD_SELF),
            Err(AddressCacheError::SectionUnderflow)
        );
        assert_eq!(
            cache.decode(100, 6),
            Err(AddressCacheError::SectionUnderflow)
        );
    }

    #[test]
    fn address_varint_overflow_is_reported() {
        let mut cache = AddressCache::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]);
        assert_eq!(
            cache.decode(100, VCD_SELF),
            Err(AddressCacheError::VarintOverflow)
        );
    }
}
