// Shared fixture builder for decoder tests.
//
// The crate deliberately ships no encoder, so tests assemble deltas at
// the byte level. `WindowSpec` mirrors the wire layout of one window;
// `build_delta` wraps any number of them in a file header.

// Not every test binary uses every helper.
#![allow(dead_code)]

use vcdec::varint::push_u32;

pub const MAGIC: [u8; 3] = [0xD6, 0xC3, 0xC4];

/// One window, described by its header fields and raw sections.
#[derive(Default, Clone)]
pub struct WindowSpec {
    /// `(segment_size, segment_position)`; sets VCD_SOURCE when present.
    pub source: Option<(u32, u32)>,
    pub target_len: u32,
    /// Sets VCD_ADLER32 when present.
    pub checksum: Option<u32>,
    pub data: Vec<u8>,
    pub inst: Vec<u8>,
    pub addr: Vec<u8>,
}

pub fn build_delta(windows: &[WindowSpec]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.push(0x00); // version
    out.push(0x00); // header indicator

    for w in windows {
        let mut indicator = 0u8;
        if w.source.is_some() {
            indicator |= 0x01;
        }
        if w.checksum.is_some() {
            indicator |= 0x04;
        }
        out.push(indicator);
        if let Some((size, pos)) = w.source {
            push_u32(&mut out, size);
            push_u32(&mut out, pos);
        }

        let mut region = Vec::new();
        push_u32(&mut region, w.target_len);
        region.push(0x00); // delta indicator
        push_u32(&mut region, w.data.len() as u32);
        push_u32(&mut region, w.inst.len() as u32);
        push_u32(&mut region, w.addr.len() as u32);
        if let Some(cksum) = w.checksum {
            region.extend_from_slice(&cksum.to_be_bytes());
        }
        region.extend_from_slice(&w.data);
        region.extend_from_slice(&w.inst);
        region.extend_from_slice(&w.addr);

        push_u32(&mut out, region.len() as u32);
        out.extend_from_slice(&region);
    }

    out
}

/// Delta with a single window that ADDs `payload` literally.
pub fn add_only_delta(payload: &[u8]) -> Vec<u8> {
    let mut inst = vec![0x01]; // ADD, size follows
    push_u32(&mut inst, payload.len() as u32);
    build_delta(&[WindowSpec {
        target_len: payload.len() as u32,
        data: payload.to_vec(),
        inst,
        ..Default::default()
    }])
}

/// Delta that ADDs one byte and then COPYs it `run_len` times from the
/// start of the target window (run-length expansion through the cache's
/// SELF mode).
pub fn self_copy_delta(byte: u8, run_len: u32) -> Vec<u8> {
    let mut inst = vec![0x02, 0x13]; // ADD(1), COPY mode 0 with varint size
    push_u32(&mut inst, run_len);
    build_delta(&[WindowSpec {
        target_len: run_len + 1,
        data: vec![byte],
        inst,
        addr: vec![0x00], // SELF address 0
        ..Default::default()
    }])
}
