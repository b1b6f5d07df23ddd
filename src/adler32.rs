// Adler-32 checksum over reconstructed target windows.
//
// Windows carrying the VCD_ADLER32 extension store the checksum of their
// target bytes, always seeded with 1. The seed's low and high halves
// initialize the two running sums, so a checksum can be continued across
// chunks by feeding the previous result back in as the seed.

const MOD_ADLER: u32 = 65521;

/// Largest number of bytes the inner loop may accumulate before the sums
/// must be reduced, chosen so the 32-bit accumulators cannot overflow.
const NMAX: usize = 5552;

/// Compute the Adler-32 of `data`, continuing from `seed`.
///
/// Window validation uses `compute_adler32(1, window)`.
pub fn compute_adler32(seed: u32, data: &[u8]) -> u32 {
    let mut s1 = seed & 0xFFFF;
    let mut s2 = (seed >> 16) & 0xFFFF;

    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            s1 += u32::from(byte);
            s2 += s1;
        }
        s1 %= MOD_ADLER;
        s2 %= MOD_ADLER;
    }

    (s2 << 16) | s1
}
