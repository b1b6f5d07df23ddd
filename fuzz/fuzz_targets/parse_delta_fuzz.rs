#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(parsed) = vcdec::parse_delta(data) {
        // Structural sanity on success: every window's sections fit its
        // declared encoding length.
        for w in &parsed.windows {
            assert!(
                w.data.len() + w.inst.len() + w.addr.len() <= w.delta_encoding_len as usize
            );
        }
    }
});
