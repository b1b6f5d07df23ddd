#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The decoder must never panic, only return errors.
    let _ = vcdec::decode(&[], data);

    // Also exercise the source-copy paths.
    if data.len() >= 2 {
        let (source, delta) = data.split_at(data.len() / 2);
        let _ = vcdec::decode(source, delta);
    }

    // And with a valid preamble so windows actually parse.
    let mut delta = vec![0xD6, 0xC3, 0xC4, 0x00, 0x00];
    delta.extend_from_slice(data);
    let _ = vcdec::decode(b"ABCDEFGHIJKLMNOP", &delta);
});
