#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((value, consumed)) = vcdec::varint::read_u32(data) {
        assert!(consumed >= 1 && consumed <= 5);
        // Re-encoding the value never takes more bytes than were read.
        assert!(vcdec::varint::sizeof_u32(value) <= consumed);
    }
});
