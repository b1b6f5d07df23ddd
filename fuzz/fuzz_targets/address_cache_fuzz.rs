#![no_main]
use libfuzzer_sys::fuzz_target;
use vcdec::address_cache::AddressCache;

fuzz_target!(|input: (Vec<u8>, u64, Vec<u8>)| {
    let (section, here, modes) = input;
    let mut cache = AddressCache::new(&section);
    for mode in modes.into_iter().take(64) {
        // Resolution must never panic; invalid modes must error.
        let result = cache.decode(here, mode);
        if mode > 8 {
            assert!(result.is_err());
        }
    }
});
